use evaluation::metadata::METADATA_FILE;
use evaluation::{Metadata, SampleError, SchemaVersion};

#[test]
fn test_parse_primary_key() {
    let text = r#"{
        "num_samples": 2,
        "samples": [
            { "sample_id": 0, "true_label": 7, "original_mnist_index": 0 },
            { "sample_id": 1, "true_label": 2, "original_mnist_index": 1 }
        ]
    }"#;
    let metadata = Metadata::parse(text).unwrap();
    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata.records[0].true_label, 7);
    assert_eq!(metadata.records[1].original_index, 1);
    assert_eq!(metadata.records[1].image_file, None);
}

#[test]
fn test_parse_alias_key() {
    let text = r#"{
        "num_samples": 1,
        "samples": [ { "true_label": 3, "mnist_index": 42 } ]
    }"#;
    let metadata = Metadata::parse(text).unwrap();
    assert_eq!(metadata.records[0].original_index, 42);
    assert_eq!(metadata.records[0].sample_id, 0);
}

#[test]
fn test_sample_id_defaults_to_position() {
    let text = r#"{
        "num_samples": 3,
        "samples": [
            { "true_label": 0, "original_mnist_index": 10 },
            { "true_label": 1, "original_mnist_index": 11 },
            { "sample_id": 99, "true_label": 2, "original_mnist_index": 12 }
        ]
    }"#;
    let ids: Vec<usize> = Metadata::parse(text)
        .unwrap()
        .records
        .iter()
        .map(|r| r.sample_id)
        .collect();
    assert_eq!(ids, vec![0, 1, 99]);
}

#[test]
fn test_unknown_keys_ignored() {
    let text = r#"{
        "num_samples": 1,
        "description": "first test digits",
        "samples": [
            { "true_label": 5, "original_mnist_index": 8, "pixel_values": [0.0, 0.5, 1.0] }
        ]
    }"#;
    let metadata = Metadata::parse(text).unwrap();
    assert_eq!(metadata.records[0].true_label, 5);
}

#[test]
fn test_count_mismatch_rejected() {
    let text = r#"{
        "num_samples": 3,
        "samples": [ { "true_label": 5, "original_mnist_index": 8 } ]
    }"#;
    let error = Metadata::parse(text).unwrap_err();
    assert!(matches!(error, SampleError::InvalidMetadata(_)));
    assert!(error.is_fatal());
}

#[test]
fn test_label_out_of_range_rejected() {
    for label in ["10", "-1", "255"] {
        let text = format!(
            r#"{{ "num_samples": 1, "samples": [ {{ "true_label": {}, "original_mnist_index": 0 }} ] }}"#,
            label
        );
        assert!(
            matches!(Metadata::parse(&text), Err(SampleError::InvalidMetadata(_))),
            "label {}",
            label
        );
    }
}

#[test]
fn test_missing_index_rejected() {
    let text = r#"{ "num_samples": 1, "samples": [ { "true_label": 1 } ] }"#;
    assert!(matches!(
        Metadata::parse(text),
        Err(SampleError::InvalidMetadata(_))
    ));
}

#[test]
fn test_not_json_rejected() {
    assert!(matches!(
        Metadata::parse("num_samples = 1"),
        Err(SampleError::InvalidMetadata(_))
    ));
}

#[test]
fn test_load_missing_file() {
    let path = std::env::temp_dir()
        .join(format!("evaluation-metadata-missing-{}", std::process::id()))
        .join(METADATA_FILE);
    let error = Metadata::load(&path).unwrap_err();
    assert!(matches!(error, SampleError::MetadataUnavailable { .. }));
    assert!(error.is_fatal());
}

#[test]
fn test_label_distribution() {
    let text = r#"{
        "num_samples": 4,
        "samples": [
            { "true_label": 7, "original_mnist_index": 0 },
            { "true_label": 2, "original_mnist_index": 1 },
            { "true_label": 7, "original_mnist_index": 2 },
            { "true_label": 0, "original_mnist_index": 3 }
        ]
    }"#;
    let counts = Metadata::parse(text).unwrap().label_distribution();
    assert_eq!(counts[7], 2);
    assert_eq!(counts[2], 1);
    assert_eq!(counts[0], 1);
    assert_eq!(counts.iter().sum::<usize>(), 4);
}

#[test]
fn test_schema_file_names() {
    assert_eq!(SchemaVersion::Mnist.file_name(0), "image_000.bin");
    assert_eq!(SchemaVersion::Mnist.file_name(42), "image_042.bin");
    assert_eq!(SchemaVersion::Common.file_name(7), "sample_07.bin");
}

#[test]
fn test_entry_with_both_index_keys() {
    let text = r#"{
        "num_samples": 1,
        "samples": [ { "true_label": 3, "original_mnist_index": 3, "mnist_index": 3 } ]
    }"#;
    let metadata = Metadata::parse(text).unwrap();
    assert_eq!(metadata.records[0].original_index, 3);
    assert_eq!(metadata.schema_hint, Some(SchemaVersion::Mnist));
}
