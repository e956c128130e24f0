//! Dataset metadata: `metadata.json` next to the sample files.
//!
//! ```json
//! { "num_samples": 2,
//!   "samples": [ { "true_label": 7, "original_mnist_index": 0 },
//!                { "sample_id": 1, "true_label": 2, "mnist_index": 1, "image_file": "two.bin" } ] }
//! ```
//!
//! Unknown keys (pixel dumps, descriptions) are ignored. An entry carrying both
//! index keys takes `original_mnist_index`. `image_file` must be a relative path
//! that stays inside the dataset directory.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::SampleError;
use crate::sample::NUM_CLASSES;

pub const METADATA_FILE: &str = "metadata.json";

/// Naming scheme of the per-sample binary files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// `image_000.bin`, keyed by `original_mnist_index`.
    Mnist,
    /// `sample_00.bin`, keyed by `mnist_index`.
    Common,
}

impl SchemaVersion {
    pub const ALL: [SchemaVersion; 2] = [SchemaVersion::Mnist, SchemaVersion::Common];

    pub fn file_name(&self, index: usize) -> String {
        match self {
            SchemaVersion::Mnist => format!("image_{:03}.bin", index),
            SchemaVersion::Common => format!("sample_{:02}.bin", index),
        }
    }
}

#[derive(Deserialize)]
struct RawMetadata {
    num_samples: usize,
    samples: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct RawRecord {
    sample_id: Option<usize>,
    true_label: i64,
    original_mnist_index: Option<i64>,
    mnist_index: Option<i64>,
    image_file: Option<String>,
}

/// Parsed entry for one sample, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub sample_id: usize,
    pub original_index: usize,
    pub true_label: u8,
    /// Overrides the schema file name when present.
    pub image_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub records: Vec<SampleRecord>,
    /// Layout suggested by the index key: `mnist_index` only in every entry
    /// points at [`SchemaVersion::Common`], `original_mnist_index` at
    /// [`SchemaVersion::Mnist`]. `None` when entries disagree or there are none.
    pub schema_hint: Option<SchemaVersion>,
}

impl Metadata {
    pub fn parse(text: &str) -> Result<Self, SampleError> {
        let raw: RawMetadata = serde_json::from_str(text)
            .map_err(|e| SampleError::InvalidMetadata(e.to_string()))?;

        if raw.num_samples != raw.samples.len() {
            return Err(SampleError::InvalidMetadata(format!(
                "num_samples is {} but {} samples are listed",
                raw.num_samples,
                raw.samples.len()
            )));
        }

        let mut keys = Vec::with_capacity(raw.samples.len());
        let records = raw
            .samples
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                let true_label = u8::try_from(entry.true_label)
                    .ok()
                    .filter(|&label| usize::from(label) < NUM_CLASSES)
                    .ok_or_else(|| {
                        SampleError::InvalidMetadata(format!(
                            "entry {}: label {} out of range",
                            position, entry.true_label
                        ))
                    })?;
                // original_mnist_index wins when both keys are present
                let (raw_index, key) = match (entry.original_mnist_index, entry.mnist_index) {
                    (Some(index), _) => (index, SchemaVersion::Mnist),
                    (None, Some(index)) => (index, SchemaVersion::Common),
                    (None, None) => {
                        return Err(SampleError::InvalidMetadata(format!(
                            "entry {}: missing original_mnist_index",
                            position
                        )));
                    }
                };
                let original_index = usize::try_from(raw_index).map_err(|_| {
                    SampleError::InvalidMetadata(format!(
                        "entry {}: negative original index {}",
                        position, raw_index
                    ))
                })?;
                if let Some(file) = &entry.image_file {
                    if !is_contained(file) {
                        return Err(SampleError::InvalidMetadata(format!(
                            "entry {}: image_file {:?} leaves the dataset directory",
                            position, file
                        )));
                    }
                }
                keys.push(key);
                Ok(SampleRecord {
                    sample_id: entry.sample_id.unwrap_or(position),
                    original_index,
                    true_label,
                    image_file: entry.image_file,
                })
            })
            .collect::<Result<Vec<_>, SampleError>>()?;

        let schema_hint = match keys.split_first() {
            Some((first, rest)) if rest.iter().all(|key| key == first) => Some(*first),
            _ => None,
        };

        Ok(Metadata {
            records,
            schema_hint,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SampleError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            SampleError::MetadataUnavailable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of samples per true label.
    pub fn label_distribution(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0usize; NUM_CLASSES];
        for record in &self.records {
            counts[usize::from(record.true_label)] += 1;
        }
        counts
    }
}

// Only plain names: no root, prefix, `.` or `..` components.
fn is_contained(file: &str) -> bool {
    let path = Path::new(file);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}
