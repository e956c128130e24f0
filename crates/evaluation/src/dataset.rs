use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base::{log_debug, log_info, log_warn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::error::SampleError;
use crate::metadata::{METADATA_FILE, Metadata, SampleRecord, SchemaVersion};
use crate::sample::{IMAGE_PIXELS, NUM_CLASSES, Sample, SampleSource};

const SAMPLE_BYTES: usize = IMAGE_PIXELS * std::mem::size_of::<f32>();

/// What to do when a sample file listed in the metadata does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSamplePolicy {
    /// Report the sample as failed.
    #[default]
    Skip,
    /// Substitute a deterministic random image, flagged as synthetic.
    Placeholder,
}

/// Samples stored as one raw little-endian `f32` file each, described by `metadata.json`.
///
/// Files are read lazily, one per step of the iterator.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    schema: SchemaVersion,
    metadata: Metadata,
    missing: MissingSamplePolicy,
}

impl DirectorySource {
    /// Open a dataset directory. Without an explicit schema the file layout is probed.
    pub fn open(
        root: impl Into<PathBuf>,
        schema: Option<SchemaVersion>,
        missing: MissingSamplePolicy,
    ) -> Result<Self, SampleError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SampleError::RootNotFound(root));
        }
        let metadata = Metadata::load(&root.join(METADATA_FILE))?;
        let schema = schema.unwrap_or_else(|| detect_schema(&root, metadata.schema_hint));

        log_info!(
            "Dataset {}: {} samples, {:?} layout",
            root.display(),
            metadata.len(),
            schema
        );
        log_info!(
            "Label distribution: {}",
            format_distribution(&metadata.label_distribution())
        );

        Ok(DirectorySource {
            root,
            schema,
            metadata,
            missing,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn sample_path(&self, position: usize, record: &SampleRecord) -> PathBuf {
        match &record.image_file {
            Some(file) => self.root.join(file),
            None => self.root.join(self.schema.file_name(position)),
        }
    }

    fn load(&self, position: usize, record: &SampleRecord) -> Result<Sample, SampleError> {
        let path = self.sample_path(position, record);
        let pixels = match read_pixels(record.sample_id, &path) {
            Ok(pixels) => pixels,
            Err(SampleError::MissingFile { .. })
                if self.missing == MissingSamplePolicy::Placeholder =>
            {
                log_warn!(
                    "Sample {}: {} missing, using placeholder image",
                    record.sample_id,
                    path.display()
                );
                let mut sample = Sample::new(
                    record.sample_id,
                    record.original_index,
                    record.true_label,
                    placeholder_pixels(record.sample_id),
                )?;
                sample.synthetic = true;
                return Ok(sample);
            }
            Err(error) => return Err(error),
        };
        log_debug!("Sample {}: read {}", record.sample_id, path.display());
        Sample::new(
            record.sample_id,
            record.original_index,
            record.true_label,
            pixels,
        )
    }
}

impl SampleSource for DirectorySource {
    fn len(&self) -> usize {
        self.metadata.len()
    }

    fn samples(&self) -> Box<dyn Iterator<Item = Result<Sample, SampleError>> + '_> {
        Box::new(
            self.metadata
                .records
                .iter()
                .enumerate()
                .map(|(position, record)| self.load(position, record)),
        )
    }
}

/// Pick the layout whose first file exists. Without one, fall back to the
/// metadata's hint, then to [`SchemaVersion::Mnist`].
pub fn detect_schema(root: &Path, hint: Option<SchemaVersion>) -> SchemaVersion {
    SchemaVersion::ALL
        .into_iter()
        .find(|schema| root.join(schema.file_name(0)).is_file())
        .or(hint)
        .unwrap_or(SchemaVersion::Mnist)
}

/// Read one sample file of exactly 784 little-endian `f32` values.
pub fn read_pixels(sample_id: usize, path: &Path) -> Result<Vec<f32>, SampleError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            SampleError::MissingFile {
                sample_id,
                path: path.to_path_buf(),
            }
        } else {
            SampleError::Unreadable {
                sample_id,
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    if bytes.len() < SAMPLE_BYTES {
        return Err(SampleError::Truncated {
            sample_id,
            expected: SAMPLE_BYTES,
            found: bytes.len(),
        });
    }
    if bytes.len() > SAMPLE_BYTES {
        return Err(SampleError::Malformed {
            sample_id,
            reason: format!(
                "{} has {} trailing bytes",
                path.display(),
                bytes.len() - SAMPLE_BYTES
            ),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Deterministic stand-in image for a missing sample, uniform in 0..1.
pub fn placeholder_pixels(sample_id: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(sample_id as u64);
    (0..IMAGE_PIXELS).map(|_| rng.r#gen::<f32>()).collect()
}

fn format_distribution(counts: &[usize; NUM_CLASSES]) -> String {
    counts
        .iter()
        .enumerate()
        .map(|(label, count)| format!("{}:{}", label, count))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_deterministic() {
        let a = placeholder_pixels(3);
        assert_eq!(a, placeholder_pixels(3));
        assert_ne!(a, placeholder_pixels(4));
        assert_eq!(a.len(), IMAGE_PIXELS);
        assert!(a.iter().all(|&p| (0.0..1.0).contains(&p)));
    }

    #[test]
    fn test_format_distribution() {
        let mut counts = [0usize; NUM_CLASSES];
        counts[7] = 2;
        let text = format_distribution(&counts);
        assert!(text.starts_with("0:0 1:0"));
        assert!(text.contains("7:2"));
    }
}
