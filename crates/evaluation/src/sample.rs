use crate::error::SampleError;

pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;

/// Input tensor contract: batch, channel, height, width.
pub const INPUT_SHAPE: [usize; 4] = [1, 1, IMAGE_SIDE, IMAGE_SIDE];

/// One labeled image, raw pixels in the 0..1 range.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub sample_id: usize,
    pub original_index: usize,
    pub true_label: u8,
    pub pixels: Vec<f32>,
    /// Placeholder substituted for a missing file.
    pub synthetic: bool,
}

impl Sample {
    pub fn new(
        sample_id: usize,
        original_index: usize,
        true_label: u8,
        pixels: Vec<f32>,
    ) -> Result<Self, SampleError> {
        let sample = Sample {
            sample_id,
            original_index,
            true_label,
            pixels,
            synthetic: false,
        };
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> Result<(), SampleError> {
        if usize::from(self.true_label) >= NUM_CLASSES {
            return Err(SampleError::Malformed {
                sample_id: self.sample_id,
                reason: format!("label {} out of range", self.true_label),
            });
        }
        if self.pixels.len() != IMAGE_PIXELS {
            return Err(SampleError::Malformed {
                sample_id: self.sample_id,
                reason: format!(
                    "expected {} pixels, found {}",
                    IMAGE_PIXELS,
                    self.pixels.len()
                ),
            });
        }
        Ok(())
    }
}

/// Ordered, finite, restartable sequence of labeled samples.
///
/// Every call to `samples` starts a new pass from the first sample.
pub trait SampleSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn samples(&self) -> Box<dyn Iterator<Item = Result<Sample, SampleError>> + '_>;
}

/// Samples already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    samples: Vec<Sample>,
}

impl MemorySource {
    pub fn new(samples: Vec<Sample>) -> Self {
        MemorySource { samples }
    }
}

impl SampleSource for MemorySource {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn samples(&self) -> Box<dyn Iterator<Item = Result<Sample, SampleError>> + '_> {
        Box::new(self.samples.iter().cloned().map(Ok))
    }
}
