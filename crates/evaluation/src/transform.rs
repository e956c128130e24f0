//! Pre- and postprocessing for the classifier: pure functions, no I/O.

/// Mean of the MNIST training set pixels (0..1 range).
pub const MNIST_MEAN: f32 = 0.1307;

/// Standard deviation of the MNIST training set pixels (0..1 range).
pub const MNIST_STD: f32 = 0.3081;

/// Standardize raw pixels with the training set statistics.
///
/// Not idempotent: apply exactly once per sample, right before building the input tensor.
pub fn normalize(pixels: &[f32]) -> Vec<f32> {
    pixels.iter().map(|&x| (x - MNIST_MEAN) / MNIST_STD).collect()
}

/// Numerically stable softmax. Empty input gives empty output.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&x| f64::from(x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&e| (e / sum) as f32).collect()
}

/// Index and value of the largest entry. Ties go to the lowest index.
pub fn argmax_with_confidence(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in probabilities.iter().enumerate() {
        let replace = match best {
            None => true,
            Some((_, current)) => value > current,
        };
        if replace {
            best = Some((index, value));
        }
    }
    best
}
