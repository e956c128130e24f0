use evaluation::tensor::element_count;
use evaluation::{Tensor, TensorError};

#[test]
fn test_tensor_new_valid() {
    let tensor = Tensor::new(vec![1, 10], vec![0.5f32; 10]).unwrap();
    assert_eq!(tensor.shape, vec![1, 10]);
    assert_eq!(tensor.len(), 10);
    assert_eq!(tensor.ndim(), 2);
}

#[test]
fn test_tensor_new_shape_mismatch() {
    let result = Tensor::new(vec![1, 1, 28, 28], vec![0.0f32; 783]);
    assert_eq!(
        result.unwrap_err(),
        TensorError::ShapeMismatch {
            expected: 784,
            got: 783
        }
    );
}

#[test]
fn test_tensor_new_overflow() {
    let result = Tensor::<f32>::new(vec![usize::MAX, 2], vec![]);
    assert!(matches!(result, Err(TensorError::ShapeOverflow)));
}

#[test]
fn test_tensor_zeros() {
    let tensor = Tensor::<f32>::zeros(vec![1, 1, 28, 28]).unwrap();
    assert_eq!(tensor.len(), 784);
    assert!(tensor.data.iter().all(|&x| x == 0.0));
}

#[test]
fn test_tensor_empty() {
    let tensor = Tensor::<f32>::new(vec![0], vec![]).unwrap();
    assert!(tensor.is_empty());
    assert!(tensor.into_data().is_empty());
}

#[test]
fn test_element_count_scalar() {
    assert_eq!(element_count(&[]), Ok(1));
    assert_eq!(element_count(&[2, 3, 4]), Ok(24));
}

#[test]
fn test_error_display() {
    let error = TensorError::ShapeMismatch {
        expected: 10,
        got: 3,
    };
    assert_eq!(error.to_string(), "shape mismatch: expected 10 elements, got 3");
}
