use {
    crate::*,
    std::{any::Any, ffi::c_void, ptr::null_mut, sync::Arc},
};

mod sealed {
    pub trait Sealed {}
}

/// Types that can be used as tensor elements
pub trait TensorElement: sealed::Sealed + Sized + Copy + Send + 'static {
    fn element_type() -> ffi::ONNXTensorElementDataType;
}

impl sealed::Sealed for f32 {}
impl TensorElement for f32 {
    fn element_type() -> ffi::ONNXTensorElementDataType {
        ffi::ONNXTensorElementDataType::Float
    }
}

/// CPU memory description used when wrapping host buffers as tensors.
pub struct MemoryInfo {
    info: *mut ffi::OrtMemoryInfo,
    release: ffi::ReleaseMemoryInfoFn,
}

unsafe impl Send for MemoryInfo {}

impl MemoryInfo {
    pub fn cpu(onnx: &Onnx) -> Result<Self> {
        let mut info = MemoryInfo {
            info: null_mut(),
            release: onnx.release_memory_info,
        };
        onnx.check(unsafe {
            (onnx.create_memory_info)(
                ffi::OrtAllocatorType::Arena,
                ffi::OrtMemType::Default,
                &mut info.info,
            )
        })?;
        Ok(info)
    }
}

impl Drop for MemoryInfo {
    fn drop(&mut self) {
        if !self.info.is_null() {
            unsafe { (self.release)(self.info) };
        }
    }
}

// Type and shape description of a concrete value, owned by the caller.
struct TensorShapeInfo {
    info: *mut ffi::OrtTensorTypeAndShapeInfo,
    release: ffi::ReleaseTensorTypeAndShapeInfoFn,
}

impl Drop for TensorShapeInfo {
    fn drop(&mut self) {
        if !self.info.is_null() {
            unsafe { (self.release)(self.info) };
        }
    }
}

/// Read the dimensions from tensor type info (owned or borrowed).
pub(crate) fn dimensions(
    onnx: &Onnx,
    info: *const ffi::OrtTensorTypeAndShapeInfo,
) -> Result<Vec<i64>> {
    let mut dim_count: usize = 0;
    onnx.check(unsafe { (onnx.get_dimensions_count)(info, &mut dim_count) })?;
    let mut dims = vec![0i64; dim_count];
    onnx.check(unsafe { (onnx.get_dimensions)(info, dims.as_mut_ptr(), dim_count) })?;
    Ok(dims)
}

pub(crate) fn element_type(
    onnx: &Onnx,
    info: *const ffi::OrtTensorTypeAndShapeInfo,
) -> Result<ffi::ONNXTensorElementDataType> {
    let mut element_type = ffi::ONNXTensorElementDataType::Undefined;
    onnx.check(unsafe { (onnx.get_tensor_element_type)(info, &mut element_type) })?;
    Ok(element_type)
}

/// ONNX Runtime value (tensor)
pub struct Value {
    onnx: Arc<Onnx>,
    value: *mut ffi::OrtValue,
    // host buffer backing the tensor, released after the value
    _data: Option<Box<dyn Any + Send>>,
}

unsafe impl Send for Value {}

impl Value {
    /// Copy `data` into a host tensor of the given shape, described by `memory_info`.
    pub fn from_slice_in<T: TensorElement>(
        onnx: &Arc<Onnx>,
        memory_info: &MemoryInfo,
        shape: &[usize],
        data: &[T],
    ) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(OnnxError::new(
                ffi::OrtErrorCode::InvalidArgument,
                format!(
                    "Data length {} doesn't match shape {:?} (expected {})",
                    data.len(),
                    shape,
                    expected_len
                ),
            ));
        }

        let mut buffer: Vec<T> = data.to_vec();
        let byte_len = std::mem::size_of_val(buffer.as_slice());
        let shape_i64: Vec<i64> = shape.iter().map(|&s| s as i64).collect();

        let mut value = Value {
            onnx: Arc::clone(onnx),
            value: null_mut(),
            _data: None,
        };
        onnx.check(unsafe {
            (onnx.create_tensor)(
                memory_info.info,
                buffer.as_mut_ptr() as *mut c_void,
                byte_len,
                shape_i64.as_ptr(),
                shape_i64.len(),
                T::element_type(),
                &mut value.value,
            )
        })?;
        // moving the Vec keeps its heap allocation in place
        value._data = Some(Box::new(buffer));
        Ok(value)
    }

    /// Wrap a value returned by the runtime.
    ///
    /// # Safety
    /// `value` must be a valid OrtValue owned by the caller.
    pub(crate) unsafe fn from_raw(onnx: &Arc<Onnx>, value: *mut ffi::OrtValue) -> Self {
        Value {
            onnx: Arc::clone(onnx),
            value,
            _data: None,
        }
    }

    pub(crate) fn as_ptr(&self) -> *const ffi::OrtValue {
        self.value
    }

    fn shape_info(&self) -> Result<TensorShapeInfo> {
        let mut info = TensorShapeInfo {
            info: null_mut(),
            release: self.onnx.release_tensor_type_and_shape_info,
        };
        self.onnx
            .check(unsafe { (self.onnx.get_tensor_type_and_shape)(self.value, &mut info.info) })?;
        Ok(info)
    }

    pub fn tensor_shape(&self) -> Result<Vec<i64>> {
        let info = self.shape_info()?;
        dimensions(&self.onnx, info.info)
    }

    /// Borrow the tensor contents.
    pub fn extract_tensor<T: TensorElement>(&self) -> Result<&[T]> {
        let (found, elem_count) = {
            let info = self.shape_info()?;
            let found = element_type(&self.onnx, info.info)?;
            let mut elem_count: usize = 0;
            self.onnx.check(unsafe {
                (self.onnx.get_tensor_shape_element_count)(info.info, &mut elem_count)
            })?;
            (found, elem_count)
        };

        if found != T::element_type() {
            return Err(OnnxError::new(
                ffi::OrtErrorCode::InvalidArgument,
                format!(
                    "Element type mismatch: expected {:?}, got {:?}",
                    T::element_type(),
                    found
                ),
            ));
        }

        if elem_count == 0 {
            return Ok(&[]);
        }

        let mut data_ptr: *mut c_void = null_mut();
        self.onnx
            .check(unsafe { (self.onnx.get_tensor_mutable_data)(self.value, &mut data_ptr) })?;
        if data_ptr.is_null() {
            return Err(OnnxError::runtime_error("Tensor has no data"));
        }

        Ok(unsafe { std::slice::from_raw_parts(data_ptr as *const T, elem_count) })
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        if !self.value.is_null() {
            unsafe { (self.onnx.release_value)(self.value) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_element_type() {
        assert_eq!(f32::element_type(), ffi::ONNXTensorElementDataType::Float);
    }

    #[test]
    fn test_value_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Value>();
        assert_send::<MemoryInfo>();
    }
}
