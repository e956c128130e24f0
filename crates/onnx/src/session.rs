use {
    crate::{value::MemoryInfo, *},
    std::{
        ffi::{CStr, CString, c_char, c_void},
        ptr::{null, null_mut},
        sync::Arc,
    },
};

// Name string allocated by the runtime on our behalf.
struct AllocatedName<'a> {
    onnx: &'a Onnx,
    ptr: *mut c_char,
}

impl Drop for AllocatedName<'_> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // a failed free leaks the string, nothing else to do here
            let status =
                unsafe { (self.onnx.allocator_free)(self.onnx.allocator, self.ptr as *mut c_void) };
            let _ = self.onnx.check(status);
        }
    }
}

struct TypeInfo<'a> {
    onnx: &'a Onnx,
    info: *mut ffi::OrtTypeInfo,
}

impl TypeInfo<'_> {
    // borrowed from the type info, valid while it lives
    fn tensor_info(&self) -> Result<*const ffi::OrtTensorTypeAndShapeInfo> {
        let mut tensor_info: *const ffi::OrtTensorTypeAndShapeInfo = null();
        self.onnx.check(unsafe {
            (self.onnx.cast_type_info_to_tensor_info)(self.info, &mut tensor_info)
        })?;
        if tensor_info.is_null() {
            return Err(OnnxError::runtime_error("Binding is not a tensor type"));
        }
        Ok(tensor_info)
    }
}

impl Drop for TypeInfo<'_> {
    fn drop(&mut self) {
        if !self.info.is_null() {
            unsafe { (self.onnx.release_type_info)(self.info) };
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Input,
    Output,
}

/// ONNX Runtime session
///
/// Input and output names are read once when the session is created.
pub struct Session {
    session: *mut ffi::OrtSession,
    memory_info: MemoryInfo,
    input_names: Vec<String>,
    output_names: Vec<String>,
    // dropped last so the environment outlives the session
    onnx: Arc<Onnx>,
}

unsafe impl Send for Session {}

impl Session {
    pub(crate) fn new(onnx: Arc<Onnx>, session: *mut ffi::OrtSession) -> Result<Self> {
        let memory_info = match MemoryInfo::cpu(&onnx) {
            Ok(memory_info) => memory_info,
            Err(error) => {
                unsafe { (onnx.release_session)(session) };
                return Err(error);
            }
        };
        let mut result = Session {
            session,
            memory_info,
            input_names: Vec::new(),
            output_names: Vec::new(),
            onnx,
        };
        result.input_names = (0..result.input_count()?)
            .map(|index| result.name(Binding::Input, index))
            .collect::<Result<_>>()?;
        result.output_names = (0..result.output_count()?)
            .map(|index| result.name(Binding::Output, index))
            .collect::<Result<_>>()?;
        Ok(result)
    }

    fn count(&self, binding: Binding) -> Result<usize> {
        let get_count = match binding {
            Binding::Input => self.onnx.session_get_input_count,
            Binding::Output => self.onnx.session_get_output_count,
        };
        let mut count: usize = 0;
        self.onnx
            .check(unsafe { get_count(self.session, &mut count) })?;
        Ok(count)
    }

    pub fn input_count(&self) -> Result<usize> {
        self.count(Binding::Input)
    }

    pub fn output_count(&self) -> Result<usize> {
        self.count(Binding::Output)
    }

    fn name(&self, binding: Binding, index: usize) -> Result<String> {
        let get_name = match binding {
            Binding::Input => self.onnx.session_get_input_name,
            Binding::Output => self.onnx.session_get_output_name,
        };
        let mut name = AllocatedName {
            onnx: &self.onnx,
            ptr: null_mut(),
        };
        self.onnx.check(unsafe {
            get_name(self.session, index, self.onnx.allocator, &mut name.ptr)
        })?;
        if name.ptr.is_null() {
            return Err(OnnxError::runtime_error(format!(
                "No name for {:?} {}",
                binding, index
            )));
        }
        unsafe { CStr::from_ptr(name.ptr) }
            .to_str()
            .map(|s| s.to_string())
            .map_err(|_| OnnxError::runtime_error(format!("Invalid UTF-8 in {:?} name", binding)))
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn type_info(&self, binding: Binding, index: usize) -> Result<TypeInfo<'_>> {
        let get_type_info = match binding {
            Binding::Input => self.onnx.session_get_input_type_info,
            Binding::Output => self.onnx.session_get_output_type_info,
        };
        let mut info = TypeInfo {
            onnx: &self.onnx,
            info: null_mut(),
        };
        self.onnx
            .check(unsafe { get_type_info(self.session, index, &mut info.info) })?;
        Ok(info)
    }

    /// Declared input dimensions. Dynamic dimensions are `-1`.
    pub fn input_shape(&self, index: usize) -> Result<Vec<i64>> {
        let info = self.type_info(Binding::Input, index)?;
        value::dimensions(&self.onnx, info.tensor_info()?)
    }

    /// Declared output dimensions. Dynamic dimensions are `-1`.
    pub fn output_shape(&self, index: usize) -> Result<Vec<i64>> {
        let info = self.type_info(Binding::Output, index)?;
        value::dimensions(&self.onnx, info.tensor_info()?)
    }

    pub fn input_element_type(&self, index: usize) -> Result<ffi::ONNXTensorElementDataType> {
        let info = self.type_info(Binding::Input, index)?;
        value::element_type(&self.onnx, info.tensor_info()?)
    }

    pub fn output_element_type(&self, index: usize) -> Result<ffi::ONNXTensorElementDataType> {
        let info = self.type_info(Binding::Output, index)?;
        value::element_type(&self.onnx, info.tensor_info()?)
    }

    /// Copy `data` into a tensor using this session's memory description.
    pub fn tensor<T: TensorElement>(&self, shape: &[usize], data: &[T]) -> Result<Value> {
        Value::from_slice_in(&self.onnx, &self.memory_info, shape, data)
    }

    /// Run the model with named inputs and outputs
    pub fn run(&mut self, inputs: &[(&str, &Value)], output_names: &[&str]) -> Result<Vec<Value>> {
        let input_name_cstrings = inputs
            .iter()
            .map(|(name, _)| {
                CString::new(*name).map_err(|_| OnnxError::runtime_error("Null byte in input name"))
            })
            .collect::<Result<Vec<_>>>()?;
        let input_name_ptrs: Vec<_> = input_name_cstrings.iter().map(|s| s.as_ptr()).collect();
        let input_value_ptrs: Vec<_> = inputs.iter().map(|(_, value)| value.as_ptr()).collect();

        let output_name_cstrings = output_names
            .iter()
            .map(|name| {
                CString::new(*name)
                    .map_err(|_| OnnxError::runtime_error("Null byte in output name"))
            })
            .collect::<Result<Vec<_>>>()?;
        let output_name_ptrs: Vec<_> = output_name_cstrings.iter().map(|s| s.as_ptr()).collect();

        let mut output_value_ptrs: Vec<*mut ffi::OrtValue> = vec![null_mut(); output_names.len()];

        let status = unsafe {
            (self.onnx.run)(
                self.session,
                null(),
                input_name_ptrs.as_ptr(),
                input_value_ptrs.as_ptr(),
                inputs.len(),
                output_name_ptrs.as_ptr(),
                output_names.len(),
                output_value_ptrs.as_mut_ptr(),
            )
        };

        // wrap whatever was produced first, so it is released on the error path too
        let outputs: Vec<Value> = output_value_ptrs
            .into_iter()
            .filter(|ptr| !ptr.is_null())
            .map(|ptr| unsafe { Value::from_raw(&self.onnx, ptr) })
            .collect();
        self.onnx.check(status)?;

        if outputs.len() != output_names.len() {
            return Err(OnnxError::runtime_error(format!(
                "Expected {} outputs, runtime produced {}",
                output_names.len(),
                outputs.len()
            )));
        }
        Ok(outputs)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.session.is_null() {
            unsafe { (self.onnx.release_session)(self.session) };
        }
    }
}
