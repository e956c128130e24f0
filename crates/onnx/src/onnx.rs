use {
    crate::*,
    std::{
        ffi::{CStr, CString},
        path::Path,
        ptr::null_mut,
        sync::Arc,
    },
};

/// C API version requested from the runtime.
pub const ORT_API_VERSION: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationLevel {
    Disabled,
    EnableBasic,
    EnableExtended,
    EnableAll,
}

impl From<OptimizationLevel> for ffi::GraphOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Disabled => ffi::GraphOptimizationLevel::DisableAll,
            OptimizationLevel::EnableBasic => ffi::GraphOptimizationLevel::EnableBasic,
            OptimizationLevel::EnableExtended => ffi::GraphOptimizationLevel::EnableExtended,
            OptimizationLevel::EnableAll => ffi::GraphOptimizationLevel::EnableAll,
        }
    }
}

/// Options applied to every session created from an [`Onnx`] context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub optimization_level: OptimizationLevel,
    pub intra_op_threads: usize,
    pub inter_op_threads: usize,
    pub sequential: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            optimization_level: OptimizationLevel::EnableExtended,
            intra_op_threads: 1,
            inter_op_threads: 1,
            sequential: true,
        }
    }
}

/// Runtime context: the versioned API table, one environment and the default allocator.
///
/// Sessions and values hold an `Arc<Onnx>`, so the environment is released only after
/// everything created from it is gone.
#[derive(Debug)]
pub struct Onnx {
    pub(crate) api: *const ffi::OrtApi,
    environment: *mut ffi::OrtEnv,
    pub(crate) allocator: *mut ffi::OrtAllocator,
    version: String,
    release_env: ffi::ReleaseEnvFn,
    pub(crate) allocator_free: ffi::AllocatorFreeFn,
    create_session: ffi::CreateSessionFn,
    create_session_from_array: ffi::CreateSessionFromArrayFn,
    create_session_options: ffi::CreateSessionOptionsFn,
    set_session_execution_mode: ffi::SetSessionExecutionModeFn,
    set_session_graph_optimization_level: ffi::SetSessionGraphOptimizationLevelFn,
    set_intra_op_num_threads: ffi::SetNumThreadsFn,
    set_inter_op_num_threads: ffi::SetNumThreadsFn,
    release_session_options: ffi::ReleaseSessionOptionsFn,
    pub(crate) session_get_input_count: ffi::SessionGetCountFn,
    pub(crate) session_get_output_count: ffi::SessionGetCountFn,
    pub(crate) session_get_input_name: ffi::SessionGetNameFn,
    pub(crate) session_get_output_name: ffi::SessionGetNameFn,
    pub(crate) session_get_input_type_info: ffi::SessionGetTypeInfoFn,
    pub(crate) session_get_output_type_info: ffi::SessionGetTypeInfoFn,
    pub(crate) release_type_info: ffi::ReleaseTypeInfoFn,
    pub(crate) cast_type_info_to_tensor_info: ffi::CastTypeInfoToTensorInfoFn,
    pub(crate) get_dimensions_count: ffi::GetDimensionsCountFn,
    pub(crate) get_dimensions: ffi::GetDimensionsFn,
    pub(crate) get_tensor_element_type: ffi::GetTensorElementTypeFn,
    pub(crate) run: ffi::RunFn,
    pub(crate) release_value: ffi::ReleaseValueFn,
    pub(crate) release_session: ffi::ReleaseSessionFn,
    pub(crate) create_memory_info: ffi::CreateCpuMemoryInfoFn,
    pub(crate) create_tensor: ffi::CreateTensorWithDataAsOrtValueFn,
    pub(crate) release_memory_info: ffi::ReleaseMemoryInfoFn,
    pub(crate) get_tensor_type_and_shape: ffi::GetTensorTypeAndShapeFn,
    pub(crate) get_tensor_shape_element_count: ffi::GetTensorShapeElementCountFn,
    pub(crate) release_tensor_type_and_shape_info: ffi::ReleaseTensorTypeAndShapeInfoFn,
    pub(crate) get_tensor_mutable_data: ffi::GetTensorMutableDataFn,
}

unsafe impl Send for Onnx {}
unsafe impl Sync for Onnx {}

// Session options only live until the session is created.
struct SessionOptions<'a> {
    onnx: &'a Onnx,
    options: *mut ffi::OrtSessionOptions,
}

impl Drop for SessionOptions<'_> {
    fn drop(&mut self) {
        if !self.options.is_null() {
            unsafe { (self.onnx.release_session_options)(self.options) };
        }
    }
}

fn thread_count(threads: usize) -> Result<i32> {
    i32::try_from(threads)
        .map_err(|_| OnnxError::runtime_error(format!("Thread count {} out of range", threads)))
}

impl Onnx {
    pub fn new(version: u32) -> Result<Arc<Self>> {
        let api_base = unsafe { ffi::OrtGetApiBase() };
        if api_base.is_null() {
            return Err(OnnxError::runtime_error(
                "Failed to get ONNX Runtime API base",
            ));
        }

        let version_ptr = unsafe { ((*api_base).GetVersionString)() };
        let version_string = if version_ptr.is_null() {
            String::from("unknown")
        } else {
            unsafe { CStr::from_ptr(version_ptr) }
                .to_string_lossy()
                .into_owned()
        };

        let api = unsafe { ((*api_base).GetApi)(version) };
        if api.is_null() {
            return Err(OnnxError::runtime_error(format!(
                "ONNX Runtime {} doesn't support API version {}",
                version_string, version
            )));
        }

        let api_ref = unsafe { &*api };
        let create_env: ffi::CreateEnvFn = unsafe { api_ref.get_fn(ffi::IDX_CREATE_ENV) };
        let get_allocator_with_default_options: ffi::GetAllocatorWithDefaultOptionsFn =
            unsafe { api_ref.get_fn(ffi::IDX_GET_ALLOCATOR_WITH_DEFAULT_OPTIONS) };

        // environment stays null until created, Drop skips it in that case
        let mut onnx = unsafe {
            Onnx {
                api,
                environment: null_mut(),
                allocator: null_mut(),
                version: version_string,
                release_env: api_ref.get_fn(ffi::IDX_RELEASE_ENV),
                allocator_free: api_ref.get_fn(ffi::IDX_ALLOCATOR_FREE),
                create_session: api_ref.get_fn(ffi::IDX_CREATE_SESSION),
                create_session_from_array: api_ref.get_fn(ffi::IDX_CREATE_SESSION_FROM_ARRAY),
                create_session_options: api_ref.get_fn(ffi::IDX_CREATE_SESSION_OPTIONS),
                set_session_execution_mode: api_ref.get_fn(ffi::IDX_SET_SESSION_EXECUTION_MODE),
                set_session_graph_optimization_level: api_ref
                    .get_fn(ffi::IDX_SET_SESSION_GRAPH_OPTIMIZATION_LEVEL),
                set_intra_op_num_threads: api_ref.get_fn(ffi::IDX_SET_INTRA_OP_NUM_THREADS),
                set_inter_op_num_threads: api_ref.get_fn(ffi::IDX_SET_INTER_OP_NUM_THREADS),
                release_session_options: api_ref.get_fn(ffi::IDX_RELEASE_SESSION_OPTIONS),
                session_get_input_count: api_ref.get_fn(ffi::IDX_SESSION_GET_INPUT_COUNT),
                session_get_output_count: api_ref.get_fn(ffi::IDX_SESSION_GET_OUTPUT_COUNT),
                session_get_input_name: api_ref.get_fn(ffi::IDX_SESSION_GET_INPUT_NAME),
                session_get_output_name: api_ref.get_fn(ffi::IDX_SESSION_GET_OUTPUT_NAME),
                session_get_input_type_info: api_ref.get_fn(ffi::IDX_SESSION_GET_INPUT_TYPE_INFO),
                session_get_output_type_info: api_ref
                    .get_fn(ffi::IDX_SESSION_GET_OUTPUT_TYPE_INFO),
                release_type_info: api_ref.get_fn(ffi::IDX_RELEASE_TYPE_INFO),
                cast_type_info_to_tensor_info: api_ref
                    .get_fn(ffi::IDX_CAST_TYPE_INFO_TO_TENSOR_INFO),
                get_dimensions_count: api_ref.get_fn(ffi::IDX_GET_DIMENSIONS_COUNT),
                get_dimensions: api_ref.get_fn(ffi::IDX_GET_DIMENSIONS),
                get_tensor_element_type: api_ref.get_fn(ffi::IDX_GET_TENSOR_ELEMENT_TYPE),
                run: api_ref.get_fn(ffi::IDX_RUN),
                release_value: api_ref.get_fn(ffi::IDX_RELEASE_VALUE),
                release_session: api_ref.get_fn(ffi::IDX_RELEASE_SESSION),
                create_memory_info: api_ref.get_fn(ffi::IDX_CREATE_CPU_MEMORY_INFO),
                create_tensor: api_ref.get_fn(ffi::IDX_CREATE_TENSOR_WITH_DATA_AS_ORT_VALUE),
                release_memory_info: api_ref.get_fn(ffi::IDX_RELEASE_MEMORY_INFO),
                get_tensor_type_and_shape: api_ref.get_fn(ffi::IDX_GET_TENSOR_TYPE_AND_SHAPE),
                get_tensor_shape_element_count: api_ref
                    .get_fn(ffi::IDX_GET_TENSOR_SHAPE_ELEMENT_COUNT),
                release_tensor_type_and_shape_info: api_ref
                    .get_fn(ffi::IDX_RELEASE_TENSOR_TYPE_AND_SHAPE_INFO),
                get_tensor_mutable_data: api_ref.get_fn(ffi::IDX_GET_TENSOR_MUTABLE_DATA),
            }
        };

        let status = unsafe {
            create_env(
                ffi::OrtLoggingLevel::Warning,
                c"onnx".as_ptr(),
                &mut onnx.environment,
            )
        };
        onnx.check(status)?;

        let status = unsafe { get_allocator_with_default_options(&mut onnx.allocator) };
        onnx.check(status)?;

        Ok(Arc::new(onnx))
    }

    /// Version string reported by the loaded runtime library.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub(crate) fn check(&self, status: *mut ffi::OrtStatus) -> Result<()> {
        if status.is_null() {
            Ok(())
        } else {
            Err(unsafe { OnnxError::from_status(self.api, status) })
        }
    }

    fn session_options(&self, config: &SessionConfig) -> Result<SessionOptions<'_>> {
        let mut options = SessionOptions {
            onnx: self,
            options: null_mut(),
        };
        self.check(unsafe { (self.create_session_options)(&mut options.options) })?;

        let mode = if config.sequential {
            ffi::ExecutionMode::Sequential
        } else {
            ffi::ExecutionMode::Parallel
        };
        self.check(unsafe { (self.set_session_execution_mode)(options.options, mode) })?;
        self.check(unsafe {
            (self.set_session_graph_optimization_level)(
                options.options,
                config.optimization_level.into(),
            )
        })?;
        let intra = thread_count(config.intra_op_threads)?;
        self.check(unsafe { (self.set_intra_op_num_threads)(options.options, intra) })?;
        let inter = thread_count(config.inter_op_threads)?;
        self.check(unsafe { (self.set_inter_op_num_threads)(options.options, inter) })?;

        Ok(options)
    }

    /// Load a model from a file.
    pub fn create_session(
        self: &Arc<Self>,
        config: &SessionConfig,
        model_path: impl AsRef<Path>,
    ) -> Result<Session> {
        let path_str = model_path
            .as_ref()
            .to_str()
            .ok_or_else(|| OnnxError::runtime_error("Invalid UTF-8 in model path"))?;
        let c_path = CString::new(path_str)
            .map_err(|_| OnnxError::runtime_error("Null byte in model path"))?;

        let options = self.session_options(config)?;
        let mut session: *mut ffi::OrtSession = null_mut();
        self.check(unsafe {
            (self.create_session)(
                self.environment,
                c_path.as_ptr(),
                options.options,
                &mut session,
            )
        })?;
        drop(options);

        Session::new(Arc::clone(self), session)
    }

    /// Load a model from serialized bytes already in memory.
    pub fn create_session_from_memory(
        self: &Arc<Self>,
        config: &SessionConfig,
        model: &[u8],
    ) -> Result<Session> {
        if model.is_empty() {
            return Err(OnnxError::new(
                ffi::OrtErrorCode::NoModel,
                "Model byte buffer is empty",
            ));
        }

        let options = self.session_options(config)?;
        let mut session: *mut ffi::OrtSession = null_mut();
        self.check(unsafe {
            (self.create_session_from_array)(
                self.environment,
                model.as_ptr() as *const std::ffi::c_void,
                model.len(),
                options.options,
                &mut session,
            )
        })?;
        drop(options);

        Session::new(Arc::clone(self), session)
    }
}

impl Drop for Onnx {
    fn drop(&mut self) {
        if !self.environment.is_null() {
            unsafe { (self.release_env)(self.environment) };
        }
    }
}
