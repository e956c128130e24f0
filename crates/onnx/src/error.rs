use crate::ffi::{self, OrtApi, OrtErrorCode, OrtStatus};
use std::ffi::CStr;
use std::fmt;

/// Error reported by ONNX Runtime, or raised by this wrapper around it.
#[derive(Debug, Clone)]
pub struct OnnxError {
    code: OrtErrorCode,
    message: String,
}

impl OnnxError {
    pub fn new(code: OrtErrorCode, message: impl Into<String>) -> Self {
        OnnxError {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn runtime_error(message: impl Into<String>) -> Self {
        Self::new(OrtErrorCode::RuntimeException, message)
    }

    /// Convert an OrtStatus into an error and release the status.
    ///
    /// # Safety
    /// - status must be a valid non-null OrtStatus pointer
    /// - api must be a valid OrtApi pointer
    pub(crate) unsafe fn from_status(api: *const OrtApi, status: *mut OrtStatus) -> Self {
        unsafe {
            let api_ref = &*api;

            let get_error_code: ffi::GetErrorCodeFn = api_ref.get_fn(ffi::IDX_GET_ERROR_CODE);
            let code = get_error_code(status);

            let get_error_message: ffi::GetErrorMessageFn =
                api_ref.get_fn(ffi::IDX_GET_ERROR_MESSAGE);
            let msg_ptr = get_error_message(status);
            let message = if msg_ptr.is_null() {
                String::from("Unknown error")
            } else {
                CStr::from_ptr(msg_ptr).to_string_lossy().into_owned()
            };

            let release_status: ffi::ReleaseStatusFn = api_ref.get_fn(ffi::IDX_RELEASE_STATUS);
            release_status(status);

            OnnxError { code, message }
        }
    }

    pub fn code(&self) -> OrtErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for OnnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ONNX error ({:?}): {}", self.code, self.message)
    }
}

impl std::error::Error for OnnxError {}

pub type Result<T> = std::result::Result<T, OnnxError>;
