//! Bridge error types.

use gdal_sys::CPLErr;
use libc::c_int;
use thiserror::Error;

use crate::registry::HandleId;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error class carried by GDAL's error reporting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CplErrType {
    None,
    Debug,
    Warning,
    Failure,
    Fatal,
}

impl From<CPLErr::Type> for CplErrType {
    fn from(error_type: CPLErr::Type) -> Self {
        match error_type {
            CPLErr::CE_None => Self::None,
            CPLErr::CE_Debug => Self::Debug,
            CPLErr::CE_Warning => Self::Warning,
            CPLErr::CE_Failure => Self::Failure,
            CPLErr::CE_Fatal => Self::Fatal,
            _ => Self::Failure,
        }
    }
}

/// Every failure the bridge can surface to the host.
///
/// The first four variants are the call-boundary taxonomy; the remainder
/// cover FFI conversions that can fail before a native call is attempted.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Bad arity, type, or range on a call boundary, detected before any
    /// native call is attempted.
    #[error("invalid argument '{name}': {message}")]
    BadArgument {
        name: &'static str,
        message: String,
    },
    /// The native library could not open the requested source.
    #[error("could not open source '{path}': {message}")]
    SourceOpen { path: String, message: String },
    /// GDAL reported a failure through its error handler during a relayed
    /// call window.
    #[error("GDAL error class: '{class:?}', error number: '{number}', error msg: '{message}'")]
    NativeFailure {
        class: CplErrType,
        number: c_int,
        message: String,
    },
    /// An operation was attempted on a handle that has been disposed.
    #[error("handle {id} has already been disposed")]
    UseAfterDispose { id: HandleId },
    /// A GDAL entry point returned NULL outside a relayed window.
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{message}'")]
    NullPointer {
        method_name: &'static str,
        message: String,
    },
    #[error("FFI Nul error: {0:?}")]
    FfiNulError(#[from] std::ffi::NulError),
    #[error("FFI Utf8 error: {0:?}")]
    StrUtf8Error(#[from] std::str::Utf8Error),
}
