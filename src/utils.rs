use gdal_sys::CPLErr;
use libc::c_char;
use std::ffi::{CStr, CString};
use std::path::Path;

use crate::errors::*;

/// Copies a NUL-terminated GDAL string into an owned `String`.
pub fn _string(raw_ptr: *const c_char) -> String {
    if raw_ptr.is_null() {
        return String::new();
    }
    let c_str = unsafe { CStr::from_ptr(raw_ptr) };
    c_str.to_string_lossy().into_owned()
}

pub fn _last_cpl_err(cpl_err_class: CPLErr::Type) -> BridgeError {
    let last_err_no = unsafe { gdal_sys::CPLGetLastErrorNo() };
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    BridgeError::NativeFailure {
        class: cpl_err_class.into(),
        number: last_err_no,
        message: last_err_msg,
    }
}

pub fn _last_null_pointer_err(method_name: &'static str) -> BridgeError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    BridgeError::NullPointer {
        method_name,
        message: last_err_msg,
    }
}

pub fn _path_to_c_string<P: AsRef<Path>>(path: P) -> Result<CString> {
    let path_str = path.as_ref().to_string_lossy();
    CString::new(path_str.as_ref()).map_err(Into::into)
}
