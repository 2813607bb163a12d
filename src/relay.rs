//! Native error relay.
//!
//! GDAL reports most failures through a process error handler rather than
//! return values, and the host has no channel of its own for that stream.
//! The relay scopes a handler around one native call window and re-raises
//! anything of failure class as a [`BridgeError::NativeFailure`] once the
//! call returns.
//!
//! Handlers nest: [`CplErrorGuard::push`] saves the previously installed
//! handler (GDAL keeps a per-thread handler stack since 2.x) and the guard's
//! drop restores it on every exit path, including early `?` returns. An
//! error raised while an inner guard is active is captured by that guard
//! only.

use std::ffi::c_void;

use gdal_sys::{CPLErr, CPLErrorNum};
use libc::c_char;
use log::warn;

use crate::errors::{BridgeError, CplErrType, Result};
use crate::utils::_string;

struct Captured {
    failure: Option<BridgeError>,
}

unsafe extern "C" fn relay_handler(
    class: CPLErr::Type,
    number: CPLErrorNum,
    message: *const c_char,
) {
    let slot = gdal_sys::CPLGetErrorHandlerUserData() as *mut Captured;
    if slot.is_null() {
        return;
    }
    let class: CplErrType = class.into();
    match class {
        CplErrType::Failure | CplErrType::Fatal => {
            // Keep the last failure; GDAL may emit several for one call.
            (*slot).failure = Some(BridgeError::NativeFailure {
                class,
                number,
                message: _string(message),
            });
        }
        CplErrType::Warning => warn!("GDAL warning {}: {}", number, _string(message)),
        _ => {}
    }
}

/// Scoped capture of GDAL errors for one native call window.
pub struct CplErrorGuard {
    slot: *mut Captured,
}

impl CplErrorGuard {
    /// Installs the capturing handler, saving the previously active one.
    pub fn push() -> Self {
        let slot = Box::into_raw(Box::new(Captured { failure: None }));
        unsafe {
            gdal_sys::CPLPushErrorHandlerEx(Some(relay_handler), slot as *mut c_void);
        }
        CplErrorGuard { slot }
    }

    /// Pops the handler and yields the failure captured in this window, if
    /// any.
    pub fn check(mut self) -> Result<()> {
        match self.take_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
        // drop(self) restores the previous handler
    }

    fn take_failure(&mut self) -> Option<BridgeError> {
        unsafe { (*self.slot).failure.take() }
    }
}

impl Drop for CplErrorGuard {
    fn drop(&mut self) {
        unsafe {
            gdal_sys::CPLPopErrorHandler();
            drop(Box::from_raw(self.slot));
        }
    }
}

/// Runs `f` with a relay window around it, surfacing any captured failure
/// after the native call returns.
///
/// When no error fires during the window the call succeeds even if the
/// native return value is otherwise ambiguous.
pub fn relayed<T>(f: impl FnOnce() -> T) -> Result<T> {
    let guard = CplErrorGuard::push();
    let out = f();
    guard.check()?;
    Ok(out)
}
