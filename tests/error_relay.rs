use std::ffi::CString;

use gdal_bridge::errors::BridgeError;
use gdal_bridge::relay::{relayed, CplErrorGuard};
use gdal_bridge::Dataset;

fn raise(class: gdal_sys::CPLErr::Type, number: i32, msg: &str) {
    let msg = CString::new(msg).unwrap();
    unsafe {
        gdal_sys::CPLError(class, number, msg.as_ptr());
        gdal_sys::CPLErrorReset();
    }
}

#[test]
fn failures_surface_as_typed_errors() {
    let err = relayed(|| raise(gdal_sys::CPLErr::CE_Failure, 4, "no such thing")).unwrap_err();
    match err {
        BridgeError::NativeFailure {
            number, message, ..
        } => {
            assert_eq!(number, 4);
            assert_eq!(message, "no such thing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn warnings_do_not_fail_the_window() {
    let out = relayed(|| {
        raise(gdal_sys::CPLErr::CE_Warning, 1, "just a warning");
        21
    })
    .unwrap();
    assert_eq!(out, 21);
}

#[test]
fn nested_windows_capture_independently() {
    let outer = CplErrorGuard::push();
    let inner_err = relayed(|| raise(gdal_sys::CPLErr::CE_Failure, 7, "inner"));
    assert!(inner_err.is_err());
    // The inner window consumed its failure; the outer stays clean.
    assert!(outer.check().is_ok());
}

#[test]
fn open_failure_carries_the_path() {
    let err = Dataset::open("/definitely/not/here.tif").unwrap_err();
    match err {
        BridgeError::SourceOpen { path, .. } => {
            assert_eq!(path, "/definitely/not/here.tif");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_path_fails_without_touching_gdal() {
    assert!(matches!(
        Dataset::open(""),
        Err(BridgeError::SourceOpen { .. })
    ));
}
