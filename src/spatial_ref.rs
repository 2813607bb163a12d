//! Spatial reference systems and coordinate transformation.

use std::ffi::{c_void, CString};
use std::ptr;

use gdal_sys::{self, OGRCoordinateTransformationH, OGRErr, OGRSpatialReferenceH};
use libc::{c_double, c_int};

use crate::errors::{BridgeError, CplErrType, Result};
use crate::utils::{_last_null_pointer_err, _string};

fn ogr_err(rv: OGRErr::Type, method_name: &'static str) -> BridgeError {
    BridgeError::NativeFailure {
        class: CplErrType::Failure,
        number: rv as c_int,
        message: format!("OGR error {rv} in {method_name}"),
    }
}

/// Owned OGR spatial reference.
///
/// All constructors force traditional GIS axis order (x = easting/longitude)
/// so coordinates line up with geo-transform space regardless of the
/// authority's axis definition.
#[derive(Debug)]
pub struct SpatialRef(OGRSpatialReferenceH);

impl Drop for SpatialRef {
    fn drop(&mut self) {
        unsafe { gdal_sys::OSRRelease(self.0) };
    }
}

impl Clone for SpatialRef {
    fn clone(&self) -> SpatialRef {
        let n_obj = unsafe { gdal_sys::OSRClone(self.0) };
        SpatialRef(n_obj)
    }
}

impl SpatialRef {
    fn new_empty() -> Result<OGRSpatialReferenceH> {
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(ptr::null()) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRNewSpatialReference"));
        }
        Ok(c_obj)
    }

    fn finish(c_obj: OGRSpatialReferenceH) -> SpatialRef {
        unsafe {
            gdal_sys::OSRSetAxisMappingStrategy(
                c_obj,
                gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
            );
        }
        SpatialRef(c_obj)
    }

    /// Builds from anything `OSRSetFromUserInput` accepts: WKT, PROJ
    /// strings, or `"EPSG:nnnn"` codes.
    pub fn from_definition(definition: &str) -> Result<SpatialRef> {
        let c_obj = Self::new_empty()?;
        let c_definition = CString::new(definition)?;
        let rv = unsafe { gdal_sys::OSRSetFromUserInput(c_obj, c_definition.as_ptr()) };
        if rv != OGRErr::OGRERR_NONE {
            unsafe { gdal_sys::OSRRelease(c_obj) };
            return Err(ogr_err(rv, "OSRSetFromUserInput"));
        }
        Ok(Self::finish(c_obj))
    }

    pub fn from_wkt(wkt: &str) -> Result<SpatialRef> {
        let c_str = CString::new(wkt)?;
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(c_str.as_ptr()) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRNewSpatialReference"));
        }
        Ok(Self::finish(c_obj))
    }

    pub fn from_epsg(epsg_code: u32) -> Result<SpatialRef> {
        let c_obj = Self::new_empty()?;
        let rv = unsafe { gdal_sys::OSRImportFromEPSG(c_obj, epsg_code as c_int) };
        if rv != OGRErr::OGRERR_NONE {
            unsafe { gdal_sys::OSRRelease(c_obj) };
            return Err(ogr_err(rv, "OSRImportFromEPSG"));
        }
        Ok(Self::finish(c_obj))
    }

    pub fn to_wkt(&self) -> Result<String> {
        let mut c_wkt = ptr::null_mut();
        let rv = unsafe { gdal_sys::OSRExportToWkt(self.0, &mut c_wkt) };
        if rv != OGRErr::OGRERR_NONE {
            return Err(ogr_err(rv, "OSRExportToWkt"));
        }
        let wkt = _string(c_wkt);
        unsafe { gdal_sys::CPLFree(c_wkt as *mut c_void) };
        Ok(wkt)
    }

    pub fn is_same(&self, other: &SpatialRef) -> bool {
        unsafe { gdal_sys::OSRIsSame(self.0, other.0) != 0 }
    }

    pub(crate) fn as_ptr(&self) -> OGRSpatialReferenceH {
        self.0
    }
}

/// Owned coordinate transformation between two spatial references.
pub struct CoordTransform(OGRCoordinateTransformationH);

impl Drop for CoordTransform {
    fn drop(&mut self) {
        unsafe { gdal_sys::OCTDestroyCoordinateTransformation(self.0) };
    }
}

impl CoordTransform {
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform> {
        let c_obj = unsafe { gdal_sys::OCTNewCoordinateTransformation(source.0, target.0) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OCTNewCoordinateTransformation"));
        }
        Ok(CoordTransform(c_obj))
    }

    /// Transforms coordinate pairs in place.
    pub fn transform_coords(&self, x: &mut [f64], y: &mut [f64]) -> Result<()> {
        let nb_coords = x.len().min(y.len());
        let ret_val = unsafe {
            gdal_sys::OCTTransform(
                self.0,
                nb_coords as c_int,
                x.as_mut_ptr() as *mut c_double,
                y.as_mut_ptr() as *mut c_double,
                ptr::null_mut(),
            )
        };
        if ret_val == 0 {
            return Err(_last_null_pointer_err("OCTTransform"));
        }
        Ok(())
    }
}
