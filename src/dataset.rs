//! Dataset facade.

use std::ffi::c_uint;
use std::ptr;
use std::sync::Once;

use bitflags::bitflags;
use gdal_sys::{CPLErr, GDALDatasetH, GDALDriverH};
use libc::c_int;
use log::debug;

use crate::band::RasterBand;
use crate::errors::{BridgeError, Result};
use crate::registry::{self, HandleId, HandleKind, Release};
use crate::relay;
use crate::utils::{_last_cpl_err, _last_null_pointer_err, _path_to_c_string, _string};
use crate::{cache, spatial_ref::SpatialRef};

/// Affine geo-transform coefficients, in GDAL's order.
pub type GeoTransform = [f64; 6];

static START: Once = Once::new();

pub(crate) fn _register_drivers() {
    START.call_once(|| unsafe {
        gdal_sys::GDALAllRegister();
    });
}

bitflags! {
    /// Subset of `GDALOpenEx` flags the bridge uses.
    #[derive(Debug, Clone, Copy)]
    pub struct GdalOpenFlags: c_uint {
        const GDAL_OF_READONLY = 0x00;
        const GDAL_OF_UPDATE = 0x01;
        const GDAL_OF_RASTER = 0x02;
        const GDAL_OF_VERBOSE_ERROR = 0x40;
    }
}

impl Default for GdalOpenFlags {
    fn default() -> GdalOpenFlags {
        GdalOpenFlags::GDAL_OF_READONLY
    }
}

pub(crate) fn driver_by_name(name: &str) -> Result<GDALDriverH> {
    _register_drivers();
    let c_name = _path_to_c_string(name)?;
    let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_name.as_ptr()) };
    if c_driver.is_null() {
        return Err(_last_null_pointer_err("GDALGetDriverByName"));
    }
    Ok(c_driver)
}

/// A native dataset pointer not yet exposed to the host.
///
/// Intermediate results of multi-stage operations live here so that an early
/// `?` return closes them instead of leaking; `into_wrapped` transfers
/// ownership to the registry once the result is final.
pub(crate) struct OwnedDataset(GDALDatasetH);

impl OwnedDataset {
    pub(crate) fn open(path: &str, flags: GdalOpenFlags) -> Result<Self> {
        if path.is_empty() {
            return Err(BridgeError::SourceOpen {
                path: path.to_owned(),
                message: "source file path cannot be empty".to_owned(),
            });
        }
        _register_drivers();
        let c_path = _path_to_c_string(path)?;
        let c_dataset = relay::relayed(|| unsafe {
            gdal_sys::GDALOpenEx(
                c_path.as_ptr(),
                flags.bits(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
            )
        })
        .map_err(|err| BridgeError::SourceOpen {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
        if c_dataset.is_null() {
            return Err(BridgeError::SourceOpen {
                path: path.to_owned(),
                message: "GDALOpenEx returned a NULL dataset".to_owned(),
            });
        }
        Ok(OwnedDataset(c_dataset))
    }

    pub(crate) unsafe fn from_c_dataset(c_dataset: GDALDatasetH) -> Self {
        OwnedDataset(c_dataset)
    }

    pub(crate) fn as_ptr(&self) -> GDALDatasetH {
        self.0
    }

    /// Hands the pointer to the registry and returns the host-facing wrapper.
    pub(crate) fn into_wrapped(self) -> Dataset {
        let ptr = self.0;
        std::mem::forget(self);
        unsafe { Dataset::from_c_dataset(ptr) }
    }
}

impl Drop for OwnedDataset {
    fn drop(&mut self) {
        debug!("closing intermediate dataset [{:p}]", self.0);
        unsafe { gdal_sys::GDALClose(self.0) };
    }
}

/// Host-visible wrapper around a native GDAL dataset.
///
/// Holds only the handle id; every operation resolves it through the
/// registry so use-after-dispose surfaces as an error instead of a
/// dereference of freed memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset {
    id: HandleId,
}

impl Dataset {
    /// Opens a raster source read-only.
    pub fn open(path: &str) -> Result<Dataset> {
        Ok(OwnedDataset::open(
            path,
            GdalOpenFlags::GDAL_OF_RASTER | GdalOpenFlags::GDAL_OF_VERBOSE_ERROR,
        )?
        .into_wrapped())
    }

    /// Wraps a native dataset pointer, reusing the existing handle if this
    /// pointer has been wrapped before.
    ///
    /// # Safety
    /// `c_dataset` must be a live dataset whose ownership passes to the
    /// bridge.
    pub unsafe fn from_c_dataset(c_dataset: GDALDatasetH) -> Dataset {
        let ptr = c_dataset as usize;
        let id = cache::get_or_create(HandleKind::Dataset, ptr, || {
            registry::add(ptr, HandleKind::Dataset, Release::DatasetClose)
        });
        Dataset { id }
    }

    pub fn from_handle(id: HandleId) -> Result<Dataset> {
        registry::live_ptr_of(id, HandleKind::Dataset)?;
        Ok(Dataset { id })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        registry::is_alive(self.id)
    }

    /// Closes the native dataset. Idempotent; a second call is a no-op.
    pub fn dispose(&self) {
        registry::dispose(self.id);
    }

    pub(crate) fn c_dataset(&self) -> Result<GDALDatasetH> {
        Ok(registry::live_ptr_of(self.id, HandleKind::Dataset)? as GDALDatasetH)
    }

    pub fn raster_size(&self) -> Result<(usize, usize)> {
        let c_dataset = self.c_dataset()?;
        let size_x = unsafe { gdal_sys::GDALGetRasterXSize(c_dataset) } as usize;
        let size_y = unsafe { gdal_sys::GDALGetRasterYSize(c_dataset) } as usize;
        Ok((size_x, size_y))
    }

    pub fn raster_count(&self) -> Result<usize> {
        let c_dataset = self.c_dataset()?;
        Ok(unsafe { gdal_sys::GDALGetRasterCount(c_dataset) } as usize)
    }

    /// The dataset description; for file-backed datasets this is the path it
    /// was opened from.
    pub fn description(&self) -> Result<String> {
        let c_dataset = self.c_dataset()?;
        Ok(_string(unsafe { gdal_sys::GDALGetDescription(c_dataset) }))
    }

    pub fn projection(&self) -> Result<String> {
        let c_dataset = self.c_dataset()?;
        Ok(_string(unsafe {
            gdal_sys::GDALGetProjectionRef(c_dataset)
        }))
    }

    pub fn set_projection(&self, projection: &str) -> Result<()> {
        let c_dataset = self.c_dataset()?;
        let c_projection = _path_to_c_string(projection)?;
        let rv = unsafe { gdal_sys::GDALSetProjection(c_dataset, c_projection.as_ptr()) };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }

    pub fn spatial_ref(&self) -> Result<SpatialRef> {
        let wkt = self.projection()?;
        if wkt.is_empty() {
            return Err(BridgeError::NullPointer {
                method_name: "GDALGetProjectionRef",
                message: "dataset has no projection".to_owned(),
            });
        }
        SpatialRef::from_wkt(&wkt)
    }

    pub fn geo_transform(&self) -> Result<GeoTransform> {
        let c_dataset = self.c_dataset()?;
        let mut transform = GeoTransform::default();
        let rv = unsafe { gdal_sys::GDALGetGeoTransform(c_dataset, transform.as_mut_ptr()) };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(transform)
    }

    pub fn set_geo_transform(&self, transform: &GeoTransform) -> Result<()> {
        let c_dataset = self.c_dataset()?;
        let rv = unsafe {
            gdal_sys::GDALSetGeoTransform(c_dataset, transform.as_ptr() as *mut f64)
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }

    /// Fetches a raster band (1-based, per GDAL convention) as a child
    /// handle retired together with this dataset.
    pub fn band(&self, band_index: usize) -> Result<RasterBand> {
        let c_dataset = self.c_dataset()?;
        let c_band =
            unsafe { gdal_sys::GDALGetRasterBand(c_dataset, band_index as c_int) };
        if c_band.is_null() {
            return Err(_last_null_pointer_err("GDALGetRasterBand"));
        }
        RasterBand::wrap(self.id, c_band)
    }
}
