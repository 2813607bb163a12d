//! In-memory VRT datasets.

use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use gdal_sys::{CPLErr, GDALDataType};
use libc::{c_char, c_int};

use crate::band::RasterBand;
use crate::cpl::CslStringList;
use crate::dataset::{driver_by_name, Dataset};
use crate::errors::{BridgeError, Result};
use crate::registry::HandleId;
use crate::utils::{_last_cpl_err, _last_null_pointer_err, _path_to_c_string};
use crate::vrt::VrtSimpleSource;

// Keys in the new_vrt_sources domain only need to be unique per band; a
// process-wide sequence is the simplest way to guarantee that.
static SOURCE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A virtual dataset composed of bands that read through to other datasets.
///
/// Wraps an ordinary [`Dataset`] handle; every dataset operation works on it
/// unchanged. Bands start empty and are populated by attaching simple
/// sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrtDataset {
    dataset: Dataset,
}

impl VrtDataset {
    /// Creates an empty VRT of the given pixel dimensions, with no bands.
    pub fn create(size_x: usize, size_y: usize) -> Result<VrtDataset> {
        if size_x == 0 || size_y == 0 {
            return Err(BridgeError::BadArgument {
                name: "size",
                message: format!("raster size must be positive, got {size_x}x{size_y}"),
            });
        }
        let c_driver = driver_by_name("VRT")?;
        let c_name = _path_to_c_string("")?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                c_driver,
                c_name.as_ptr(),
                size_x as c_int,
                size_y as c_int,
                0,
                GDALDataType::GDT_Unknown,
                ptr::null_mut(),
            )
        };
        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreate"));
        }
        Ok(VrtDataset {
            dataset: unsafe { Dataset::from_c_dataset(c_dataset) },
        })
    }

    pub fn from_handle(id: HandleId) -> Result<VrtDataset> {
        Ok(VrtDataset {
            dataset: Dataset::from_handle(id)?,
        })
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn id(&self) -> HandleId {
        self.dataset.id()
    }

    /// The band collection of this VRT.
    pub fn bands(&self) -> VrtDatasetBands {
        VrtDatasetBands {
            dataset: self.dataset,
        }
    }

    pub fn band_count(&self) -> Result<usize> {
        self.bands().count()
    }

    pub fn band(&self, band_index: usize) -> Result<RasterBand> {
        self.bands().get(band_index)
    }

    pub fn create_band(&self, data_type: &str) -> Result<RasterBand> {
        self.bands().create(data_type, &CslStringList::new())
    }

    /// Attaches a configured simple source to one of this VRT's bands.
    ///
    /// The VRT driver has no C entry point for source objects; it accepts
    /// them as XML through the band's `new_vrt_sources` metadata domain.
    pub fn add_source(&self, band_index: usize, source: &VrtSimpleSource) -> Result<()> {
        let band = self.band(band_index)?;
        let xml = source.to_xml()?;
        let key = format!("source_{}", SOURCE_SEQ.fetch_add(1, Ordering::Relaxed));
        band.set_metadata_item(&key, &xml, "new_vrt_sources")
    }
}

/// The bands of a [`VrtDataset`], as a collection.
#[derive(Debug, Clone, Copy)]
pub struct VrtDatasetBands {
    dataset: Dataset,
}

impl VrtDatasetBands {
    pub fn count(&self) -> Result<usize> {
        self.dataset.raster_count()
    }

    /// Fetches a band wrapper (1-based, per GDAL convention).
    pub fn get(&self, band_index: usize) -> Result<RasterBand> {
        self.dataset.band(band_index)
    }

    /// Appends a band of the named GDAL data type (`"Byte"`, `"Float64"`,
    /// ...) and returns its wrapper. `options` are the VRT driver's band
    /// creation options (`subclass`, `SourceTransferType`, ...).
    pub fn create(&self, data_type: &str, options: &CslStringList) -> Result<RasterBand> {
        let c_type_name = _path_to_c_string(data_type)?;
        let gdal_type = unsafe { gdal_sys::GDALGetDataTypeByName(c_type_name.as_ptr()) };
        if gdal_type == GDALDataType::GDT_Unknown {
            return Err(BridgeError::BadArgument {
                name: "data_type",
                message: format!("unknown pixel data type '{data_type}'"),
            });
        }
        let c_dataset = self.dataset.c_dataset()?;
        let rv = unsafe {
            gdal_sys::GDALAddBand(c_dataset, gdal_type, options.as_ptr() as *mut *mut c_char)
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        self.get(self.count()?)
    }
}
