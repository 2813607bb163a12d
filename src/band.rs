//! Raster band facade.

use gdal_sys::{CPLErr, GDALDataType, GDALMajorObjectH, GDALRWFlag, GDALRasterBandH};
use libc::{c_double, c_int};

use crate::cache;
use crate::errors::Result;
use crate::registry::{self, HandleId, HandleKind, Release};
use crate::relay;
use crate::utils::{_last_cpl_err, _path_to_c_string};

/// Host-visible wrapper around a raster band.
///
/// Band pointers are owned by their dataset; the handle is registered as a
/// child so disposing the dataset retires the band handles first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterBand {
    id: HandleId,
}

impl RasterBand {
    pub(crate) fn wrap(parent: HandleId, c_band: GDALRasterBandH) -> Result<Self> {
        let ptr = c_band as usize;
        let id = cache::get_or_create(HandleKind::Band, ptr, || {
            registry::add(ptr, HandleKind::Band, Release::Borrowed)
        });
        registry::link_child(parent, id);
        Ok(RasterBand { id })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        registry::is_alive(self.id)
    }

    pub fn from_handle(id: HandleId) -> Result<RasterBand> {
        registry::live_ptr_of(id, HandleKind::Band)?;
        Ok(RasterBand { id })
    }

    fn c_band(&self) -> Result<GDALRasterBandH> {
        Ok(registry::live_ptr_of(self.id, HandleKind::Band)? as GDALRasterBandH)
    }

    pub fn size(&self) -> Result<(usize, usize)> {
        let c_band = self.c_band()?;
        let x = unsafe { gdal_sys::GDALGetRasterBandXSize(c_band) } as usize;
        let y = unsafe { gdal_sys::GDALGetRasterBandYSize(c_band) } as usize;
        Ok((x, y))
    }

    pub fn no_data_value(&self) -> Result<Option<f64>> {
        let c_band = self.c_band()?;
        let mut success: c_int = 0;
        let value = unsafe { gdal_sys::GDALGetRasterNoDataValue(c_band, &mut success) };
        Ok((success != 0).then_some(value))
    }

    /// Reads a window of this band as doubles.
    pub fn read_as_f64(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
        out_size: (usize, usize),
    ) -> Result<Vec<f64>> {
        let c_band = self.c_band()?;
        let mut data = vec![0f64; out_size.0 * out_size.1];
        let rv = unsafe {
            gdal_sys::GDALRasterIO(
                c_band,
                GDALRWFlag::GF_Read,
                window.0 as c_int,
                window.1 as c_int,
                window_size.0 as c_int,
                window_size.1 as c_int,
                data.as_mut_ptr() as *mut libc::c_void,
                out_size.0 as c_int,
                out_size.1 as c_int,
                GDALDataType::GDT_Float64,
                0,
                0,
            )
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(data)
    }

    /// Computes the band minimum/maximum under the error relay.
    pub fn compute_min_max(&self, allow_approximation: bool) -> Result<(f64, f64)> {
        let c_band = self.c_band()?;
        let mut min_max = [0f64; 2];
        relay::relayed(|| unsafe {
            // The return type of GDALComputeRasterMinMax changed across GDAL
            // versions; the relay carries the failure either way.
            let _ = gdal_sys::GDALComputeRasterMinMax(
                c_band,
                allow_approximation as c_int,
                min_max.as_mut_ptr() as *mut c_double,
            );
        })?;
        Ok((min_max[0], min_max[1]))
    }

    pub(crate) fn set_metadata_item(&self, key: &str, value: &str, domain: &str) -> Result<()> {
        let c_band = self.c_band()?;
        let c_key = _path_to_c_string(key)?;
        let c_value = _path_to_c_string(value)?;
        let c_domain = _path_to_c_string(domain)?;
        let rv = unsafe {
            gdal_sys::GDALSetMetadataItem(
                c_band as GDALMajorObjectH,
                c_key.as_ptr(),
                c_value.as_ptr(),
                c_domain.as_ptr(),
            )
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }
}
