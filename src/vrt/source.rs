//! Simple sources feeding VRT bands.

use std::ffi::CString;
use std::fmt::Write as _;
use std::sync::Mutex;

use gdal_sys::GDALRasterBandH;
use libc::{c_int, c_void};

use crate::cache;
use crate::dataset::{Dataset, GdalOpenFlags, OwnedDataset};
use crate::errors::{BridgeError, Result};
use crate::registry::{self, HandleId, HandleKind, Release};
use crate::relay;
use crate::utils::{_last_null_pointer_err, _string};

/// A pixel rectangle in source or destination space. VRT rects take
/// fractional offsets and sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub x_off: f64,
    pub y_off: f64,
    pub x_size: f64,
    pub y_size: f64,
}

#[derive(Debug, Default)]
struct SourceFields {
    source_path: String,
    source_band: usize,
    src_window: Option<Window>,
    dst_window: Option<Window>,
    resampling: Option<String>,
    no_data: Option<f64>,
    use_mask_band: bool,
}

/// Bridge-owned definition behind a [`VrtSimpleSource`] handle.
///
/// Unlike datasets there is no native object until the source is attached to
/// a band; the registry owns this box and reclaims it at disposal.
pub(crate) struct SourceDef {
    inner: Mutex<SourceFields>,
}

fn escape_xml(raw: &str) -> Result<String> {
    let c_raw = CString::new(raw)?;
    let c_escaped = unsafe {
        gdal_sys::CPLEscapeString(c_raw.as_ptr(), -1, gdal_sys::CPLES_XML as c_int)
    };
    if c_escaped.is_null() {
        return Err(_last_null_pointer_err("CPLEscapeString"));
    }
    let escaped = _string(c_escaped);
    unsafe { gdal_sys::CPLFree(c_escaped as *mut c_void) };
    Ok(escaped)
}

/// Host-visible builder for one `<SimpleSource>` element of a VRT band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrtSimpleSource {
    id: HandleId,
}

impl VrtSimpleSource {
    pub fn new() -> VrtSimpleSource {
        let def = Box::new(SourceDef {
            inner: Mutex::new(SourceFields::default()),
        });
        let ptr = Box::into_raw(def) as usize;
        let id = cache::get_or_create(HandleKind::VrtSource, ptr, || {
            registry::add(ptr, HandleKind::VrtSource, Release::BoxedSource)
        });
        VrtSimpleSource { id }
    }

    pub fn from_handle(id: HandleId) -> Result<VrtSimpleSource> {
        registry::live_ptr_of(id, HandleKind::VrtSource)?;
        Ok(VrtSimpleSource { id })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        registry::is_alive(self.id)
    }

    pub fn dispose(&self) {
        registry::dispose(self.id);
    }

    fn with_fields<T>(&self, f: impl FnOnce(&mut SourceFields) -> T) -> Result<T> {
        let ptr = registry::live_ptr_of(self.id, HandleKind::VrtSource)? as *const SourceDef;
        let def = unsafe { &*ptr };
        let mut fields = match def.inner.lock() {
            Ok(guard) => guard,
            Err(poison_error) => poison_error.into_inner(),
        };
        Ok(f(&mut fields))
    }

    /// Points the source at one band of an already opened dataset.
    pub fn set_src_band(&self, dataset: &Dataset, band_index: usize) -> Result<()> {
        if band_index < 1 || band_index > dataset.raster_count()? {
            return Err(BridgeError::BadArgument {
                name: "band_index",
                message: format!("band {band_index} is out of range"),
            });
        }
        let path = dataset.description()?;
        if path.is_empty() {
            return Err(BridgeError::BadArgument {
                name: "dataset",
                message: "source dataset has no file name".to_owned(),
            });
        }
        self.with_fields(|fields| {
            fields.source_path = path;
            fields.source_band = band_index;
        })
    }

    /// The rectangle read from the source band.
    pub fn set_src_window(&self, window: Window) -> Result<()> {
        check_window("src_window", &window)?;
        self.with_fields(|fields| fields.src_window = Some(window))
    }

    /// The rectangle written into the VRT band.
    pub fn set_dst_window(&self, window: Window) -> Result<()> {
        check_window("dst_window", &window)?;
        self.with_fields(|fields| fields.dst_window = Some(window))
    }

    /// Resampling kernel the VRT driver applies when the windows differ in
    /// size (`"nearest"`, `"bilinear"`, ...).
    pub fn set_resampling(&self, resampling: &str) -> Result<()> {
        if resampling.is_empty() || !resampling.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BridgeError::BadArgument {
                name: "resampling",
                message: format!("invalid resampling name '{resampling}'"),
            });
        }
        let resampling = resampling.to_owned();
        self.with_fields(|fields| fields.resampling = Some(resampling))
    }

    /// Source pixel value treated as transparent. Setting this upgrades the
    /// serialized element to a `ComplexSource`, which is where the VRT
    /// driver honors nodata.
    pub fn set_no_data_value(&self, value: f64) -> Result<()> {
        self.with_fields(|fields| fields.no_data = Some(value))
    }

    /// Masks the source through the mask band of the referenced source band.
    pub fn set_use_mask_band(&self, use_mask_band: bool) -> Result<()> {
        self.with_fields(|fields| fields.use_mask_band = use_mask_band)
    }

    /// Reopens the source this definition points at and yields its band.
    /// The dataset is returned alongside because it owns the band pointer.
    fn open_source_band(&self) -> Result<(OwnedDataset, GDALRasterBandH)> {
        let (path, band_index) = self.with_fields(|fields| {
            (fields.source_path.clone(), fields.source_band)
        })?;
        if path.is_empty() || band_index == 0 {
            return Err(BridgeError::BadArgument {
                name: "source",
                message: "source band must be set before statistics are computed".to_owned(),
            });
        }
        let src = OwnedDataset::open(
            &path,
            GdalOpenFlags::GDAL_OF_RASTER | GdalOpenFlags::GDAL_OF_VERBOSE_ERROR,
        )?;
        let c_band = unsafe { gdal_sys::GDALGetRasterBand(src.as_ptr(), band_index as c_int) };
        if c_band.is_null() {
            return Err(_last_null_pointer_err("GDALGetRasterBand"));
        }
        Ok((src, c_band))
    }

    /// Opens the referenced source and computes its band minimum/maximum
    /// under the error relay. Open failures surface as [`BridgeError::SourceOpen`].
    pub fn compute_min_max(&self, allow_approximation: bool) -> Result<(f64, f64)> {
        let (_src, c_band) = self.open_source_band()?;
        let mut min_max = [0f64; 2];
        relay::relayed(|| unsafe {
            let _ = gdal_sys::GDALComputeRasterMinMax(
                c_band,
                allow_approximation as c_int,
                min_max.as_mut_ptr(),
            );
        })?;
        Ok((min_max[0], min_max[1]))
    }

    /// The known minimum of the referenced band, from its stored statistics
    /// or data type. `None` when the band reports no usable minimum.
    pub fn get_minimum(&self) -> Result<Option<f64>> {
        let (_src, c_band) = self.open_source_band()?;
        let mut success: c_int = 0;
        let mut value = 0f64;
        relay::relayed(|| {
            value = unsafe { gdal_sys::GDALGetRasterMinimum(c_band, &mut success) };
        })?;
        Ok((success != 0).then_some(value))
    }

    /// The known maximum of the referenced band. `None` when the band
    /// reports no usable maximum.
    pub fn get_maximum(&self) -> Result<Option<f64>> {
        let (_src, c_band) = self.open_source_band()?;
        let mut success: c_int = 0;
        let mut value = 0f64;
        relay::relayed(|| {
            value = unsafe { gdal_sys::GDALGetRasterMaximum(c_band, &mut success) };
        })?;
        Ok((success != 0).then_some(value))
    }

    /// Serializes the source the way the VRT driver consumes it through the
    /// `new_vrt_sources` metadata domain.
    pub(crate) fn to_xml(&self) -> Result<String> {
        self.with_fields(|fields| {
            if fields.source_path.is_empty() || fields.source_band == 0 {
                return Err(BridgeError::BadArgument {
                    name: "source",
                    message: "source band must be set before the source is attached".to_owned(),
                });
            }
            // NODATA is only honored on ComplexSource elements.
            let element = if fields.no_data.is_some() {
                "ComplexSource"
            } else {
                "SimpleSource"
            };
            let mut xml = String::new();
            match &fields.resampling {
                Some(resampling) => {
                    let _ = writeln!(xml, "<{element} resampling=\"{resampling}\">");
                }
                None => {
                    let _ = writeln!(xml, "<{element}>");
                }
            }
            let _ = writeln!(
                xml,
                "  <SourceFilename relativeToVRT=\"0\">{}</SourceFilename>",
                escape_xml(&fields.source_path)?
            );
            let _ = writeln!(xml, "  <SourceBand>{}</SourceBand>", fields.source_band);
            if let Some(no_data) = fields.no_data {
                let _ = writeln!(xml, "  <NODATA>{no_data}</NODATA>");
            }
            if fields.use_mask_band {
                let _ = writeln!(xml, "  <UseMaskBand>true</UseMaskBand>");
            }
            if let Some(w) = fields.src_window {
                let _ = writeln!(
                    xml,
                    "  <SrcRect xOff=\"{}\" yOff=\"{}\" xSize=\"{}\" ySize=\"{}\" />",
                    w.x_off, w.y_off, w.x_size, w.y_size
                );
            }
            if let Some(w) = fields.dst_window {
                let _ = writeln!(
                    xml,
                    "  <DstRect xOff=\"{}\" yOff=\"{}\" xSize=\"{}\" ySize=\"{}\" />",
                    w.x_off, w.y_off, w.x_size, w.y_size
                );
            }
            let _ = write!(xml, "</{element}>");
            Ok(xml)
        })?
    }
}

impl Default for VrtSimpleSource {
    fn default() -> Self {
        Self::new()
    }
}

fn check_window(name: &'static str, window: &Window) -> Result<()> {
    if window.x_size <= 0.0 || window.y_size <= 0.0 {
        return Err(BridgeError::BadArgument {
            name,
            message: format!(
                "window size must be positive, got {}x{}",
                window.x_size, window.y_size
            ),
        });
    }
    Ok(())
}
