//! Windowed raster extraction, with an optional reprojecting variant.
//!
//! These are thin parameterizations of `GDALTranslate` producing in-memory
//! datasets. One internal pipeline backs all variants; they differ only in
//! whether the result is handed to the host as a dataset handle or read out
//! as a pixel buffer, and whether a reprojection stage runs in between.

use std::ffi::{c_void, CString};
use std::ptr::{null, null_mut};

use gdal_sys::{
    CPLErr, GDALDataType, GDALDatasetH, GDALRWFlag, GDALResampleAlg, GDALTranslateOptions,
};
use libc::{c_char, c_int};
use log::debug;

use crate::cpl::CslStringList;
use crate::dataset::{driver_by_name, Dataset, GdalOpenFlags, OwnedDataset};
use crate::errors::{BridgeError, Result};
use crate::relay;
use crate::spatial_ref::{CoordTransform, SpatialRef};
use crate::utils::{_last_cpl_err, _last_null_pointer_err, _path_to_c_string, _string};

/// Geographic bounding box, `min_x < max_x` and `min_y < max_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Parses `[min_x, min_y, max_x, max_y]`.
    pub fn from_slice(values: &[f64]) -> Result<BoundingBox> {
        if values.len() != 4 {
            return Err(BridgeError::BadArgument {
                name: "bbox",
                message: format!("bounding box must have 4 entries, got {}", values.len()),
            });
        }
        // NaN slips past the ordering comparisons below.
        if values.iter().any(|v| !v.is_finite()) {
            return Err(BridgeError::BadArgument {
                name: "bbox",
                message: "bounding box coordinates must be finite".to_owned(),
            });
        }
        let bbox = BoundingBox {
            min_x: values[0],
            min_y: values[1],
            max_x: values[2],
            max_y: values[3],
        };
        if bbox.min_x >= bbox.max_x || bbox.min_y >= bbox.max_y {
            return Err(BridgeError::BadArgument {
                name: "bbox",
                message: "bounding box is empty".to_owned(),
            });
        }
        Ok(bbox)
    }

    /// Corner order expected by `-projwin`: upper-left then lower-right.
    pub fn projwin(&self) -> [f64; 4] {
        [self.min_x, self.max_y, self.max_x, self.min_y]
    }

    /// The axis-aligned rectangle enclosing four arbitrary corners.
    ///
    /// After a projection change any corner can become an extreme, so all
    /// four are folded rather than just the original diagonal.
    pub fn enclosing(xs: &[f64; 4], ys: &[f64; 4]) -> BoundingBox {
        BoundingBox {
            min_x: xs.iter().copied().fold(f64::INFINITY, f64::min),
            min_y: ys.iter().copied().fold(f64::INFINITY, f64::min),
            max_x: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            max_y: ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Requested output raster size; a zero dimension keeps the source
/// resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSize {
    pub width: usize,
    pub height: usize,
}

impl OutputSize {
    fn is_native(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// Wraps a `GDALTranslateOptions` argument list.
pub struct TranslateOptions {
    c_options: *mut GDALTranslateOptions,
}

impl TranslateOptions {
    pub fn new<S: AsRef<str>, I: IntoIterator<Item = S>>(args: I) -> Result<Self> {
        let mut argv = CslStringList::new();
        for arg in args {
            argv.add_string(arg.as_ref())?;
        }
        // GDALTranslateOptionsNew copies the argument list.
        let c_options = unsafe {
            gdal_sys::GDALTranslateOptionsNew(argv.as_ptr() as *mut *mut c_char, null_mut())
        };
        if c_options.is_null() {
            return Err(_last_null_pointer_err("GDALTranslateOptionsNew"));
        }
        Ok(Self { c_options })
    }

    fn as_ptr(&self) -> *const GDALTranslateOptions {
        self.c_options
    }
}

impl Drop for TranslateOptions {
    fn drop(&mut self) {
        unsafe {
            gdal_sys::GDALTranslateOptionsFree(self.c_options);
        }
    }
}

/// Builds the argument vector for an in-memory windowed extraction.
fn window_args(bbox: &BoundingBox, size: OutputSize) -> Vec<String> {
    let [ulx, uly, lrx, lry] = bbox.projwin();
    let mut args = vec![
        "-of".to_owned(),
        "MEM".to_owned(),
        "-projwin".to_owned(),
        ulx.to_string(),
        uly.to_string(),
        lrx.to_string(),
        lry.to_string(),
    ];
    if !size.is_native() {
        args.push("-outsize".to_owned());
        args.push(size.width.to_string());
        args.push(size.height.to_string());
    }
    args
}

/// Runs one `GDALTranslate` stage into an in-memory dataset.
fn translate_mem(
    c_src: GDALDatasetH,
    bbox: &BoundingBox,
    size: OutputSize,
) -> Result<OwnedDataset> {
    let args = window_args(bbox, size);
    debug!("translate args: {args:?}");
    let options = TranslateOptions::new(args)?;
    let dest_name = _path_to_c_string("")?;
    let mut usage_error: c_int = 0;
    let c_out = relay::relayed(|| unsafe {
        gdal_sys::GDALTranslate(dest_name.as_ptr(), c_src, options.as_ptr(), &mut usage_error)
    })?;
    if c_out.is_null() {
        return Err(_last_null_pointer_err("GDALTranslate"));
    }
    Ok(unsafe { OwnedDataset::from_c_dataset(c_out) })
}

fn open_source(path: &str) -> Result<OwnedDataset> {
    OwnedDataset::open(
        path,
        GdalOpenFlags::GDAL_OF_RASTER | GdalOpenFlags::GDAL_OF_VERBOSE_ERROR,
    )
}

/// Clips a window out of the raster at `path` into an in-memory dataset.
pub fn extract_window(path: &str, bbox: &BoundingBox, size: OutputSize) -> Result<Dataset> {
    let src = open_source(path)?;
    let out = translate_mem(src.as_ptr(), bbox, size)?;
    Ok(out.into_wrapped())
}

/// A window read out as doubles, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

fn read_band_f64(c_dataset: GDALDatasetH, band_index: usize) -> Result<PixelBuffer> {
    let c_band = unsafe { gdal_sys::GDALGetRasterBand(c_dataset, band_index as c_int) };
    if c_band.is_null() {
        return Err(_last_null_pointer_err("GDALGetRasterBand"));
    }
    let width = unsafe { gdal_sys::GDALGetRasterBandXSize(c_band) } as usize;
    let height = unsafe { gdal_sys::GDALGetRasterBandYSize(c_band) } as usize;
    let mut data = vec![0f64; width * height];
    let rv = unsafe {
        gdal_sys::GDALRasterIO(
            c_band,
            GDALRWFlag::GF_Read,
            0,
            0,
            width as c_int,
            height as c_int,
            data.as_mut_ptr() as *mut c_void,
            width as c_int,
            height as c_int,
            GDALDataType::GDT_Float64,
            0,
            0,
        )
    };
    if rv != CPLErr::CE_None {
        return Err(_last_cpl_err(rv));
    }
    Ok(PixelBuffer {
        width,
        height,
        data,
    })
}

/// Like [`extract_window`], but reads one band of the result out as pixels
/// instead of keeping a dataset alive.
pub fn extract_window_pixels(
    path: &str,
    bbox: &BoundingBox,
    size: OutputSize,
    band_index: usize,
) -> Result<PixelBuffer> {
    if band_index < 1 {
        return Err(BridgeError::BadArgument {
            name: "band_index",
            message: "band numbers start at 1".to_owned(),
        });
    }
    let src = open_source(path)?;
    let out = translate_mem(src.as_ptr(), bbox, size)?;
    read_band_f64(out.as_ptr(), band_index)
}

struct TransformerGuard(*mut c_void);

impl Drop for TransformerGuard {
    fn drop(&mut self) {
        unsafe { gdal_sys::GDALDestroyGenImgProjTransformer(self.0) };
    }
}

/// Extracts `bbox` (expressed in the destination projection) from the raster
/// at `path`, reprojecting on the way.
///
/// When source and destination spatial references already match this
/// degenerates to a plain [`extract_window`]. Otherwise the box corners are
/// transformed into source space, the enclosing source window is clipped
/// out, warped into the destination projection, and the originally requested
/// box is cut from the warped result.
pub fn extract_window_reprojected(
    path: &str,
    bbox: &BoundingBox,
    size: OutputSize,
    dst_projection: &str,
) -> Result<Dataset> {
    if dst_projection.trim().is_empty() {
        return Err(BridgeError::BadArgument {
            name: "dst_projection",
            message: "destination projection cannot be empty".to_owned(),
        });
    }
    let dst_srs =
        SpatialRef::from_definition(dst_projection).map_err(|err| BridgeError::BadArgument {
            name: "dst_projection",
            message: format!("unparsable projection definition: {err}"),
        })?;

    let src = open_source(path)?;
    let src_wkt = _string(unsafe { gdal_sys::GDALGetProjectionRef(src.as_ptr()) });
    if src_wkt.is_empty() {
        return Err(BridgeError::BadArgument {
            name: "source",
            message: format!("'{path}' has no projection to reproject from"),
        });
    }
    let src_srs = SpatialRef::from_wkt(&src_wkt)?;

    if src_srs.is_same(&dst_srs) {
        let out = translate_mem(src.as_ptr(), bbox, size)?;
        return Ok(out.into_wrapped());
    }

    // All four corners move independently under the transform.
    let to_source = CoordTransform::new(&dst_srs, &src_srs)?;
    let mut xs = [bbox.min_x, bbox.min_x, bbox.max_x, bbox.max_x];
    let mut ys = [bbox.min_y, bbox.max_y, bbox.min_y, bbox.max_y];
    to_source.transform_coords(&mut xs, &mut ys)?;
    let src_bbox = BoundingBox::enclosing(&xs, &ys);

    let clipped = translate_mem(src.as_ptr(), &src_bbox, OutputSize::default())?;
    drop(src);

    let dst_wkt = CString::new(dst_srs.to_wkt()?)?;
    let transformer = relay::relayed(|| unsafe {
        gdal_sys::GDALCreateGenImgProjTransformer(
            clipped.as_ptr(),
            null(),
            null_mut(),
            dst_wkt.as_ptr(),
            0,
            0.0,
            0,
        )
    })?;
    if transformer.is_null() {
        return Err(_last_null_pointer_err("GDALCreateGenImgProjTransformer"));
    }
    let transformer = TransformerGuard(transformer);

    let mut suggested_transform = [0f64; 6];
    let mut pixels: c_int = 0;
    let mut lines: c_int = 0;
    let rv = relay::relayed(|| unsafe {
        gdal_sys::GDALSuggestedWarpOutput(
            clipped.as_ptr(),
            Some(gdal_sys::GDALGenImgProjTransform),
            transformer.0,
            suggested_transform.as_mut_ptr(),
            &mut pixels,
            &mut lines,
        )
    })?;
    if rv != CPLErr::CE_None {
        return Err(_last_cpl_err(rv));
    }
    drop(transformer);

    let warped = create_warp_destination(
        clipped.as_ptr(),
        pixels,
        lines,
        &suggested_transform,
        &dst_wkt,
    )?;

    let rv = relay::relayed(|| unsafe {
        gdal_sys::GDALReprojectImage(
            clipped.as_ptr(),
            null(),
            warped.as_ptr(),
            dst_wkt.as_ptr(),
            GDALResampleAlg::GRA_NearestNeighbour,
            0.0,
            0.0,
            None,
            null_mut(),
            null_mut(),
        )
    })?;
    if rv != CPLErr::CE_None {
        return Err(_last_cpl_err(rv));
    }
    drop(clipped);

    let out = translate_mem(warped.as_ptr(), bbox, size)?;
    Ok(out.into_wrapped())
}

/// Creates the in-memory destination the warp writes into, mirroring the
/// source's band layout at the suggested output geometry.
fn create_warp_destination(
    c_src: GDALDatasetH,
    pixels: c_int,
    lines: c_int,
    geo_transform: &[f64; 6],
    dst_wkt: &CString,
) -> Result<OwnedDataset> {
    let band_count = unsafe { gdal_sys::GDALGetRasterCount(c_src) };
    let data_type = unsafe {
        let c_band = gdal_sys::GDALGetRasterBand(c_src, 1);
        if c_band.is_null() {
            return Err(_last_null_pointer_err("GDALGetRasterBand"));
        }
        gdal_sys::GDALGetRasterDataType(c_band)
    };
    let c_driver = driver_by_name("MEM")?;
    let c_name = _path_to_c_string("")?;
    let c_dataset = unsafe {
        gdal_sys::GDALCreate(
            c_driver,
            c_name.as_ptr(),
            pixels,
            lines,
            band_count,
            data_type,
            null_mut(),
        )
    };
    if c_dataset.is_null() {
        return Err(_last_null_pointer_err("GDALCreate"));
    }
    let dest = unsafe { OwnedDataset::from_c_dataset(c_dataset) };
    let rv = unsafe {
        gdal_sys::GDALSetGeoTransform(dest.as_ptr(), geo_transform.as_ptr() as *mut f64)
    };
    if rv != CPLErr::CE_None {
        return Err(_last_cpl_err(rv));
    }
    let rv = unsafe { gdal_sys::GDALSetProjection(dest.as_ptr(), dst_wkt.as_ptr()) };
    if rv != CPLErr::CE_None {
        return Err(_last_cpl_err(rv));
    }
    Ok(dest)
}
