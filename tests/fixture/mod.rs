//! Shared fixture helpers for the integration tests.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use gdal_sys::{CPLErr, GDALDataType, GDALRWFlag};
use libc::{c_int, c_void};

/// A temporary directory holding one generated raster; both are removed on
/// drop.
pub struct TempRaster {
    _temp_dir: tempfile::TempDir,
    temp_path: PathBuf,
}

impl TempRaster {
    pub fn path(&self) -> &Path {
        &self.temp_path
    }

    pub fn path_str(&self) -> &str {
        self.temp_path.to_str().expect("temp path is valid UTF-8")
    }
}

impl AsRef<Path> for TempRaster {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// The geo-transform used by [`create_gradient_tiff`]: a 0.01 degree grid
/// anchored at (57 E, 24 N), north-up.
pub fn gradient_geo_transform() -> [f64; 6] {
    [57.0, 0.01, 0.0, 24.0, 0.0, -0.01]
}

/// Creates a single-band Float64 GeoTIFF in EPSG:4326 whose pixel at
/// `(col, row)` holds `row * width + col`, so windows have predictable
/// contents.
pub fn create_gradient_tiff(name: &str, width: usize, height: usize) -> TempRaster {
    let _temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let temp_path = _temp_dir.path().join(name);

    unsafe { gdal_sys::GDALAllRegister() };
    let c_gtiff = CString::new("GTiff").unwrap();
    let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_gtiff.as_ptr()) };
    assert!(!c_driver.is_null(), "GTiff driver is not registered");

    let c_path = CString::new(temp_path.to_str().unwrap()).unwrap();
    let c_dataset = unsafe {
        gdal_sys::GDALCreate(
            c_driver,
            c_path.as_ptr(),
            width as c_int,
            height as c_int,
            1,
            GDALDataType::GDT_Float64,
            std::ptr::null_mut(),
        )
    };
    assert!(!c_dataset.is_null(), "GDALCreate failed for {name}");

    let transform = gradient_geo_transform();
    let rv = unsafe { gdal_sys::GDALSetGeoTransform(c_dataset, transform.as_ptr() as *mut f64) };
    assert_eq!(rv, CPLErr::CE_None);

    let wkt = gdal_bridge::SpatialRef::from_epsg(4326)
        .and_then(|srs| srs.to_wkt())
        .expect("EPSG:4326 exports to WKT");
    let c_wkt = CString::new(wkt).unwrap();
    let rv = unsafe { gdal_sys::GDALSetProjection(c_dataset, c_wkt.as_ptr()) };
    assert_eq!(rv, CPLErr::CE_None);

    let data: Vec<f64> = (0..width * height).map(|i| i as f64).collect();
    let c_band = unsafe { gdal_sys::GDALGetRasterBand(c_dataset, 1) };
    assert!(!c_band.is_null());
    let rv = unsafe {
        gdal_sys::GDALRasterIO(
            c_band,
            GDALRWFlag::GF_Write,
            0,
            0,
            width as c_int,
            height as c_int,
            data.as_ptr() as *mut c_void,
            width as c_int,
            height as c_int,
            GDALDataType::GDT_Float64,
            0,
            0,
        )
    };
    assert_eq!(rv, CPLErr::CE_None);

    // Store the exact statistics of the gradient so reads of the known
    // minimum/maximum have something to report.
    let n = (width * height) as f64;
    let rv = unsafe {
        gdal_sys::GDALSetRasterStatistics(
            c_band,
            0.0,
            n - 1.0,
            (n - 1.0) / 2.0,
            ((n * n - 1.0) / 12.0).sqrt(),
        )
    };
    assert_eq!(rv, CPLErr::CE_None);

    unsafe { gdal_sys::GDALClose(c_dataset) };

    TempRaster {
        _temp_dir,
        temp_path,
    }
}
