//! Embedding bridge between a host runtime and [GDAL](https://gdal.org/).
//!
//! The bridge never exposes native pointers. Wrapper objects carry opaque
//! [`HandleId`]s issued by a process-wide registry; the pointer-keyed cache
//! keeps wrapping idempotent, and the error relay turns GDAL's handler-based
//! error stream into typed [`errors::BridgeError`] values. On top of those
//! sit typed facades for datasets, raster bands, VRT composition, and
//! windowed extraction, plus the named-operation surface in [`host`].
//!
//! ## Use
//!
//! ```no_run
//! use gdal_bridge::{extract_window, BoundingBox, OutputSize};
//!
//! # fn main() -> gdal_bridge::errors::Result<()> {
//! let bbox = BoundingBox::from_slice(&[57.0, 23.0, 58.0, 24.0])?;
//! let clipped = extract_window("area.tif", &bbox, OutputSize::default())?;
//! println!("{:?}", clipped.raster_size()?);
//! clipped.dispose();
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod utils;

mod cache;
pub mod marshal;
mod registry;
pub mod relay;

mod band;
pub mod cpl;
mod dataset;
pub mod host;
pub mod programs;
pub mod spatial_ref;
pub mod vrt;

pub use band::RasterBand;
pub use dataset::{Dataset, GdalOpenFlags, GeoTransform};
pub use marshal::{Args, Value};
pub use programs::{
    extract_window, extract_window_pixels, extract_window_reprojected, BoundingBox, OutputSize,
    PixelBuffer,
};
pub use registry::{HandleId, HandleKind};
pub use spatial_ref::{CoordTransform, SpatialRef};
pub use vrt::{VrtDataset, VrtDatasetBands, VrtSimpleSource, Window};
