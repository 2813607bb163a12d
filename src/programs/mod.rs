//! Wrappers over GDAL's utility-program entry points.

mod translate;

pub use translate::{
    extract_window, extract_window_pixels, extract_window_reprojected, BoundingBox, OutputSize,
    PixelBuffer, TranslateOptions,
};
