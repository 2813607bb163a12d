//! The host-facing operation surface.
//!
//! Every capability the bridge exposes is a named operation taking a flat
//! positional [`Value`] list and returning a [`Value`]. Handles are the only
//! way native objects cross this boundary; raw pointers never do.

use crate::cpl::CslStringList;
use crate::dataset::Dataset;
use crate::errors::{BridgeError, Result};
use crate::marshal::{Args, Value};
use crate::programs::{
    extract_window, extract_window_pixels, extract_window_reprojected, BoundingBox, OutputSize,
};
use crate::registry::{self, HandleKind};
use crate::vrt::{VrtDataset, VrtSimpleSource, Window};

fn output_size(args: &Args, width_idx: usize, height_idx: usize) -> Result<OutputSize> {
    let width = args.opt_int(width_idx, "width", 0)?;
    let height = args.opt_int(height_idx, "height", 0)?;
    if width < 0 {
        return Err(BridgeError::BadArgument {
            name: "width",
            message: format!("must be non-negative, got {width}"),
        });
    }
    if height < 0 {
        return Err(BridgeError::BadArgument {
            name: "height",
            message: format!("must be non-negative, got {height}"),
        });
    }
    Ok(OutputSize {
        width: width as usize,
        height: height as usize,
    })
}

fn bounding_box(args: &Args, idx: usize) -> Result<BoundingBox> {
    let values = args.double_array(idx, "bbox", Some(4))?;
    BoundingBox::from_slice(&values)
}

fn rect_window(args: &Args, idx: usize, name: &'static str) -> Result<Window> {
    let values = args.double_array(idx, name, Some(4))?;
    Ok(Window {
        x_off: values[0],
        y_off: values[1],
        x_size: values[2],
        y_size: values[3],
    })
}

fn op_open(args: &Args) -> Result<Value> {
    let path = args.str(0, "path")?;
    Ok(Dataset::open(path)?.id().into())
}

fn op_translate(args: &Args) -> Result<Value> {
    let path = args.str(0, "path")?;
    let bbox = bounding_box(args, 1)?;
    let size = output_size(args, 2, 3)?;
    Ok(extract_window(path, &bbox, size)?.id().into())
}

fn op_translate_pixels(args: &Args) -> Result<Value> {
    let path = args.str(0, "path")?;
    let bbox = bounding_box(args, 1)?;
    let size = output_size(args, 2, 3)?;
    let band_index = args.opt_int(4, "band_index", 1)?;
    if band_index < 1 {
        return Err(BridgeError::BadArgument {
            name: "band_index",
            message: format!("band numbers start at 1, got {band_index}"),
        });
    }
    let buffer = extract_window_pixels(path, &bbox, size, band_index as usize)?;
    Ok(Value::Array(vec![
        Value::Int(buffer.width as i64),
        Value::Int(buffer.height as i64),
        Value::Array(buffer.data.into_iter().map(Value::Double).collect()),
    ]))
}

fn op_translate_reprojected(args: &Args) -> Result<Value> {
    let path = args.str(0, "path")?;
    let bbox = bounding_box(args, 1)?;
    let projection = args.str(2, "dst_projection")?;
    let size = output_size(args, 3, 4)?;
    Ok(extract_window_reprojected(path, &bbox, size, projection)?
        .id()
        .into())
}

fn op_dataset_raster_size(args: &Args) -> Result<Value> {
    let ds = Dataset::from_handle(args.handle(0, "dataset", HandleKind::Dataset)?)?;
    let (x, y) = ds.raster_size()?;
    Ok(Value::Array(vec![
        Value::Int(x as i64),
        Value::Int(y as i64),
    ]))
}

fn op_dataset_projection(args: &Args) -> Result<Value> {
    let ds = Dataset::from_handle(args.handle(0, "dataset", HandleKind::Dataset)?)?;
    Ok(ds.projection()?.into())
}

fn op_dataset_geo_transform(args: &Args) -> Result<Value> {
    let ds = Dataset::from_handle(args.handle(0, "dataset", HandleKind::Dataset)?)?;
    let transform = ds.geo_transform()?;
    Ok(Value::Array(
        transform.iter().copied().map(Value::Double).collect(),
    ))
}

fn op_dataset_band(args: &Args) -> Result<Value> {
    let ds = Dataset::from_handle(args.handle(0, "dataset", HandleKind::Dataset)?)?;
    let band_index = args.int(1, "band_index")?;
    if band_index < 1 {
        return Err(BridgeError::BadArgument {
            name: "band_index",
            message: format!("band numbers start at 1, got {band_index}"),
        });
    }
    Ok(ds.band(band_index as usize)?.id().into())
}

fn op_band_size(args: &Args) -> Result<Value> {
    let band =
        crate::band::RasterBand::from_handle(args.handle(0, "band", HandleKind::Band)?)?;
    let (x, y) = band.size()?;
    Ok(Value::Array(vec![
        Value::Int(x as i64),
        Value::Int(y as i64),
    ]))
}

fn op_band_no_data_value(args: &Args) -> Result<Value> {
    let band =
        crate::band::RasterBand::from_handle(args.handle(0, "band", HandleKind::Band)?)?;
    Ok(match band.no_data_value()? {
        Some(value) => Value::Double(value),
        None => Value::Null,
    })
}

fn op_band_min_max(args: &Args) -> Result<Value> {
    let band =
        crate::band::RasterBand::from_handle(args.handle(0, "band", HandleKind::Band)?)?;
    let approx = match args.opt_int(1, "allow_approximation", 0)? {
        0 => false,
        _ => true,
    };
    let (min, max) = band.compute_min_max(approx)?;
    Ok(Value::Array(vec![Value::Double(min), Value::Double(max)]))
}

fn op_vrt_create(args: &Args) -> Result<Value> {
    let width = args.int(0, "width")?;
    let height = args.int(1, "height")?;
    if width < 1 || height < 1 {
        return Err(BridgeError::BadArgument {
            name: "size",
            message: format!("raster size must be positive, got {width}x{height}"),
        });
    }
    Ok(VrtDataset::create(width as usize, height as usize)?
        .id()
        .into())
}

fn op_vrt_band_count(args: &Args) -> Result<Value> {
    let vrt = VrtDataset::from_handle(args.handle(0, "dataset", HandleKind::Dataset)?)?;
    Ok(Value::Int(vrt.band_count()? as i64))
}

fn op_vrt_band_create(args: &Args) -> Result<Value> {
    let vrt = VrtDataset::from_handle(args.handle(0, "dataset", HandleKind::Dataset)?)?;
    let data_type = args.str(1, "data_type")?;
    let mut options = CslStringList::new();
    for entry in args.opt_str_array(2, "options")? {
        match entry.split_once('=') {
            Some((name, value)) => options.set_name_value(name, value)?,
            None => {
                return Err(BridgeError::BadArgument {
                    name: "options",
                    message: format!("expected NAME=VALUE, got '{entry}'"),
                })
            }
        }
    }
    Ok(vrt.bands().create(data_type, &options)?.id().into())
}

fn op_vrt_add_source(args: &Args) -> Result<Value> {
    let vrt = VrtDataset::from_handle(args.handle(0, "dataset", HandleKind::Dataset)?)?;
    let band_index = args.int(1, "band_index")?;
    if band_index < 1 {
        return Err(BridgeError::BadArgument {
            name: "band_index",
            message: format!("band numbers start at 1, got {band_index}"),
        });
    }
    let source = VrtSimpleSource::from_handle(args.handle(2, "source", HandleKind::VrtSource)?)?;
    vrt.add_source(band_index as usize, &source)?;
    Ok(Value::Null)
}

fn op_source_create(_args: &Args) -> Result<Value> {
    Ok(VrtSimpleSource::new().id().into())
}

fn op_source_set_src_band(args: &Args) -> Result<Value> {
    let source = VrtSimpleSource::from_handle(args.handle(0, "source", HandleKind::VrtSource)?)?;
    let ds = Dataset::from_handle(args.handle(1, "dataset", HandleKind::Dataset)?)?;
    let band_index = args.int(2, "band_index")?;
    if band_index < 1 {
        return Err(BridgeError::BadArgument {
            name: "band_index",
            message: format!("band numbers start at 1, got {band_index}"),
        });
    }
    source.set_src_band(&ds, band_index as usize)?;
    Ok(Value::Null)
}

fn op_source_set_src_window(args: &Args) -> Result<Value> {
    let source = VrtSimpleSource::from_handle(args.handle(0, "source", HandleKind::VrtSource)?)?;
    source.set_src_window(rect_window(args, 1, "src_window")?)?;
    Ok(Value::Null)
}

fn op_source_set_dst_window(args: &Args) -> Result<Value> {
    let source = VrtSimpleSource::from_handle(args.handle(0, "source", HandleKind::VrtSource)?)?;
    source.set_dst_window(rect_window(args, 1, "dst_window")?)?;
    Ok(Value::Null)
}

fn op_dispose(args: &Args) -> Result<Value> {
    registry::dispose(args.any_handle(0, "handle")?);
    Ok(Value::Null)
}

fn op_is_alive(args: &Args) -> Result<Value> {
    Ok(Value::Bool(registry::is_alive(
        args.any_handle(0, "handle")?,
    )))
}

/// Dispatches a named operation. Unknown names fail before any native call.
pub fn invoke(operation: &str, values: &[Value]) -> Result<Value> {
    let args = Args::new(values);
    match operation {
        "open" => op_open(&args),
        "translate" => op_translate(&args),
        "translate_pixels" => op_translate_pixels(&args),
        "translate_reprojected" => op_translate_reprojected(&args),
        "dataset_raster_size" => op_dataset_raster_size(&args),
        "dataset_projection" => op_dataset_projection(&args),
        "dataset_geo_transform" => op_dataset_geo_transform(&args),
        "dataset_band" => op_dataset_band(&args),
        "band_size" => op_band_size(&args),
        "band_no_data_value" => op_band_no_data_value(&args),
        "band_min_max" => op_band_min_max(&args),
        "vrt_create" => op_vrt_create(&args),
        "vrt_band_count" => op_vrt_band_count(&args),
        "vrt_band_create" => op_vrt_band_create(&args),
        "vrt_add_source" => op_vrt_add_source(&args),
        "source_create" => op_source_create(&args),
        "source_set_src_band" => op_source_set_src_band(&args),
        "source_set_src_window" => op_source_set_src_window(&args),
        "source_set_dst_window" => op_source_set_dst_window(&args),
        // dataset_-prefixed spellings kept for hosts that address handles
        // per wrapper class; disposal itself is class-agnostic.
        "dispose" | "dataset_dispose" => op_dispose(&args),
        "is_alive" | "dataset_is_alive" => op_is_alive(&args),
        _ => Err(BridgeError::BadArgument {
            name: "operation",
            message: format!("unknown operation '{operation}'"),
        }),
    }
}
