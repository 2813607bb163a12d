mod fixture;

use fixture::{create_gradient_tiff, gradient_geo_transform};
use gdal_bridge::errors::BridgeError;
use gdal_bridge::host::invoke;
use gdal_bridge::marshal::Value;
use gdal_bridge::{Dataset, HandleId};

fn bbox_value(values: [f64; 4]) -> Value {
    Value::Array(values.into_iter().map(Value::Double).collect())
}

fn handle_of(value: Value) -> HandleId {
    match value {
        Value::Handle(id) => id,
        other => panic!("expected a handle, got {other:?}"),
    }
}

#[test]
fn bad_bounding_box_fails_before_any_native_call() {
    let three = Value::Array(vec![Value::Int(0), Value::Int(0), Value::Int(1)]);
    // The path does not exist; a BadArgument (not SourceOpen) proves
    // validation ran first.
    let err = invoke("translate", &["no_such_file.tif".into(), three]).unwrap_err();
    assert!(matches!(err, BridgeError::BadArgument { name: "bbox", .. }));
}

#[test]
fn negative_output_size_is_rejected() {
    let bbox = bbox_value([0.0, 0.0, 1.0, 1.0]);
    let err = invoke(
        "translate",
        &["no_such_file.tif".into(), bbox, Value::Int(-1), Value::Int(4)],
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::BadArgument { name: "width", .. }));
}

#[test]
fn missing_source_is_a_source_open_error() {
    let bbox = bbox_value([0.0, 0.0, 1.0, 1.0]);
    let err = invoke("translate", &["no_such_file.tif".into(), bbox]).unwrap_err();
    assert!(matches!(err, BridgeError::SourceOpen { .. }));
}

#[test]
fn windowed_extract_produces_the_requested_grid() {
    let fixture = create_gradient_tiff("gradient.tif", 100, 50);
    // 20x20 pixels starting at column 10, row 0.
    let bbox = bbox_value([57.10, 23.80, 57.30, 24.00]);

    let handle = handle_of(
        invoke("translate", &[fixture.path_str().into(), bbox.clone()]).unwrap(),
    );
    let size = invoke("dataset_raster_size", &[handle.into()]).unwrap();
    assert_eq!(size, Value::Array(vec![Value::Int(20), Value::Int(20)]));

    // With an explicit output size the grid is resampled.
    let resized = handle_of(
        invoke(
            "translate",
            &[
                fixture.path_str().into(),
                bbox,
                Value::Int(10),
                Value::Int(5),
            ],
        )
        .unwrap(),
    );
    let size = invoke("dataset_raster_size", &[resized.into()]).unwrap();
    assert_eq!(size, Value::Array(vec![Value::Int(10), Value::Int(5)]));

    invoke("dispose", &[handle.into()]).unwrap();
    invoke("dispose", &[resized.into()]).unwrap();
}

#[test]
fn pixel_extract_reads_the_expected_values() {
    let fixture = create_gradient_tiff("pixels.tif", 100, 50);
    let bbox = bbox_value([57.10, 23.80, 57.30, 24.00]);
    let result = invoke("translate_pixels", &[fixture.path_str().into(), bbox]).unwrap();
    let (width, height, data) = match result {
        Value::Array(parts) => match parts.as_slice() {
            [Value::Int(w), Value::Int(h), Value::Array(data)] => (*w, *h, data.clone()),
            other => panic!("unexpected shape: {other:?}"),
        },
        other => panic!("unexpected result: {other:?}"),
    };
    assert_eq!((width, height), (20, 20));
    // Source value at (col 10, row 0) in a 100-wide gradient.
    assert_eq!(data[0], Value::Double(10.0));
    // Second row starts at source (col 10, row 1).
    assert_eq!(data[20], Value::Double(110.0));
}

#[test]
fn wrapping_the_same_band_twice_yields_the_same_handle() {
    let fixture = create_gradient_tiff("identity.tif", 32, 16);
    let ds = handle_of(invoke("open", &[fixture.path_str().into()]).unwrap());
    let a = invoke("dataset_band", &[ds.into(), Value::Int(1)]).unwrap();
    let b = invoke("dataset_band", &[ds.into(), Value::Int(1)]).unwrap();
    assert_eq!(a, b);
    invoke("dispose", &[ds.into()]).unwrap();
}

#[test]
fn disposed_datasets_reject_further_use() {
    let fixture = create_gradient_tiff("dispose.tif", 16, 16);
    let ds = handle_of(invoke("open", &[fixture.path_str().into()]).unwrap());
    let band = handle_of(invoke("dataset_band", &[ds.into(), Value::Int(1)]).unwrap());

    invoke("dispose", &[ds.into()]).unwrap();
    assert_eq!(
        invoke("is_alive", &[ds.into()]).unwrap(),
        Value::Bool(false)
    );
    // Child band handles are retired with their dataset.
    assert_eq!(
        invoke("is_alive", &[band.into()]).unwrap(),
        Value::Bool(false)
    );
    assert!(matches!(
        invoke("dataset_raster_size", &[ds.into()]),
        Err(BridgeError::UseAfterDispose { .. })
    ));
    // Idempotent.
    invoke("dispose", &[ds.into()]).unwrap();
}

#[test]
fn reprojected_extract_matches_plain_extract_when_projections_agree() {
    let fixture = create_gradient_tiff("same_proj.tif", 100, 50);
    let bbox = bbox_value([57.10, 23.80, 57.30, 24.00]);
    let handle = handle_of(
        invoke(
            "translate_reprojected",
            &[fixture.path_str().into(), bbox, "EPSG:4326".into()],
        )
        .unwrap(),
    );
    let size = invoke("dataset_raster_size", &[handle.into()]).unwrap();
    assert_eq!(size, Value::Array(vec![Value::Int(20), Value::Int(20)]));
    invoke("dispose", &[handle.into()]).unwrap();
}

#[test]
fn reprojected_extract_changes_the_projection() {
    use gdal_bridge::{CoordTransform, SpatialRef};

    let fixture = create_gradient_tiff("reproject.tif", 100, 50);

    // Express the request box in web mercator.
    let wgs84 = SpatialRef::from_epsg(4326).unwrap();
    let mercator = SpatialRef::from_epsg(3857).unwrap();
    let to_mercator = CoordTransform::new(&wgs84, &mercator).unwrap();
    let mut xs = [57.10, 57.30];
    let mut ys = [23.80, 24.00];
    to_mercator.transform_coords(&mut xs, &mut ys).unwrap();
    let bbox = bbox_value([xs[0], ys[0], xs[1], ys[1]]);

    let handle = handle_of(
        invoke(
            "translate_reprojected",
            &[fixture.path_str().into(), bbox, "EPSG:3857".into()],
        )
        .unwrap(),
    );
    let result = Dataset::from_handle(handle).unwrap();
    let (w, h) = result.raster_size().unwrap();
    assert!(w > 0 && h > 0);
    let projection = result.projection().unwrap();
    assert!(projection.contains("3857"), "projection was: {projection}");
    result.dispose();
}

#[test]
fn unparsable_projection_is_an_argument_error() {
    let fixture = create_gradient_tiff("bad_proj.tif", 16, 16);
    let bbox = bbox_value([57.01, 23.90, 57.10, 24.00]);
    for projection in ["", "certainly not a projection"] {
        let err = invoke(
            "translate_reprojected",
            &[fixture.path_str().into(), bbox.clone(), projection.into()],
        )
        .unwrap_err();
        assert!(
            matches!(err, BridgeError::BadArgument { name: "dst_projection", .. }),
            "unexpected error for {projection:?}: {err}"
        );
    }
}

#[test]
fn geo_transform_survives_extraction() {
    let fixture = create_gradient_tiff("transform.tif", 100, 50);
    let ds = handle_of(invoke("open", &[fixture.path_str().into()]).unwrap());
    let transform = invoke("dataset_geo_transform", &[ds.into()]).unwrap();
    let expected = Value::Array(
        gradient_geo_transform()
            .iter()
            .copied()
            .map(Value::Double)
            .collect(),
    );
    assert_eq!(transform, expected);
    invoke("dispose", &[ds.into()]).unwrap();
}
