mod fixture;

use fixture::create_gradient_tiff;
use gdal_bridge::cpl::CslStringList;
use gdal_bridge::errors::BridgeError;
use gdal_bridge::host::invoke;
use gdal_bridge::marshal::Value;
use gdal_bridge::{Dataset, VrtDataset, VrtSimpleSource, Window};

fn window(x_off: f64, y_off: f64, x_size: f64, y_size: f64) -> Window {
    Window {
        x_off,
        y_off,
        x_size,
        y_size,
    }
}

#[test]
fn vrt_band_reads_through_its_source() {
    let fixture = create_gradient_tiff("vrt_source.tif", 100, 50);
    let source_ds = Dataset::open(fixture.path_str()).unwrap();

    let vrt = VrtDataset::create(20, 20).unwrap();
    let bands = vrt.bands();
    assert_eq!(bands.count().unwrap(), 0);
    let band = bands.create("Float64", &CslStringList::new()).unwrap();
    assert_eq!(bands.count().unwrap(), 1);
    assert_eq!(bands.get(1).unwrap(), band);

    let source = VrtSimpleSource::new();
    source.set_src_band(&source_ds, 1).unwrap();
    source.set_src_window(window(10.0, 0.0, 20.0, 20.0)).unwrap();
    source.set_dst_window(window(0.0, 0.0, 20.0, 20.0)).unwrap();
    vrt.add_source(1, &source).unwrap();

    let data = band.read_as_f64((0, 0), (20, 20), (20, 20)).unwrap();
    // Source gradient value at (col 10 + c, row r) is r * 100 + 10 + c.
    assert_eq!(data[0], 10.0);
    assert_eq!(data[19], 29.0);
    assert_eq!(data[20], 110.0);
    assert_eq!(data[20 * 20 - 1], 19.0 * 100.0 + 29.0);

    let (min, max) = band.compute_min_max(false).unwrap();
    assert_eq!(min, 10.0);
    assert_eq!(max, 1929.0);

    vrt.dataset().dispose();
    source.dispose();
    source_ds.dispose();
}

#[test]
fn source_statistics_read_the_referenced_band() {
    let fixture = create_gradient_tiff("stats.tif", 10, 10);
    let source_ds = Dataset::open(fixture.path_str()).unwrap();
    let source = VrtSimpleSource::new();
    source.set_src_band(&source_ds, 1).unwrap();
    source_ds.dispose();

    let (min, max) = source.compute_min_max(false).unwrap();
    assert_eq!(min, 0.0);
    assert_eq!(max, 99.0);

    // The fixture stores its statistics, so the cheap reads see them too.
    assert_eq!(source.get_minimum().unwrap(), Some(0.0));
    assert_eq!(source.get_maximum().unwrap(), Some(99.0));

    // Once the file is gone the open failure is reported, not swallowed.
    drop(fixture);
    assert!(matches!(
        source.compute_min_max(false),
        Err(BridgeError::SourceOpen { .. })
    ));
    assert!(matches!(
        source.get_minimum(),
        Err(BridgeError::SourceOpen { .. })
    ));
    source.dispose();
}

#[test]
fn statistics_require_a_configured_source() {
    let source = VrtSimpleSource::new();
    assert!(matches!(
        source.get_maximum(),
        Err(BridgeError::BadArgument { name: "source", .. })
    ));
    source.dispose();
}

#[test]
fn masked_sources_serialize_and_attach() {
    let fixture = create_gradient_tiff("masked.tif", 8, 8);
    let src_ds = Dataset::open(fixture.path_str()).unwrap();
    let vrt = VrtDataset::create(8, 8).unwrap();
    let band = vrt.create_band("Float64").unwrap();

    let source = VrtSimpleSource::new();
    source.set_src_band(&src_ds, 1).unwrap();
    source.set_use_mask_band(true).unwrap();
    vrt.add_source(1, &source).unwrap();

    // The gradient band's default mask is all-valid, so every pixel shows.
    let data = band.read_as_f64((0, 0), (8, 8), (8, 8)).unwrap();
    assert_eq!(data[0], 0.0);
    assert_eq!(data[63], 63.0);

    vrt.dataset().dispose();
    source.dispose();
    src_ds.dispose();
}

#[test]
fn band_creation_options_are_passed_to_the_driver() {
    let vrt = VrtDataset::create(4, 4).unwrap();
    let mut options = CslStringList::new();
    options.set_name_value("subclass", "VRTSourcedRasterBand").unwrap();
    let band = vrt.bands().create("Byte", &options).unwrap();
    assert_eq!(band.size().unwrap(), (4, 4));
    vrt.dataset().dispose();
}

#[test]
fn band_type_names_are_validated() {
    let vrt = VrtDataset::create(4, 4).unwrap();
    assert!(matches!(
        vrt.create_band("Float65"),
        Err(BridgeError::BadArgument { .. })
    ));
    vrt.dataset().dispose();
}

#[test]
fn unconfigured_sources_cannot_be_attached() {
    let vrt = VrtDataset::create(4, 4).unwrap();
    vrt.create_band("Byte").unwrap();
    let source = VrtSimpleSource::new();
    assert!(matches!(
        vrt.add_source(1, &source),
        Err(BridgeError::BadArgument { .. })
    ));
    source.dispose();
    vrt.dataset().dispose();
}

#[test]
fn vrt_composition_through_the_host_surface() {
    let fixture = create_gradient_tiff("vrt_host.tif", 40, 40);

    let src_ds = match invoke("open", &[fixture.path_str().into()]).unwrap() {
        Value::Handle(id) => id,
        other => panic!("unexpected result: {other:?}"),
    };
    let vrt = match invoke("vrt_create", &[Value::Int(10), Value::Int(10)]).unwrap() {
        Value::Handle(id) => id,
        other => panic!("unexpected result: {other:?}"),
    };
    assert_eq!(
        invoke("vrt_band_count", &[vrt.into()]).unwrap(),
        Value::Int(0)
    );
    let options = Value::Array(vec!["subclass=VRTSourcedRasterBand".into()]);
    let band = invoke("vrt_band_create", &[vrt.into(), "Float64".into(), options]).unwrap();
    assert!(matches!(band, Value::Handle(_)));

    // Option entries must be NAME=VALUE.
    let bad_options = Value::Array(vec!["TILED".into()]);
    let err = invoke(
        "vrt_band_create",
        &[vrt.into(), "Byte".into(), bad_options],
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::BadArgument { name: "options", .. }));

    let source = match invoke("source_create", &[]).unwrap() {
        Value::Handle(id) => id,
        other => panic!("unexpected result: {other:?}"),
    };
    let rect = |v: [f64; 4]| Value::Array(v.into_iter().map(Value::Double).collect());
    invoke(
        "source_set_src_band",
        &[source.into(), src_ds.into(), Value::Int(1)],
    )
    .unwrap();
    invoke(
        "source_set_src_window",
        &[source.into(), rect([0.0, 0.0, 10.0, 10.0])],
    )
    .unwrap();
    invoke(
        "source_set_dst_window",
        &[source.into(), rect([0.0, 0.0, 10.0, 10.0])],
    )
    .unwrap();
    invoke(
        "vrt_add_source",
        &[vrt.into(), Value::Int(1), source.into()],
    )
    .unwrap();

    // The first source pixel shows through the VRT.
    let min_max = invoke("band_min_max", &[band.clone()]).unwrap();
    match min_max {
        Value::Array(parts) => {
            assert_eq!(parts[0], Value::Double(0.0));
            assert_eq!(parts[1], Value::Double(9.0 * 40.0 + 9.0));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // A dataset handle is not a source handle.
    let err = invoke(
        "vrt_add_source",
        &[vrt.into(), Value::Int(1), src_ds.into()],
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::BadArgument { name: "source", .. }));

    invoke("dispose", &[vrt.into()]).unwrap();
    invoke("dispose", &[source.into()]).unwrap();
    invoke("dispose", &[src_ds.into()]).unwrap();
}
