//! Write/read tests against real NetCDF files in a scratch directory.

use chrono::{TimeZone, Utc};
use netcdf_parser::{read_dataset, read_dataset_with, DatasetWriter, Precision, ReadOptions};
use synsat_common::{Dataset, Field};

fn sample_dataset() -> Dataset {
    let mut ds = Dataset::new();
    ds.time = vec![
        Utc.with_ymd_and_hms(2020, 9, 15, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 9, 15, 1, 0, 0).unwrap(),
    ];
    ds.insert_coord("lon", Field::vector("lon", vec![0.0, 1.0, 2.0]));
    ds.insert_coord("lat", Field::vector("lat", vec![40.0, 41.0]));

    let values: Vec<f64> = (0..12).map(|v| v as f64 * 0.5).collect();
    let t = Field::from_shape_vec(["time", "lon", "lat"], &[2, 3, 2], values)
        .unwrap()
        .with_attr("units", "K");
    ds.insert_field("t", t);
    ds.set_attr("institution", "test");
    ds
}

#[test]
fn test_write_then_read_preserves_structure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.nc");
    let ds = sample_dataset();

    DatasetWriter::new().write(&path, &ds).unwrap();
    let back = read_dataset(&path).unwrap();

    assert_eq!(back.time, ds.time);
    assert_eq!(back.coord("lon").unwrap().values(), vec![0.0, 1.0, 2.0]);

    let t = back.field("t").unwrap();
    assert_eq!(t.dims(), &["time", "lon", "lat"]);
    assert_eq!(t.values(), ds.field("t").unwrap().values());
    assert_eq!(t.attr("units"), Some("K"));
    assert_eq!(back.attrs().get("institution").map(String::as_str), Some("test"));
}

#[test]
fn test_single_precision_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.nc");

    DatasetWriter::new()
        .precision(Precision::Single)
        .write(&path, &sample_dataset())
        .unwrap();
    let back = read_dataset(&path).unwrap();

    // 0.5 steps are exact in f32
    assert_eq!(back.field("t").unwrap().values()[3], 1.5);
}

#[test]
fn test_variable_filter_keeps_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filter.nc");
    let mut ds = sample_dataset();
    ds.insert_field("q", Field::vector("lon", vec![1e-3, 2e-3, 3e-3]));
    DatasetWriter::new().write(&path, &ds).unwrap();

    let back = read_dataset_with(&path, &ReadOptions::default().variables(["q"])).unwrap();
    assert!(back.has_field("q"));
    assert!(!back.has_field("t"));
    assert!(back.coord("lon").is_some());
    assert_eq!(back.time.len(), 2);
}

#[test]
fn test_packed_time_and_fill_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("packed.nc");
    {
        let mut file = netcdf::create(&path).unwrap();
        file.add_dimension("time", 2).unwrap();
        file.add_dimension("height", 3).unwrap();

        let mut time = file.add_variable::<f64>("time", &["time"]).unwrap();
        time.put_values(&[20200912.0, 20200912.25], ..).unwrap();
        time.put_attribute("units", "day as %Y%m%d.%f").unwrap();

        let mut clc = file.add_variable::<f32>("clc", &["time", "height"]).unwrap();
        clc.put_attribute("_FillValue", -999.0f32).unwrap();
        clc.put_values(&[0.0f32, 50.0, -999.0, 100.0, 25.0, 75.0], ..).unwrap();
    }

    let ds = read_dataset(&path).unwrap();
    assert_eq!(ds.time[1], Utc.with_ymd_and_hms(2020, 9, 12, 6, 0, 0).unwrap());

    let clc = ds.field("clc").unwrap().values();
    assert_eq!(clc[1], 50.0);
    assert!(clc[2].is_nan());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_dataset(&dir.path().join("absent.nc")).is_err());
}
