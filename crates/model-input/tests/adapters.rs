//! End-to-end adapter tests against small fixture files.

use chrono::{TimeZone, Utc};
use model_input::{open_input, HorizontalGrid, InputConfig, InputError, ModelKind, Selection, Source};
use synsat_common::Extent;
use test_utils::assert_approx_eq;
use test_utils::fixtures::{
    cell_lonlat, era_hyam, era_hybm, shift_time_axis, write_era_files, write_icon_ifces2_files,
    write_icon_native_files, write_nextgems_store,
};
use test_utils::generators::{hourly_times, level_temperature, skin_temperature, SURFACE_PRESSURE};

#[test]
fn test_era_state_from_companion_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_era_files(dir.path(), 2, 3, 2, 4).unwrap();

    let state = open_input(&path, InputConfig::default()).unwrap();
    assert_eq!(state.source(), ModelKind::Era);
    assert_eq!(state.grid(), HorizontalGrid::Regular);
    assert_eq!(state.n_levels(), 4);
    // the monthly companion has one more step than the 3-D file
    assert_eq!(state.dataset().time, hourly_times(2));

    let p = state.field("p").unwrap();
    assert_eq!(p.dims(), &["time", "lev", "lat", "lon"]);
    // t=0, k=1, y=0, x=0
    assert_eq!(p.values()[6], era_hybm(1, 4) * SURFACE_PRESSURE + era_hyam(1));

    let q = state.field("q").unwrap().values();
    assert!(q.iter().all(|&v| v >= 1.1e-9));
    assert_eq!(q[0], 1.1e-9);
    assert!(state.field("cc").unwrap().values().iter().all(|&v| (0.0..=1.0).contains(&v)));

    let skt = state.field("SKT").unwrap();
    assert_eq!(skt.dims(), &["time", "lat", "lon"]);
    assert_eq!(skt.values()[6], skin_temperature(1, 0, 0));
}

#[test]
fn test_era_missing_companion_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_era_files(dir.path(), 1, 2, 2, 2).unwrap();
    std::fs::remove_file(dir.path().join("era5-2d-test-2020-09.nc")).unwrap();

    assert!(open_input(&path, InputConfig::default()).is_err());
}

#[test]
fn test_era_companion_at_other_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_era_files(dir.path(), 2, 2, 2, 2).unwrap();
    shift_time_axis(&dir.path().join("era5-2d-test-2020-09.nc"), 48.0).unwrap();

    assert!(matches!(
        open_input(&path, InputConfig::default()),
        Err(InputError::TimeMismatch(_))
    ));
}

#[test]
fn test_icon_ifces2_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon_ifces2_files(dir.path(), 2, 3, 2, 4).unwrap();

    let source = Source::resolve(&path, InputConfig::default()).unwrap();
    assert_eq!(source.kind(), ModelKind::Icon);

    let state = source.open(&path).unwrap();
    assert_eq!(state.grid(), HorizontalGrid::Regular);
    assert_eq!(state.dataset().time, hourly_times(2));
    assert!(state.field("cc").unwrap().values().iter().all(|&v| v == 0.5));
    assert_eq!(state.field("T2M").unwrap().dims(), &["time", "lat", "lon"]);
    assert_eq!(state.field("t").unwrap().dims(), &["time", "lev", "lat", "lon"]);
    assert_eq!(state.field("t").unwrap().values()[0], level_temperature(0, 0, 4));
}

#[test]
fn test_icon_native_state_with_georeference() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon_native_files(dir.path(), 1, 5, 3).unwrap();

    let state = open_input(&path, InputConfig::default()).unwrap();
    assert_eq!(state.grid(), HorizontalGrid::Unstructured);
    assert_eq!(state.default_profile_dims(), vec!["time", "cell"]);

    let (lon, lat) = cell_lonlat(5);
    let got_lon = state.dataset().coord("lon").unwrap().values();
    let got_lat = state.dataset().coord("lat").unwrap().values();
    for i in 0..5 {
        assert_approx_eq!(got_lon[i], lon[i], 1e-9);
        assert_approx_eq!(got_lat[i], lat[i], 1e-9);
    }

    // mask: ice on level 0, liquid on level 1, nothing on level 2
    let cc = state.field("cc").unwrap().values();
    assert_eq!(&cc[..5], &[1.0; 5]);
    assert_eq!(&cc[5..10], &[1.0; 5]);
    assert_eq!(&cc[10..], &[0.0; 5]);
}

#[test]
fn test_icon_surface_companion_at_other_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon_ifces2_files(dir.path(), 1, 2, 2, 2).unwrap();
    let surface = dir.path().join("ifces2/2d_surface_DOM01_ML_20200912T000000Z_regrid7km.nc");
    shift_time_axis(&surface, 1.0).unwrap();

    assert!(matches!(
        open_input(&path, InputConfig::default()),
        Err(InputError::TimeMismatch(_))
    ));
}

#[test]
fn test_icon_hydrometeor_file_at_other_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon_native_files(dir.path(), 1, 3, 2).unwrap();
    shift_time_axis(&dir.path().join("native/icon_cloud_DOM01_ML_20200912T000000Z.nc"), 1.0).unwrap();

    let err = open_input(&path, InputConfig::default()).unwrap_err();
    assert!(
        matches!(err, InputError::TimeMismatch(ref file) if file.ends_with("icon_cloud_DOM01_ML_20200912T000000Z.nc")),
        "unexpected error: {err}"
    );
}

#[test]
fn test_icon_qmix_file_at_other_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon_ifces2_files(dir.path(), 2, 2, 2, 2).unwrap();
    shift_time_axis(&dir.path().join("ifces2/3d_full_qmix_DOM01_ML_20200912T000000Z_regrid7km.nc"), 1.0).unwrap();

    assert!(matches!(
        open_input(&path, InputConfig::default()),
        Err(InputError::TimeMismatch(_))
    ));
}

#[test]
fn test_icon_missing_hydrometeor_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon_native_files(dir.path(), 1, 3, 2).unwrap();
    std::fs::remove_file(dir.path().join("native/icon_precip_DOM01_ML_20200912T000000Z.nc")).unwrap();

    assert!(open_input(&path, InputConfig::default()).is_err());
}

#[test]
fn test_nextgems_full_store() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_nextgems_store(dir.path(), 2, 4, 3).unwrap();

    let state = open_input(&catalog, InputConfig::default()).unwrap();
    assert_eq!(state.source(), ModelKind::NextGems);
    assert_eq!(state.grid(), HorizontalGrid::Unstructured);
    assert_eq!(state.n_levels(), 3);
    assert_eq!(state.dataset().time.len(), 2);

    let t2m = state.field("T2M").unwrap();
    assert_eq!(t2m.dims(), &["time", "cell"]);
    assert_eq!(t2m.values()[0], level_temperature(0, 2, 3));
    assert!(state.field("SP").unwrap().values().iter().all(|&v| v == 100_000.0));

    let cc = state.field("cc").unwrap();
    assert_eq!(cc.dims(), &["time", "lev", "cell"]);
    assert_eq!(&cc.values()[..12], &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_nextgems_time_and_region() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_nextgems_store(dir.path(), 3, 4, 2).unwrap();

    let mut config = InputConfig::default();
    config.nextgems.time = Some("2020-01-20T00:15:00Z".to_string());
    config.nextgems.selection = Selection::Regional;
    config.nextgems.extent = Some(Extent::new(-25.0, 5.0, -30.0, 0.0));

    let state = open_input(&catalog, config).unwrap();
    assert_eq!(
        state.dataset().time,
        vec![Utc.with_ymd_and_hms(2020, 1, 20, 0, 15, 0).unwrap()]
    );
    assert_eq!(state.dataset().coord("lon").unwrap().values(), vec![-20.0, -10.0, 0.0]);
    assert_eq!(state.field("SKT").unwrap().values(), vec![
        skin_temperature(1, 0, 1),
        skin_temperature(1, 0, 2),
        skin_temperature(1, 0, 3),
    ]);
}

#[test]
fn test_nextgems_zenith_selection_keeps_visible_cells() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_nextgems_store(dir.path(), 1, 4, 2).unwrap();

    let mut config = InputConfig::default();
    config.nextgems.selection = Selection::Zenith;
    let state = open_input(&catalog, config).unwrap();
    assert_eq!(state.dataset().dim_len("cell"), Some(4));
}

#[test]
fn test_nextgems_unknown_time() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_nextgems_store(dir.path(), 1, 2, 2).unwrap();

    let mut config = InputConfig::default();
    config.nextgems.time = Some("2021-01-01T00:00:00Z".to_string());
    assert!(matches!(
        open_input(&catalog, config),
        Err(InputError::TimeMismatch(_))
    ));
}

#[test]
fn test_unknown_source_fails_before_io() {
    let err = open_input(std::path::Path::new("/nonexistent/wrfout_d01.nc"), InputConfig::default())
        .unwrap_err();
    assert!(err.is_config_error());
}
