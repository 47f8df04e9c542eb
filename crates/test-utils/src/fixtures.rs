//! Small on-disk inputs laid out like each model source.
//!
//! Every writer takes a scratch directory and returns the path an adapter is
//! opened with. Values follow [`crate::generators`] so tests can predict the
//! canonical state.
//!
//! | writer | entry path | companions |
//! |---|---|---|
//! | [`write_era_files`] | `era5-3d-test-2020-09-12.nc` | `era5-2d-test-2020-09.nc` (one extra time step) |
//! | [`write_icon_ifces2_files`] | `ifces2/3d_full_DOM01_ML_20200912T000000Z_regrid7km.nc` | `3d_full_qmix_*`, `2d_surface_*` |
//! | [`write_icon_native_files`] | `native/icon_main_DOM01_ML_20200912T000000Z.nc` | `icon_cloud_*`, `icon_precip_*`, `icon_surface_*`, `grid_DOM01.nc` |
//! | [`write_nextgems_store`] | `catalog.yaml` | `ngc4008a_PT15M_9.zarr/` |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::generators::{
    grid_values, level_clwc, level_pressure, level_q, level_temperature, skin_temperature, CC, CIWC,
    CSWC, SURFACE_PRESSURE,
};

pub type FixtureResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Units of the packed `YYYYMMDD.fraction` time axis.
pub const PACKED_TIME_UNITS: &str = "day as %Y%m%d.%f";

/// Water vapor written at the top level of reanalysis fixtures, below any sane floor.
pub const NEGATIVE_Q: f64 = -1e-7;

/// Cloud cover written at the top level of reanalysis fixtures.
pub const EXCESS_CC: f64 = 1.2;

/// Reanalysis hybrid coefficient `a` for level `k`.
pub fn era_hyam(k: usize) -> f64 {
    100.0 * k as f64
}

/// Reanalysis hybrid coefficient `b` for level `k`.
pub fn era_hybm(k: usize, nlev: usize) -> f64 {
    (k + 1) as f64 / nlev as f64
}

fn put_var(
    file: &mut netcdf::FileMut,
    name: &str,
    dims: &[&str],
    values: &[f64],
    attrs: &[(&str, &str)],
) -> FixtureResult<()> {
    let mut var = file.add_variable::<f64>(name, dims)?;
    var.put_values(values, ..)?;
    for (key, value) in attrs {
        var.put_attribute(key, *value)?;
    }
    Ok(())
}

fn put_lonlat(file: &mut netcdf::FileMut, nlon: usize, nlat: usize) -> FixtureResult<()> {
    let lon: Vec<f64> = (0..nlon).map(|x| 10.0 + x as f64).collect();
    let lat: Vec<f64> = (0..nlat).map(|y| 40.0 + y as f64).collect();
    put_var(file, "lon", &["lon"], &lon, &[("units", "degrees_east")])?;
    put_var(file, "lat", &["lat"], &lat, &[("units", "degrees_north")])?;
    Ok(())
}

fn packed_times(ntime: usize) -> Vec<f64> {
    (0..ntime).map(|t| 20200912.0 + t as f64 / 24.0).collect()
}

/// Reanalysis 3-D file plus its monthly surface companion.
///
/// The 3-D file stores `t, q, clwc, ciwc, cswc, cc` on `(time, nhym, lat, lon)`
/// with `hyam`/`hybm`; `q` is [`NEGATIVE_Q`] and `cc` is [`EXCESS_CC`] on the
/// top level. Time is CF hours since 2020-09-12.
pub fn write_era_files(dir: &Path, ntime: usize, nlon: usize, nlat: usize, nlev: usize) -> FixtureResult<PathBuf> {
    let path3d = dir.join("era5-3d-test-2020-09-12.nc");
    let path2d = dir.join("era5-2d-test-2020-09.nc");
    let hours = "hours since 2020-09-12 00:00:00";

    let mut file = netcdf::create(&path3d)?;
    for (name, len) in [("time", ntime), ("nhym", nlev), ("lat", nlat), ("lon", nlon)] {
        file.add_dimension(name, len)?;
    }
    let times: Vec<f64> = (0..ntime).map(|t| t as f64).collect();
    put_var(&mut file, "time", &["time"], &times, &[("units", hours)])?;
    put_lonlat(&mut file, nlon, nlat)?;

    let hyam: Vec<f64> = (0..nlev).map(era_hyam).collect();
    let hybm: Vec<f64> = (0..nlev).map(|k| era_hybm(k, nlev)).collect();
    put_var(&mut file, "hyam", &["nhym"], &hyam, &[])?;
    put_var(&mut file, "hybm", &["nhym"], &hybm, &[])?;

    let dims = ["time", "nhym", "lat", "lon"];
    let shape = [ntime, nlev, nlat, nlon];
    put_var(&mut file, "t", &dims, &grid_values(shape, |[t, k, _, _]| level_temperature(t, k, nlev)), &[("units", "K")])?;
    put_var(
        &mut file,
        "q",
        &dims,
        &grid_values(shape, |[_, k, _, _]| if k == 0 { NEGATIVE_Q } else { level_q(k) }),
        &[("units", "kg kg**-1")],
    )?;
    put_var(&mut file, "clwc", &dims, &grid_values(shape, |[_, k, _, _]| level_clwc(k, nlev)), &[])?;
    put_var(&mut file, "ciwc", &dims, &grid_values(shape, |_| CIWC), &[])?;
    put_var(&mut file, "cswc", &dims, &grid_values(shape, |_| CSWC), &[])?;
    put_var(
        &mut file,
        "cc",
        &dims,
        &grid_values(shape, |[_, k, _, _]| if k == 0 { EXCESS_CC } else { CC }),
        &[],
    )?;
    drop(file);

    let ntime2d = ntime + 1;
    let mut file = netcdf::create(&path2d)?;
    for (name, len) in [("time", ntime2d), ("lat", nlat), ("lon", nlon)] {
        file.add_dimension(name, len)?;
    }
    let times: Vec<f64> = (0..ntime2d).map(|t| t as f64).collect();
    put_var(&mut file, "time", &["time"], &times, &[("units", hours)])?;
    put_lonlat(&mut file, nlon, nlat)?;

    let dims = ["time", "lat", "lon"];
    let shape = [ntime2d, nlat, nlon];
    put_var(&mut file, "SKT", &dims, &grid_values(shape, |[t, y, x]| skin_temperature(t, y, x)), &[("units", "K")])?;
    put_var(&mut file, "SP", &dims, &grid_values(shape, |_| SURFACE_PRESSURE), &[("units", "Pa")])?;
    put_var(&mut file, "T2M", &dims, &grid_values(shape, |[t, y, x]| skin_temperature(t, y, x) - 2.0), &[("units", "K")])?;

    Ok(path3d)
}

/// ICON `ifces2` run regridded to a regular grid, packed time axis.
///
/// `clc` is written in percent (value 50); `t_2m` keeps a length-one
/// `height` dimension in the surface file.
pub fn write_icon_ifces2_files(
    dir: &Path,
    ntime: usize,
    nlon: usize,
    nlat: usize,
    nlev: usize,
) -> FixtureResult<PathBuf> {
    let run = dir.join("ifces2");
    std::fs::create_dir_all(&run)?;
    let name = |data_type: &str, stack: &str| {
        run.join(format!("{}_{}_DOM01_ML_20200912T000000Z_regrid7km.nc", data_type, stack))
    };
    let times = packed_times(ntime);
    let heights: Vec<f64> = (0..nlev).map(|k| (nlev - k) as f64).collect();
    let dims = ["time", "height", "lat", "lon"];
    let shape = [ntime, nlev, nlat, nlon];

    let header = |path: &Path, nheight: usize| -> FixtureResult<netcdf::FileMut> {
        let mut file = netcdf::create(path)?;
        for (dim, len) in [("time", ntime), ("height", nheight), ("lat", nlat), ("lon", nlon)] {
            file.add_dimension(dim, len)?;
        }
        put_var(&mut file, "time", &["time"], &times, &[("units", PACKED_TIME_UNITS)])?;
        put_lonlat(&mut file, nlon, nlat)?;
        Ok(file)
    };

    let main = name("3d", "full");
    let mut file = header(&main, nlev)?;
    put_var(&mut file, "height", &["height"], &heights, &[])?;
    put_var(&mut file, "pres", &dims, &grid_values(shape, |[_, k, _, _]| level_pressure(k, nlev)), &[("units", "Pa")])?;
    put_var(&mut file, "temp", &dims, &grid_values(shape, |[t, k, _, _]| level_temperature(t, k, nlev)), &[("units", "K")])?;
    put_var(&mut file, "qv", &dims, &grid_values(shape, |[_, k, _, _]| level_q(k)), &[])?;
    put_var(&mut file, "clc", &dims, &grid_values(shape, |_| 100.0 * CC), &[("units", "%")])?;
    drop(file);

    let mut file = header(&name("3d", "full_qmix"), nlev)?;
    put_var(&mut file, "height", &["height"], &heights, &[])?;
    put_var(&mut file, "qc", &dims, &grid_values(shape, |[_, k, _, _]| level_clwc(k, nlev)), &[])?;
    put_var(&mut file, "qi", &dims, &grid_values(shape, |_| CIWC), &[])?;
    put_var(&mut file, "qs", &dims, &grid_values(shape, |_| CSWC), &[])?;
    drop(file);

    let mut file = header(&name("2d", "surface"), 1)?;
    put_var(&mut file, "height", &["height"], &[2.0], &[])?;
    let sdims = ["time", "lat", "lon"];
    let sshape = [ntime, nlat, nlon];
    put_var(&mut file, "t_s", &sdims, &grid_values(sshape, |[t, y, x]| skin_temperature(t, y, x)), &[])?;
    put_var(&mut file, "pres_sfc", &sdims, &grid_values(sshape, |_| SURFACE_PRESSURE), &[])?;
    put_var(
        &mut file,
        "t_2m",
        &dims,
        &grid_values([ntime, 1, nlat, nlon], |[t, _, y, x]| skin_temperature(t, y, x) - 2.0),
        &[],
    )?;

    Ok(main)
}

/// Cell centers of unstructured fixtures in degrees: `(-30 + 10i, -20 + 5i)`.
pub fn cell_lonlat(ncell: usize) -> (Vec<f64>, Vec<f64>) {
    (
        (0..ncell).map(|i| -30.0 + 10.0 * i as f64).collect(),
        (0..ncell).map(|i| -20.0 + 5.0 * i as f64).collect(),
    )
}

/// ICON native-grid run with a separate `grid_DOM01.nc` georeference.
///
/// No cloud cover is written. Condensate is `qc` on the middle level and
/// `qi` on the top level, zero elsewhere.
pub fn write_icon_native_files(dir: &Path, ntime: usize, ncell: usize, nlev: usize) -> FixtureResult<PathBuf> {
    let run = dir.join("native");
    std::fs::create_dir_all(&run)?;
    let name = |stack: &str| run.join(format!("icon_{}_DOM01_ML_20200912T000000Z.nc", stack));
    let times = packed_times(ntime);
    let dims = ["time", "height", "ncells"];
    let shape = [ntime, nlev, ncell];

    let header = |path: &Path| -> FixtureResult<netcdf::FileMut> {
        let mut file = netcdf::create(path)?;
        for (dim, len) in [("time", ntime), ("height", nlev), ("ncells", ncell)] {
            file.add_dimension(dim, len)?;
        }
        put_var(&mut file, "time", &["time"], &times, &[("units", PACKED_TIME_UNITS)])?;
        Ok(file)
    };

    let main = name("main");
    let mut file = header(&main)?;
    put_var(&mut file, "pres", &dims, &grid_values(shape, |[_, k, _]| level_pressure(k, nlev)), &[])?;
    put_var(&mut file, "temp", &dims, &grid_values(shape, |[t, k, _]| level_temperature(t, k, nlev)), &[])?;
    put_var(&mut file, "qv", &dims, &grid_values(shape, |[_, k, _]| level_q(k)), &[])?;
    drop(file);

    let mut file = header(&name("cloud"))?;
    put_var(&mut file, "qc", &dims, &grid_values(shape, |[_, k, _]| level_clwc(k, nlev)), &[])?;
    put_var(&mut file, "qi", &dims, &grid_values(shape, |[_, k, _]| if k == 0 { CIWC } else { 0.0 }), &[])?;
    drop(file);

    let mut file = header(&name("precip"))?;
    put_var(&mut file, "qs", &dims, &grid_values(shape, |_| 0.0), &[])?;
    put_var(&mut file, "qr", &dims, &grid_values(shape, |_| 0.0), &[])?;
    drop(file);

    let mut file = header(&name("surface"))?;
    let sdims = ["time", "ncells"];
    let sshape = [ntime, ncell];
    put_var(&mut file, "t_g", &sdims, &grid_values(sshape, |[t, i]| skin_temperature(t, 0, i)), &[])?;
    put_var(&mut file, "t_2m", &sdims, &grid_values(sshape, |[t, i]| skin_temperature(t, 0, i) - 2.0), &[])?;
    put_var(&mut file, "pres_sfc", &sdims, &grid_values(sshape, |_| SURFACE_PRESSURE), &[])?;
    drop(file);

    let (lon, lat) = cell_lonlat(ncell);
    let mut file = netcdf::create(run.join("grid_DOM01.nc"))?;
    file.add_dimension("ncells", ncell)?;
    let clon: Vec<f64> = lon.iter().map(|v| v.to_radians()).collect();
    let clat: Vec<f64> = lat.iter().map(|v| v.to_radians()).collect();
    put_var(&mut file, "clon", &["ncells"], &clon, &[("units", "radian")])?;
    put_var(&mut file, "clat", &["ncells"], &clat, &[("units", "radian")])?;

    Ok(main)
}

/// Add `offset` (in the file's own time units) to every value of `time`.
///
/// Turns a fixture companion into one that covers different time slots.
pub fn shift_time_axis(path: &Path, offset: f64) -> FixtureResult<()> {
    let mut file = netcdf::append(path)?;
    let mut var = file
        .variable_mut("time")
        .ok_or_else(|| format!("{} has no time variable", path.display()))?;
    let shifted: Vec<f64> = var.get_values::<f64, _>(..)?.into_iter().map(|t| t + offset).collect();
    var.put_values(&shifted, ..)?;
    Ok(())
}

fn put_zarr(
    store: &Arc<FilesystemStore>,
    name: &str,
    dims: &[&str],
    shape: &[usize],
    values: &[f64],
    units: Option<&str>,
) -> FixtureResult<()> {
    let shape: Vec<u64> = shape.iter().map(|&n| n as u64).collect();
    let mut attrs = serde_json::Map::new();
    attrs.insert("_ARRAY_DIMENSIONS".to_string(), serde_json::json!(dims));
    if let Some(units) = units {
        attrs.insert("units".to_string(), serde_json::json!(units));
    }

    let array = ArrayBuilder::new(
        shape.clone(),
        DataType::Float64,
        shape.clone().try_into()?,
        FillValue::from(f64::NAN),
    )
    .attributes(attrs)
    .build(store.clone(), &format!("/{}", name))?;
    array.store_metadata()?;

    let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)?;
    array.store_array_subset_elements(&subset, values)?;
    Ok(())
}

/// Time axis of [`write_nextgems_store`]: every 15 minutes from 2020-01-20.
pub const NEXTGEMS_TIME_UNITS: &str = "minutes since 2020-01-20 00:00:00";

/// Catalog plus a Zarr store for experiment `ngc4008a` at zoom 9, `PT15M`.
///
/// Cells follow [`cell_lonlat`]; `cli` is non-zero only on the top level,
/// `qs` is zero.
pub fn write_nextgems_store(dir: &Path, ntime: usize, ncell: usize, nlev: usize) -> FixtureResult<PathBuf> {
    let catalog = dir.join("catalog.yaml");
    std::fs::write(
        &catalog,
        "sources:\n  ngc4008a:\n    description: synthetic coupled run\n    urlpath: \"ngc4008a_{time}_{zoom}.zarr\"\n    format: zarr\n",
    )?;

    let root = dir.join("ngc4008a_PT15M_9.zarr");
    std::fs::create_dir_all(&root)?;
    let store = Arc::new(FilesystemStore::new(&root)?);

    let times: Vec<f64> = (0..ntime).map(|t| 15.0 * t as f64).collect();
    put_zarr(&store, "time", &["time"], &[ntime], &times, Some(NEXTGEMS_TIME_UNITS))?;

    let (lon, lat) = cell_lonlat(ncell);
    put_zarr(&store, "lon", &["cell"], &[ncell], &lon, Some("degrees_east"))?;
    put_zarr(&store, "lat", &["cell"], &[ncell], &lat, Some("degrees_north"))?;

    let dims = ["time", "level_full", "cell"];
    let shape = [ntime, nlev, ncell];
    put_zarr(&store, "pfull", &dims, &shape, &grid_values(shape, |[_, k, _]| level_pressure(k, nlev)), Some("Pa"))?;
    put_zarr(&store, "ta", &dims, &shape, &grid_values(shape, |[t, k, _]| level_temperature(t, k, nlev)), Some("K"))?;
    put_zarr(&store, "hus", &dims, &shape, &grid_values(shape, |[_, k, _]| level_q(k)), None)?;
    put_zarr(&store, "clw", &dims, &shape, &grid_values(shape, |[_, k, _]| level_clwc(k, nlev)), None)?;
    put_zarr(&store, "cli", &dims, &shape, &grid_values(shape, |[_, k, _]| if k == 0 { CIWC } else { 0.0 }), None)?;
    put_zarr(&store, "qs", &dims, &shape, &grid_values(shape, |_| 0.0), None)?;
    put_zarr(&store, "ts", &["time", "cell"], &[ntime, ncell], &grid_values([ntime, ncell], |[t, i]| skin_temperature(t, 0, i)), Some("K"))?;

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era_files_are_written() {
        let dir = crate::temp_test_dir();
        let path = write_era_files(dir.path(), 2, 3, 2, 4).unwrap();
        assert!(path.exists());
        assert!(dir.path().join("era5-2d-test-2020-09.nc").exists());

        let file = netcdf::open(&path).unwrap();
        let t = file.variable("t").unwrap();
        let shape: Vec<usize> = t.dimensions().iter().map(|d| d.len()).collect();
        assert_eq!(shape, vec![2, 4, 2, 3]);
    }

    #[test]
    fn test_nextgems_store_layout() {
        let dir = crate::temp_test_dir();
        let catalog = write_nextgems_store(dir.path(), 2, 4, 3).unwrap();
        assert!(catalog.exists());
        assert!(dir.path().join("ngc4008a_PT15M_9.zarr").is_dir());
    }
}
