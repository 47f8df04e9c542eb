//! Reassembly of flat solver output into a labelled result.
//!
//! The result has the original profile dimensions with their coordinates,
//! one field per channel named after the channel identifier, and
//! provenance attributes. No channel coordinate is added.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use netcdf_parser::{DatasetWriter, Precision};
use synsat_common::Dataset;
use tracing::info;

use crate::config::ProvenanceConfig;
use crate::error::{Result, SynsatError};
use crate::instrument::Instrument;
use crate::orchestrator::SimulationOutput;
use crate::stack::ProfileStack;

/// Global attributes describing how a result was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub author: String,
    pub contact: String,
    pub institution: String,
    pub license: String,
    pub version: String,
    pub githash: String,
    pub creation_time: DateTime<Utc>,
    pub input_reference: String,
}

impl Provenance {
    pub fn new(config: &ProvenanceConfig, input_reference: impl Into<String>) -> Self {
        Self {
            author: config.author.clone(),
            contact: config.contact.clone(),
            institution: config.institution.clone(),
            license: config.license.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            githash: option_env!("SYNSAT_GITHASH").unwrap_or("unknown").to_string(),
            creation_time: Utc::now(),
            input_reference: input_reference.into(),
        }
    }

    pub fn apply(&self, ds: &mut Dataset) {
        ds.set_attr("author", self.author.as_str());
        ds.set_attr("contact", self.contact.as_str());
        ds.set_attr("institution", self.institution.as_str());
        ds.set_attr(
            "creation_time",
            self.creation_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        ds.set_attr("synsat_version", self.version.as_str());
        ds.set_attr("synsat_githash", self.githash.as_str());
        ds.set_attr("license", self.license.as_str());
        ds.set_attr("input_reference", self.input_reference.as_str());
    }
}

/// Restore the stacked dimensions and attach channel metadata.
pub fn reassemble(
    stack: &ProfileStack,
    output: &SimulationOutput,
    instrument: &Instrument,
    provenance: &Provenance,
) -> Result<Dataset> {
    if output.nchannels != instrument.nchannels() {
        return Err(SynsatError::shape(format!(
            "{} result channels for {} instrument channels",
            output.nchannels,
            instrument.nchannels()
        )));
    }
    if output.nprofiles != stack.len() || output.values.len() != stack.len() * output.nchannels {
        return Err(SynsatError::shape(format!(
            "{} result values for {} profiles x {} channels",
            output.values.len(),
            stack.len(),
            output.nchannels
        )));
    }

    let mut ds = stack.labels().clone();
    for (c, channel) in instrument.channels().iter().enumerate() {
        let field = stack
            .unflatten(output.channel(c))?
            .with_attr("units", channel.units())
            .with_attr("long_name", channel.long_name());
        ds.insert_field(channel.name.as_str(), field);
    }
    provenance.apply(&mut ds);
    Ok(ds)
}

/// Write a result with single-precision channel fields.
pub fn write_result(path: &Path, ds: &Dataset) -> Result<()> {
    DatasetWriter::new().precision(Precision::Single).write(path, ds)?;
    info!(file = %path.display(), fields = ds.field_names().len(), "Wrote result");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::instrument::InstrumentKind;
    use model_input::{AtmosphericState, ModelKind};
    use test_utils::generators::synthetic_regular_dataset;

    fn stack() -> ProfileStack {
        let state = AtmosphericState::new(synthetic_regular_dataset(2, 3, 2, 2), ModelKind::Era, "mem", 1.1e-9)
            .unwrap();
        ProfileStack::new(&state, &state.default_profile_dims(), &BTreeMap::new()).unwrap()
    }

    fn instrument() -> Instrument {
        Instrument::new(InstrumentKind::Seviri, None, Some(&[1, 9])).unwrap()
    }

    fn output(n: usize) -> SimulationOutput {
        SimulationOutput {
            nprofiles: n,
            nchannels: 2,
            values: (0..n).flat_map(|p| [p as f64, 1000.0 + p as f64]).collect(),
        }
    }

    #[test]
    fn test_reassemble_fields_and_metadata() {
        let st = stack();
        let mut config = ProvenanceConfig::default();
        config.author = "Jane Doe".to_string();
        let provenance = Provenance::new(&config, "era5-3d.nc");
        let ds = reassemble(&st, &output(st.len()), &instrument(), &provenance).unwrap();

        let bt = ds.field("bt108").unwrap();
        assert_eq!(bt.dims(), &["time", "lon", "lat"]);
        assert_eq!(bt.attr("units"), Some("K"));
        assert_eq!(bt.attr("long_name"), Some("brightness temperature at 10.8 um"));
        assert_eq!(bt.values()[5], 1005.0);

        let rho = ds.field("rho006").unwrap();
        assert_eq!(rho.attr("units"), Some("1"));
        assert_eq!(rho.values()[7], 7.0);

        assert!(ds.coord("channel").is_none());
        assert_eq!(ds.time.len(), 2);
        assert_eq!(ds.coord("lat").unwrap().values(), vec![40.0, 41.0]);
        assert_eq!(ds.attrs().get("author").map(String::as_str), Some("Jane Doe"));
        assert_eq!(ds.attrs().get("license").map(String::as_str), Some("CC-BY SA 3.0"));
        assert_eq!(ds.attrs().get("input_reference").map(String::as_str), Some("era5-3d.nc"));
        assert!(ds.attrs().contains_key("synsat_githash"));
    }

    #[test]
    fn test_reassemble_checks_sizes() {
        let st = stack();
        let provenance = Provenance::new(&ProvenanceConfig::default(), "mem");
        assert!(reassemble(&st, &output(st.len() - 1), &instrument(), &provenance).is_err());

        let one = Instrument::new(InstrumentKind::Seviri, None, Some(&[9])).unwrap();
        assert!(reassemble(&st, &output(st.len()), &one, &provenance).is_err());
    }

    #[test]
    fn test_write_result() {
        let st = stack();
        let provenance = Provenance::new(&ProvenanceConfig::default(), "mem");
        let ds = reassemble(&st, &output(st.len()), &instrument(), &provenance).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.nc");
        write_result(&path, &ds).unwrap();

        let back = netcdf_parser::read_dataset(&path).unwrap();
        assert_eq!(back.time, ds.time);
        assert_eq!(back.field("bt108").unwrap().values(), ds.field("bt108").unwrap().values());
        assert_eq!(back.attrs().get("synsat_version").map(String::as_str), Some(env!("CARGO_PKG_VERSION")));
    }
}
