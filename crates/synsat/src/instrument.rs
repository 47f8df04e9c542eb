//! Geostationary imagers known to the simulator.
//!
//! | instrument | platform | satellites | default channels |
//! |---|---|---|---|
//! | SEVIRI | MSG | 1..=4 | 5, 6, 7, 9, 10, 11 |
//! | ABI | GOES | 16..=19 | 7..=16 |
//!
//! Channel identifiers combine a kind prefix with the nominal wavelength in
//! tenths of a micrometre: `bt108` is a 10.8 µm brightness temperature,
//! `rho006` a 0.6 µm reflectance.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynsatError};

/// Coefficient sub-directory below the solver installation.
pub const COEF_SUBDIR: &str = "rtcoef_rttov13/rttov13pred54L";

const SEVIRI_CHANNELS: [&str; 11] = [
    "rho006", "rho008", "rho016", "bt039", "bt062", "bt073", "bt087", "bt097", "bt108", "bt120",
    "bt134",
];

const ABI_CHANNELS: [&str; 16] = [
    "rho047", "rho064", "rho086", "rho137", "rho161", "rho224", "bt039", "bt062", "bt069", "bt073",
    "bt084", "bt096", "bt103", "bt112", "bt123", "bt133",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    #[default]
    Seviri,
    Abi,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seviri => "seviri",
            Self::Abi => "abi",
        }
    }

    pub fn default_satellite(&self) -> u8 {
        match self {
            Self::Seviri => 3,
            Self::Abi => 16,
        }
    }

    pub fn default_channels(&self) -> Vec<u16> {
        match self {
            Self::Seviri => vec![5, 6, 7, 9, 10, 11],
            Self::Abi => (7..=16).collect(),
        }
    }

    fn satellites(&self) -> std::ops::RangeInclusive<u8> {
        match self {
            Self::Seviri => 1..=4,
            Self::Abi => 16..=19,
        }
    }

    fn platform(&self) -> &'static str {
        match self {
            Self::Seviri => "msg",
            Self::Abi => "goes",
        }
    }

    fn channel_table(&self) -> &'static [&'static str] {
        match self {
            Self::Seviri => &SEVIRI_CHANNELS,
            Self::Abi => &ABI_CHANNELS,
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for InstrumentKind {
    type Err = SynsatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "seviri" => Ok(Self::Seviri),
            "abi" => Ok(Self::Abi),
            other => Err(SynsatError::UnsupportedInstrument(other.to_string())),
        }
    }
}

/// Physical quantity simulated for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    BrightnessTemperature,
    Reflectance,
}

impl ChannelKind {
    pub fn units(&self) -> &'static str {
        match self {
            Self::BrightnessTemperature => "K",
            Self::Reflectance => "1",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::BrightnessTemperature => "brightness temperature",
            Self::Reflectance => "reflectance",
        }
    }
}

/// One loaded channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Channel number as used by the solver (1-based).
    pub number: u16,
    /// Identifier such as `bt108`.
    pub name: String,
    pub kind: ChannelKind,
    /// Nominal wavelength (µm).
    pub wavelength_um: f64,
}

impl Channel {
    /// Parse an identifier like `bt108` or `rho006`.
    pub fn parse(number: u16, name: &str) -> Result<Self> {
        let (kind, digits) = if let Some(d) = name.strip_prefix("bt") {
            (ChannelKind::BrightnessTemperature, d)
        } else if let Some(d) = name.strip_prefix("rho") {
            (ChannelKind::Reflectance, d)
        } else {
            return Err(SynsatError::config(format!("unknown channel kind in '{}'", name)));
        };

        let tenths: u32 = digits
            .parse()
            .map_err(|_| SynsatError::config(format!("no wavelength in channel '{}'", name)))?;

        Ok(Self {
            number,
            name: name.to_string(),
            kind,
            wavelength_um: f64::from(tenths) / 10.0,
        })
    }

    pub fn units(&self) -> &'static str {
        self.kind.units()
    }

    pub fn long_name(&self) -> String {
        format!("{} at {:.1} um", self.kind.label(), self.wavelength_um)
    }
}

/// An instrument on one satellite with a selected channel set.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub kind: InstrumentKind,
    pub satellite: u8,
    channels: Vec<Channel>,
}

impl Instrument {
    /// Look up an instrument; `None` selects the defaults.
    pub fn new(kind: InstrumentKind, satellite: Option<u8>, channels: Option<&[u16]>) -> Result<Self> {
        let satellite = satellite.unwrap_or_else(|| kind.default_satellite());
        if !kind.satellites().contains(&satellite) {
            return Err(SynsatError::UnsupportedInstrument(format!(
                "{} on {}-{}",
                kind,
                kind.platform().to_uppercase(),
                satellite
            )));
        }

        let numbers = match channels {
            Some(list) => list.to_vec(),
            None => kind.default_channels(),
        };
        if numbers.is_empty() {
            return Err(SynsatError::config("channel list is empty"));
        }

        let table = kind.channel_table();
        let channels = numbers
            .iter()
            .map(|&n| {
                let name = usize::from(n)
                    .checked_sub(1)
                    .and_then(|i| table.get(i))
                    .ok_or_else(|| SynsatError::UnknownChannel {
                        instrument: kind.to_string(),
                        channel: n,
                    })?;
                Channel::parse(n, name)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            kind,
            satellite,
            channels,
        })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_numbers(&self) -> Vec<u16> {
        self.channels.iter().map(|c| c.number).collect()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn nchannels(&self) -> usize {
        self.channels.len()
    }

    /// Coefficient file below the solver installation `root`.
    pub fn coef_path(&self, root: &Path) -> PathBuf {
        root.join(COEF_SUBDIR).join(format!(
            "rtcoef_{}_{}_{}_o3.dat",
            self.kind.platform(),
            self.satellite,
            self.kind.as_str()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seviri_defaults() {
        let inst = Instrument::new(InstrumentKind::Seviri, None, None).unwrap();
        assert_eq!(inst.satellite, 3);
        assert_eq!(inst.channel_numbers(), vec![5, 6, 7, 9, 10, 11]);
        assert_eq!(
            inst.channel_names(),
            vec!["bt062", "bt073", "bt087", "bt108", "bt120", "bt134"]
        );
        assert_eq!(
            inst.coef_path(Path::new("/opt/rttov")),
            PathBuf::from("/opt/rttov/rtcoef_rttov13/rttov13pred54L/rtcoef_msg_3_seviri_o3.dat")
        );
    }

    #[test]
    fn test_abi_single_channel() {
        let inst = Instrument::new(InstrumentKind::Abi, None, Some(&[13])).unwrap();
        assert_eq!(inst.channel_names(), vec!["bt103"]);
        assert!(inst.coef_path(Path::new("/r")).ends_with("rtcoef_goes_16_abi_o3.dat"));
        assert_eq!(InstrumentKind::Abi.default_channels().len(), 10);
    }

    #[test]
    fn test_channel_parsing() {
        let bt = Channel::parse(9, "bt108").unwrap();
        assert_eq!(bt.kind, ChannelKind::BrightnessTemperature);
        assert_eq!(bt.units(), "K");
        assert_eq!(bt.wavelength_um, 10.8);
        assert_eq!(bt.long_name(), "brightness temperature at 10.8 um");

        let rho = Channel::parse(1, "rho006").unwrap();
        assert_eq!(rho.units(), "1");
        assert_eq!(rho.wavelength_um, 0.6);
        assert!(Channel::parse(1, "xx10").is_err());
    }

    #[test]
    fn test_registry_errors() {
        assert!(matches!(
            Instrument::new(InstrumentKind::Seviri, None, Some(&[12])),
            Err(SynsatError::UnknownChannel { channel: 12, .. })
        ));
        assert!(matches!(
            Instrument::new(InstrumentKind::Abi, None, Some(&[0])),
            Err(SynsatError::UnknownChannel { channel: 0, .. })
        ));
        assert!(matches!(
            Instrument::new(InstrumentKind::Seviri, Some(11), None),
            Err(SynsatError::UnsupportedInstrument(_))
        ));
        assert!("modis".parse::<InstrumentKind>().is_err());
        assert_eq!("SEVIRI".parse::<InstrumentKind>().unwrap(), InstrumentKind::Seviri);
    }
}
