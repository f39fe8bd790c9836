use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CharzError, Result};
use crate::port::PortSet;

/// A process, voltage and temperature operating point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub process: String,
    /// Supply voltage in volts.
    pub vdd: f64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
}

impl Corner {
    /// A short name used for output files.
    pub fn name(&self) -> String {
        format!(
            "{}_{}v_{}c",
            self.process,
            self.vdd.to_string().replace('.', "p"),
            self.temperature.to_string().replace('-', "m")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharzConfig {
    /// Name of the memory cell under test.
    pub name: String,
    pub word_size: usize,
    pub addr_width: usize,
    #[serde(default)]
    pub num_rw_ports: usize,
    #[serde(default)]
    pub num_w_ports: usize,
    #[serde(default)]
    pub num_r_ports: usize,
    /// Clock period in seconds.
    pub period: f64,
    /// Rise and fall time of all inputs in seconds.
    pub rise_time: f64,
    /// Capacitive load on each output in farads.
    #[serde(default)]
    pub load: f64,
    /// Netlist of the memory under test.
    pub netlist: Option<PathBuf>,
    /// Model files included by every deck.
    #[serde(default)]
    pub includes: Vec<PathBuf>,
    #[serde(default)]
    pub check_lvsdrc: bool,
    pub corners: Vec<Corner>,
}

impl CharzConfig {
    pub fn ports(&self) -> PortSet {
        PortSet::new(self.num_rw_ports, self.num_w_ports, self.num_r_ports)
    }

    pub fn num_words(&self) -> Result<usize> {
        u32::try_from(self.addr_width)
            .ok()
            .and_then(|w| 1usize.checked_shl(w))
            .ok_or_else(|| {
                CharzError::InvalidConfig(format!(
                    "address width {} is too large",
                    self.addr_width
                ))
            })
    }

    /// Time before each clock edge at which inputs switch.
    #[inline]
    pub fn setup(&self) -> f64 {
        self.period / 4.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.word_size == 0 || self.addr_width == 0 {
            return Err(CharzError::InvalidConfig(
                "word size and address width must be at least 1".to_string(),
            ));
        }
        if self.addr_width >= usize::BITS as usize {
            return Err(CharzError::InvalidConfig(format!(
                "address width must be less than {}",
                usize::BITS
            )));
        }
        if self.ports().is_empty() {
            return Err(CharzError::InvalidConfig(
                "memory must have at least one port".to_string(),
            ));
        }
        if self.period <= 0.0 || self.rise_time <= 0.0 {
            return Err(CharzError::InvalidConfig(
                "period and rise time must be positive".to_string(),
            ));
        }
        // Input edges are centered `setup` before the clock and must not overlap.
        if self.rise_time >= self.period / 2.0 || self.rise_time > 2.0 * self.setup() {
            return Err(CharzError::InvalidConfig(format!(
                "rise time {:e} s must be shorter than half the clock period {:e} s",
                self.rise_time, self.period
            )));
        }
        if self.corners.is_empty() {
            return Err(CharzError::InvalidConfig(
                "at least one corner is required".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn parse_charz_config(path: impl AsRef<Path>) -> Result<CharzConfig> {
    let contents = fs::read_to_string(path)?;
    let data: CharzConfig = toml::from_str(&contents)?;
    data.validate()?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"
name = "sram_2rw_16x4"
word_size = 4
addr_width = 4
num_rw_ports = 1
num_r_ports = 1
period = 2e-9
rise_time = 5e-11
load = 5e-15
includes = ["models/sky130.lib"]

[[corners]]
process = "tt"
vdd = 1.8
temperature = 25.0

[[corners]]
process = "ss"
vdd = 1.62
temperature = -40.0
"#;

    #[test]
    fn test_parse_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = parse_charz_config(file.path()).unwrap();

        assert_eq!(config.name, "sram_2rw_16x4");
        assert_eq!(config.num_words().unwrap(), 16);
        assert_eq!(config.ports().len(), 2);
        assert_eq!(config.ports().write_ports().count(), 1);
        assert!(!config.check_lvsdrc);
        assert_eq!(config.corners.len(), 2);
        assert_eq!(config.corners[0].name(), "tt_1p8v_25c");
        assert_eq!(config.corners[1].name(), "ss_1p62v_m40c");
    }

    #[test]
    fn test_validate() {
        let mut config: CharzConfig = toml::from_str(CONFIG).unwrap();
        assert!(config.validate().is_ok());

        config.num_rw_ports = 0;
        config.num_r_ports = 0;
        assert!(matches!(config.validate(), Err(CharzError::InvalidConfig(_))));

        let mut config: CharzConfig = toml::from_str(CONFIG).unwrap();
        config.corners.clear();
        assert!(matches!(config.validate(), Err(CharzError::InvalidConfig(_))));

        assert!(toml::from_str::<CharzConfig>("name = 1").is_err());
    }

    #[test]
    fn test_address_width_bounds() {
        let mut config: CharzConfig = toml::from_str(CONFIG).unwrap();
        config.addr_width = 64;
        assert!(matches!(config.validate(), Err(CharzError::InvalidConfig(_))));
        assert!(matches!(config.num_words(), Err(CharzError::InvalidConfig(_))));

        config.addr_width = 10;
        assert!(config.validate().is_ok());
        assert_eq!(config.num_words().unwrap(), 1024);
    }

    #[test]
    fn test_rise_time_bounds() {
        let mut config: CharzConfig = toml::from_str(CONFIG).unwrap();
        config.period = 1e-9;
        config.rise_time = 0.6e-9;
        assert!(matches!(config.validate(), Err(CharzError::InvalidConfig(_))));

        config.rise_time = 0.5e-9;
        assert!(matches!(config.validate(), Err(CharzError::InvalidConfig(_))));

        config.rise_time = 0.4e-9;
        assert!(config.validate().is_ok());
    }
}
