//! Reference bench setup the suites check against.
//!
//! The input configuration file `channel 1 TEDS.vic` describes a Dytran 3055
//! accelerometer with TEDS on channel 1, accelerometer power on channels 1 and 2
//! and default 10 mV/g inputs elsewhere. `10mV per G.vic` resets every input to
//! the defaults and is applied after the check.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;
use crate::mock::{MockChannel, MockConfig, MockConnector};
use crate::teds::TedsEntry;

use super::profiles::TEST_FILES;

/// Configuration file loaded by the input configuration suite.
pub const TEDS_CONFIG_FILE: &str = "channel 1 TEDS.vic";
/// Configuration file applied at the end of the input configuration suite.
pub const DEFAULT_CONFIG_FILE: &str = "10mV per G.vic";
/// Channels checked after loading [`TEDS_CONFIG_FILE`].
pub const CHECKED_CHANNELS: usize = 16;
/// Relative tolerance on sensitivity.
pub const SENSITIVITY_TOLERANCE: f64 = 0.001;

/// Expected configuration of one input after loading [`TEDS_CONFIG_FILE`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedChannel {
    /// Contained in the label, case-insensitive
    pub label: &'static str,
    /// Contained in the unit, case-insensitive
    pub unit: &'static str,
    /// mV per engineering unit
    pub sensitivity: f64,
    /// AC coupling
    pub capacitor_coupled: bool,
    /// Accelerometer power
    pub accel_power_source: bool,
    /// Differential input
    pub differential: bool,
    /// Checked only when non-empty
    pub serial_number: &'static str,
    /// Contained in the calibration date; checked only when non-empty
    pub cal_date: &'static str,
}

impl Default for ExpectedChannel {
    fn default() -> Self {
        Self {
            label: "Acceleration",
            unit: "g",
            sensitivity: 10.0,
            capacitor_coupled: false,
            accel_power_source: false,
            differential: false,
            serial_number: "",
            cal_date: "",
        }
    }
}

/// Expected configuration of input `index` (0-based).
pub fn expected_channel(index: usize) -> ExpectedChannel {
    match index {
        0 => ExpectedChannel {
            sensitivity: 10.409000396728516,
            accel_power_source: true,
            serial_number: "5065",
            cal_date: "Mar 12, 2008",
            ..ExpectedChannel::default()
        },
        1 => ExpectedChannel {
            accel_power_source: true,
            ..ExpectedChannel::default()
        },
        _ => ExpectedChannel::default(),
    }
}

/// TEDS sheet of the Dytran 3055 on channel 1.
pub fn dytran_3055_teds() -> Vec<TedsEntry> {
    [
        ("Manufacturer", "Dytran Instruments"),
        ("Model number", "3055"),
        ("Version letter", "B"),
        ("Version number", "1"),
        ("Serial no.", "5065"),
        ("Sensitivity @ ref. cond. (S ref)", "10.41 mV/G"),
        ("High pass cut-off frequency (F hp)", "0.313 Hz"),
        ("Sensitivity direction (x,y,z, n/a)", "X"),
        ("Transducer weight", "7.95 gm"),
        ("Polarity (Sign)", "+1"),
        ("Low pass cut-off frequency (F lp)", "33 kHz"),
        ("Resonance frequency (F res)", "31.8 kHz"),
        ("Quality factor @ F res (Q)", "56.5 "),
        ("Amplitude slope (a)", "-2.3 %/decade"),
        ("Temperature coefficient (b)", "0.1 %/°C"),
        ("Reference frequency (F ref)", "98.7 Hz"),
        ("Reference temperature (T ref)", "22.0 °C"),
        ("Calibration date", "2008-03-12T17:00:00Z"),
        ("Calibration initials", "ED "),
        ("Calibration Period", "365 days"),
        ("Measurement position ID", "0"),
    ]
    .into_iter()
    .map(|(k, v)| TedsEntry::new(k, v))
    .collect()
}

impl ExpectedChannel {
    /// The simulated channel that satisfies this expectation.
    pub fn to_mock(&self, teds: Vec<TedsEntry>) -> MockChannel {
        MockChannel {
            label: self.label.to_string(),
            unit: self.unit.to_string(),
            sensitivity: self.sensitivity,
            capacitor_coupled: self.capacitor_coupled,
            accel_power_source: self.accel_power_source,
            differential: self.differential,
            serial_number: self.serial_number.to_string(),
            cal_date: self.cal_date.to_string(),
            teds: teds.into_iter().map(|e| (e.key, e.value)).collect(),
            ..MockChannel::default()
        }
    }
}

/// Create placeholder profiles and input configuration files under `root` and
/// return paths pointing at them.
pub fn materialize(root: &Path) -> io::Result<PathsConfig> {
    let paths = PathsConfig {
        profiles_dir: root.join("Profiles"),
        output_dir: root.join("output"),
        input_config_dir: root.join("InputConfig"),
    };
    fs::create_dir_all(&paths.profiles_dir)?;
    fs::create_dir_all(&paths.input_config_dir)?;
    for (_, file) in TEST_FILES {
        fs::write(paths.profiles_dir.join(file), b"")?;
    }
    for file in [TEDS_CONFIG_FILE, DEFAULT_CONFIG_FILE] {
        fs::write(paths.input_config_dir.join(file), b"")?;
    }
    Ok(paths)
}

/// Path the suites load a configuration file from.
pub fn input_config_path(paths: &PathsConfig, file: &str) -> PathBuf {
    paths.input_config_dir.join(file)
}

/// A simulated instance wired to the reference bench.
///
/// Both configuration files are registered under their paths in
/// `paths.input_config_dir`, and the bench starts in the default configuration.
pub fn mock_bench(paths: &PathsConfig) -> MockConnector {
    let connector = MockConnector::new(MockConfig {
        input_channels: CHECKED_CHANNELS,
        ..MockConfig::default()
    });

    let teds_config: Vec<MockChannel> = (0..CHECKED_CHANNELS)
        .map(|i| {
            let teds = if i == 0 { dytran_3055_teds() } else { Vec::new() };
            expected_channel(i).to_mock(teds)
        })
        .collect();
    connector.add_input_configuration(
        input_config_path(paths, TEDS_CONFIG_FILE).to_string_lossy(),
        teds_config,
    );
    connector.add_input_configuration(
        input_config_path(paths, DEFAULT_CONFIG_FILE).to_string_lossy(),
        vec![MockChannel::default(); CHECKED_CHANNELS],
    );
    connector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_one_carries_sensor() {
        let ch1 = expected_channel(0);
        assert_eq!(ch1.serial_number, "5065");
        assert!(ch1.accel_power_source);
        assert!(expected_channel(1).accel_power_source);
        assert_eq!(expected_channel(7), ExpectedChannel::default());
    }

    #[test]
    fn dytran_sheet_has_21_pairs() {
        let teds = dytran_3055_teds();
        assert_eq!(teds.len(), 21);
        assert_eq!(teds[12].value, "56.5 ");
        assert_eq!(teds[20].key, "Measurement position ID");
    }

    #[test]
    fn materialize_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = materialize(dir.path()).unwrap();
        assert!(paths.profiles_dir.join("Sine.vsp").exists());
        assert!(paths.profiles_dir.join("FDR.vrp").exists());
        assert!(input_config_path(&paths, TEDS_CONFIG_FILE).exists());
    }
}
