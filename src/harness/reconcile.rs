//! Comparing observed channel configuration with the reference bench.

use crate::client::VibrationView;
use crate::error::Result;

use super::fixtures::{ExpectedChannel, SENSITIVITY_TOLERANCE};

/// Configuration of one input as read back from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedChannel {
    /// Channel label
    pub label: String,
    /// Engineering unit
    pub unit: String,
    /// mV per engineering unit
    pub sensitivity: f64,
    /// Engineering scale
    pub engineering_scale: f64,
    /// AC coupling
    pub capacitor_coupled: bool,
    /// Accelerometer power
    pub accel_power_source: bool,
    /// Differential input
    pub differential: bool,
    /// Sensor serial number
    pub serial_number: String,
    /// Calibration date
    pub cal_date: String,
}

impl ObservedChannel {
    /// Read every configuration attribute of input `channel`.
    pub fn read(vv: &VibrationView, channel: usize) -> Result<Self> {
        Ok(Self {
            label: vv.channel_label(channel)?,
            unit: vv.channel_unit(channel)?,
            sensitivity: vv.input_sensitivity(channel)?,
            engineering_scale: vv.input_engineering_scale(channel)?,
            capacitor_coupled: vv.input_capacitor_coupled(channel)?,
            accel_power_source: vv.input_accel_power_source(channel)?,
            differential: vv.input_differential(channel)?,
            serial_number: vv.input_serial_number(channel)?,
            cal_date: vv.input_cal_date(channel)?,
        })
    }
}

/// One comparison line: description and whether it matched.
pub type Comparison = (String, bool);

/// Compare `observed` with `expected`.
///
/// Label and unit match on case-insensitive containment, sensitivity within
/// [`SENSITIVITY_TOLERANCE`], flags exactly. Serial number and calibration date
/// are compared only when an expectation exists.
pub fn compare_channel(expected: &ExpectedChannel, observed: &ObservedChannel) -> Vec<Comparison> {
    let contains = |haystack: &str, needle: &str| {
        !haystack.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
    };

    let mut lines = vec![
        (
            format!("  - Label: expected '{}', got '{}'", expected.label, observed.label),
            contains(&observed.label, expected.label),
        ),
        (
            format!("  - Unit: expected '{}', got '{}'", expected.unit, observed.unit),
            contains(&observed.unit, expected.unit),
        ),
        (
            format!(
                "  - Sensitivity: expected {}, got {}",
                expected.sensitivity, observed.sensitivity
            ),
            sensitivity_matches(expected.sensitivity, observed.sensitivity),
        ),
        (
            format!(
                "  - Capacitor Coupled: expected {}, got {}",
                expected.capacitor_coupled, observed.capacitor_coupled
            ),
            expected.capacitor_coupled == observed.capacitor_coupled,
        ),
        (
            format!(
                "  - Accel Power Source: expected {}, got {}",
                expected.accel_power_source, observed.accel_power_source
            ),
            expected.accel_power_source == observed.accel_power_source,
        ),
        (
            format!(
                "  - Differential: expected {}, got {}",
                expected.differential, observed.differential
            ),
            expected.differential == observed.differential,
        ),
    ];

    if !expected.serial_number.is_empty() {
        lines.push((
            format!(
                "  - Serial Number: expected '{}', got '{}'",
                expected.serial_number, observed.serial_number
            ),
            expected.serial_number == observed.serial_number,
        ));
    }
    if !expected.cal_date.is_empty() {
        lines.push((
            format!(
                "  - Calibration Date: expected '{}', got '{}'",
                expected.cal_date, observed.cal_date
            ),
            observed.cal_date.contains(expected.cal_date),
        ));
    }
    lines
}

/// Sensitivity within the relative tolerance of `expected`.
pub fn sensitivity_matches(expected: f64, actual: f64) -> bool {
    (expected - actual).abs() < expected * SENSITIVITY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::fixtures::expected_channel;

    fn observed_default() -> ObservedChannel {
        ObservedChannel {
            label: "Acceleration".into(),
            unit: "g".into(),
            sensitivity: 10.0,
            engineering_scale: 1.0,
            capacitor_coupled: false,
            accel_power_source: false,
            differential: false,
            serial_number: String::new(),
            cal_date: String::new(),
        }
    }

    #[test]
    fn default_channel_matches() {
        let lines = compare_channel(&expected_channel(5), &observed_default());
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|(_, ok)| *ok));
    }

    #[test]
    fn containment_is_case_insensitive() {
        let mut observed = observed_default();
        observed.label = "Ch 3 ACCELERATION".into();
        observed.unit = "G".into();
        let lines = compare_channel(&expected_channel(2), &observed);
        assert!(lines[0].1);
        assert!(lines[1].1);
    }

    #[test]
    fn channel_one_checks_serial_and_date() {
        let observed = ObservedChannel {
            sensitivity: 10.41,
            accel_power_source: true,
            serial_number: "5065".into(),
            cal_date: "Wed, Mar 12, 2008".into(),
            ..observed_default()
        };
        let lines = compare_channel(&expected_channel(0), &observed);
        assert_eq!(lines.len(), 8);
        assert!(lines.iter().all(|(_, ok)| *ok), "{:?}", lines);
    }

    #[test]
    fn sensitivity_tolerance() {
        assert!(sensitivity_matches(10.0, 10.009));
        assert!(!sensitivity_matches(10.0, 10.011));
    }
}
