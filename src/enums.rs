//! Wire enumerations of the VibrationVIEW automation interface.
//!
//! Both enumerations are closed: unknown codes map to `None` on reverse lookup
//! rather than to a catch-all variant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Test type codes reported by the `TestType` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TestType {
    /// System check
    SystemCheck = 0,
    /// Sine
    Sine = 1,
    /// Random
    Random = 2,
    /// Shock
    Shock = 4,
    /// Transient capture
    Transient = 5,
    /// Field data replay
    Replay = 6,
}

impl TestType {
    /// Every test type, in wire-code order.
    pub const ALL: [TestType; 6] = [
        TestType::SystemCheck,
        TestType::Sine,
        TestType::Random,
        TestType::Shock,
        TestType::Transient,
        TestType::Replay,
    ];

    /// Wire code of this test type.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Reverse lookup from a wire code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Reverse lookup from the symbolic name (`TEST_SINE`) or the short name (`sine`).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|t| {
            t.name().eq_ignore_ascii_case(name) || t.short_name().eq_ignore_ascii_case(name)
        })
    }

    /// Symbolic name used by the host's type library.
    pub fn name(self) -> &'static str {
        match self {
            TestType::SystemCheck => "TEST_SYSCHECK",
            TestType::Sine => "TEST_SINE",
            TestType::Random => "TEST_RANDOM",
            TestType::Shock => "TEST_SHOCK",
            TestType::Transient => "TEST_TRANSIENT",
            TestType::Replay => "TEST_REPLAY",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            TestType::SystemCheck => "syscheck",
            TestType::Sine => "sine",
            TestType::Random => "random",
            TestType::Shock => "shock",
            TestType::Transient => "transient",
            TestType::Replay => "replay",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            TestType::SystemCheck => "System Check",
            TestType::Sine => "Sine",
            TestType::Random => "Random",
            TestType::Shock => "Shock",
            TestType::Transient => "Transient Capture",
            TestType::Replay => "FDR/Replay",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<TestType> for i32 {
    fn from(value: TestType) -> Self {
        value.code()
    }
}

/// Family of a raw data vector.
///
/// Each family owns a block of 100 codes: the base code addresses the shared
/// axis column, `base + n` addresses the data column of input channel `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorKind {
    /// Time-domain waveform
    Waveform,
    /// Frequency-domain spectrum
    Frequency,
    /// Time history (schedule trend)
    TimeHistory,
}

impl VectorKind {
    /// Every family, in code order.
    pub const ALL: [VectorKind; 3] = [
        VectorKind::Waveform,
        VectorKind::Frequency,
        VectorKind::TimeHistory,
    ];

    /// Block size reserved for each family.
    pub const BLOCK: i32 = 100;

    /// Base (axis) code of this family.
    pub fn base(self) -> i32 {
        match self {
            VectorKind::Waveform => 0,
            VectorKind::Frequency => 100,
            VectorKind::TimeHistory => 200,
        }
    }

    fn stem(self) -> &'static str {
        match self {
            VectorKind::Waveform => "WAVEFORM",
            VectorKind::Frequency => "FREQUENCY",
            VectorKind::TimeHistory => "TIMEHISTORY",
        }
    }
}

/// Identifier of a raw data vector: a family plus a column offset.
///
/// Column 0 is the axis (`FREQUENCYAXIS`); column `n` is the per-channel data
/// column `FREQUENCYn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorId {
    /// Vector family
    pub kind: VectorKind,
    /// Column offset added to the family's base code
    pub column: u16,
}

impl VectorId {
    /// Waveform time axis.
    pub const WAVEFORM_AXIS: VectorId = VectorId::axis(VectorKind::Waveform);
    /// Spectrum frequency axis.
    pub const FREQUENCY_AXIS: VectorId = VectorId::axis(VectorKind::Frequency);
    /// Time history axis.
    pub const TIME_HISTORY_AXIS: VectorId = VectorId::axis(VectorKind::TimeHistory);

    /// Axis column of a family.
    pub const fn axis(kind: VectorKind) -> Self {
        Self { kind, column: 0 }
    }

    /// Same family, offset by `column` (e.g. `FREQUENCY_AXIS.column(1)` is `FREQUENCY1`).
    pub fn column(self, column: u16) -> Self {
        Self {
            kind: self.kind,
            column,
        }
    }

    /// Raw wire code.
    pub fn code(self) -> i32 {
        self.kind.base() + i32::from(self.column)
    }

    /// Reverse lookup from a wire code.
    pub fn from_code(code: i32) -> Option<Self> {
        if code < 0 {
            return None;
        }
        let kind = VectorKind::ALL
            .into_iter()
            .find(|k| code / VectorKind::BLOCK == k.base() / VectorKind::BLOCK)?;
        let column = u16::try_from(code - kind.base()).ok()?;
        Some(Self { kind, column })
    }

    /// Reverse lookup from a symbolic name (`FREQUENCYAXIS`, `WAVEFORM3`).
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        for kind in VectorKind::ALL {
            let Some(rest) = upper.strip_prefix(kind.stem()) else {
                continue;
            };
            if rest == "AXIS" {
                return Some(Self::axis(kind));
            }
            if let Ok(column) = rest.parse::<u16>() {
                if column > 0 && i32::from(column) < VectorKind::BLOCK {
                    return Some(Self { kind, column });
                }
            }
        }
        None
    }

    /// Symbolic name used by the host's type library.
    pub fn name(self) -> String {
        if self.column == 0 {
            format!("{}AXIS", self.kind.stem())
        } else {
            format!("{}{}", self.kind.stem(), self.column)
        }
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<VectorId> for i32 {
    fn from(value: VectorId) -> Self {
        value.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_match_host() {
        assert_eq!(TestType::SystemCheck.code(), 0);
        assert_eq!(TestType::Sine.code(), 1);
        assert_eq!(TestType::Random.code(), 2);
        assert_eq!(TestType::Shock.code(), 4);
        assert_eq!(TestType::Transient.code(), 5);
        assert_eq!(TestType::Replay.code(), 6);
    }

    #[test]
    fn test_type_reverse_lookup() {
        assert_eq!(TestType::from_code(4), Some(TestType::Shock));
        assert_eq!(TestType::from_code(3), None);
        assert_eq!(TestType::from_name("TEST_SINE"), Some(TestType::Sine));
        assert_eq!(TestType::from_name("random"), Some(TestType::Random));
        assert_eq!(TestType::from_name("vibration"), None);
    }

    #[test]
    fn vector_codes_add_column_offset() {
        assert_eq!(VectorId::FREQUENCY_AXIS.code(), 100);
        assert_eq!(VectorId::FREQUENCY_AXIS.column(1).code(), 101);
        assert_eq!(VectorId::WAVEFORM_AXIS.column(4).code(), 4);
        assert_eq!(VectorId::TIME_HISTORY_AXIS.code(), 200);
    }

    #[test]
    fn vector_reverse_lookup() {
        assert_eq!(VectorId::from_code(101), Some(VectorId::FREQUENCY_AXIS.column(1)));
        assert_eq!(VectorId::from_code(0), Some(VectorId::WAVEFORM_AXIS));
        assert_eq!(VectorId::from_code(-1), None);
        assert_eq!(VectorId::from_code(950), None);

        assert_eq!(VectorId::from_name("frequencyaxis"), Some(VectorId::FREQUENCY_AXIS));
        assert_eq!(
            VectorId::from_name("WAVEFORM12"),
            Some(VectorId::WAVEFORM_AXIS.column(12))
        );
        assert_eq!(VectorId::from_name("WAVEFORM0"), None);
        assert_eq!(VectorId::from_name("SPECTRUMAXIS"), None);
    }

    #[test]
    fn vector_names() {
        assert_eq!(VectorId::TIME_HISTORY_AXIS.name(), "TIMEHISTORYAXIS");
        assert_eq!(VectorId::FREQUENCY_AXIS.column(3).to_string(), "FREQUENCY3");
    }
}
