//! TEDS (Transducer Electronic Data Sheet) records.
//!
//! The host reports a channel's TEDS as a fixed 32×2 table of strings; unused rows
//! are left blank. [`TedsEntry::from_rows`] turns that table into an ordered list,
//! and [`reconcile`] compares a list against the pairs a known sensor should report.

use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;

/// Rows in the buffer handed to the host.
pub const TEDS_BUFFER_ROWS: usize = 32;
/// Columns in the buffer handed to the host (key, value).
pub const TEDS_BUFFER_COLUMNS: usize = 2;
/// Fraction of expected pairs that must match for a TEDS read to be accepted.
pub const TEDS_MATCH_THRESHOLD: f64 = 0.9;

/// One key/value pair of a TEDS sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TedsEntry {
    /// Field name as reported by the host
    pub key: String,
    /// Field value, verbatim (trailing blanks preserved)
    pub value: String,
}

impl TedsEntry {
    /// Create an entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Convert the raw table into entries.
    ///
    /// Trailing rows whose key and value are both empty are dropped; a blank row
    /// followed by a populated one is kept so row positions survive.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Vec<TedsEntry> {
        let mut entries: Vec<TedsEntry> = rows
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                let key = cells.next().unwrap_or_default();
                let value = cells.next().unwrap_or_default();
                TedsEntry { key, value }
            })
            .collect();
        while entries
            .last()
            .is_some_and(|e| e.key.is_empty() && e.value.is_empty())
        {
            entries.pop();
        }
        entries
    }
}

/// Result of reading one channel's TEDS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TedsOutcome {
    /// The sheet (empty for sensors without TEDS)
    Teds(Vec<TedsEntry>),
    /// The read failed
    Error(ErrorInfo),
}

/// TEDS of one channel, serialized as `{"channel": n, "teds": [...]}` or
/// `{"channel": n, "error": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTeds {
    /// 1-based channel number
    pub channel: usize,
    /// What the read produced
    #[serde(flatten)]
    pub outcome: TedsOutcome,
}

impl ChannelTeds {
    /// Successful read.
    pub fn entries(channel: usize, entries: Vec<TedsEntry>) -> Self {
        Self {
            channel,
            outcome: TedsOutcome::Teds(entries),
        }
    }

    /// Failed read.
    pub fn error(channel: usize, error: ErrorInfo) -> Self {
        Self {
            channel,
            outcome: TedsOutcome::Error(error),
        }
    }

    /// The entries, if the read succeeded.
    pub fn teds(&self) -> Option<&[TedsEntry]> {
        match &self.outcome {
            TedsOutcome::Teds(entries) => Some(entries),
            TedsOutcome::Error(_) => None,
        }
    }
}

/// How well a TEDS sheet matched the expected pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TedsMatch {
    /// Expected pairs found with an identical value
    pub matched: usize,
    /// Number of expected pairs
    pub expected: usize,
    /// Expected keys that were absent or differed
    pub mismatches: Vec<String>,
}

impl TedsMatch {
    /// Matched fraction; an empty expectation counts as a full match.
    pub fn ratio(&self) -> f64 {
        if self.expected == 0 {
            1.0
        } else {
            self.matched as f64 / self.expected as f64
        }
    }

    /// Whether the match reaches [`TEDS_MATCH_THRESHOLD`].
    pub fn passed(&self) -> bool {
        self.ratio() >= TEDS_MATCH_THRESHOLD
    }
}

/// Compare `actual` against `expected`, key by key with exact values.
pub fn reconcile(actual: &[TedsEntry], expected: &[TedsEntry]) -> TedsMatch {
    let mut mismatches = Vec::new();
    let mut matched = 0;
    for want in expected {
        match actual.iter().find(|e| e.key == want.key) {
            Some(found) if found.value == want.value => matched += 1,
            _ => mismatches.push(want.key.clone()),
        }
    }
    TedsMatch {
        matched,
        expected: expected.len(),
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(k: &str, v: &str) -> Vec<String> {
        vec![k.to_string(), v.to_string()]
    }

    #[test]
    fn trailing_blank_rows_are_stripped() {
        let mut rows = vec![row("Manufacturer", "Dytran Instruments"), row("", ""), row("Model number", "3055")];
        rows.resize(TEDS_BUFFER_ROWS, row("", ""));

        let entries = TedsEntry::from_rows(rows);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], TedsEntry::new("", ""));
        assert_eq!(entries[2].value, "3055");
    }

    #[test]
    fn all_blank_table_is_empty() {
        let rows = vec![row("", ""); TEDS_BUFFER_ROWS];
        assert!(TedsEntry::from_rows(rows).is_empty());
    }

    #[test]
    fn values_keep_trailing_spaces() {
        let entries = TedsEntry::from_rows(vec![row("Calibration initials", "ED ")]);
        assert_eq!(entries[0].value, "ED ");
    }

    #[test]
    fn outcome_serializes_flat() {
        let ok = ChannelTeds::entries(1, vec![TedsEntry::new("Model number", "3055")]);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["channel"], 1);
        assert_eq!(json["teds"][0]["key"], "Model number");

        let err = ChannelTeds::error(
            9,
            ErrorInfo {
                message: "Invalid input channel 8".into(),
                code: -2147352565,
                source: "VibrationVIEW".into(),
            },
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["channel"], 9);
        assert_eq!(json["error"]["code"], -2147352565);
        assert!(json.get("teds").is_none());
    }

    #[test]
    fn reconcile_threshold() {
        let expected: Vec<_> = (0..10)
            .map(|i| TedsEntry::new(format!("k{i}"), "v"))
            .collect();
        let mut actual = expected.clone();
        actual[3].value = "other".into();

        let m = reconcile(&actual, &expected);
        assert_eq!(m.matched, 9);
        assert_eq!(m.mismatches, vec!["k3".to_string()]);
        assert!(m.passed());

        actual[4].value = "other".into();
        assert!(!reconcile(&actual, &expected).passed());
    }
}
