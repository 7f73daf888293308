//! PASS/FAIL/SKIP result log.
//!
//! Every check is printed to stdout and appended to a timestamped text file
//! (`vv_test_results_YYYYMMDD_HHMMSS.txt`). Failing to create or write the file
//! is reported once on stderr and otherwise ignored; the in-memory record is
//! always kept.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

/// One logged check. `None` marks an informational line or a skipped check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// What was checked
    pub message: String,
    /// Outcome
    pub success: Option<bool>,
}

/// Totals over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Number of logged lines
    pub total: usize,
    /// Passed checks
    pub passed: usize,
    /// Failed checks
    pub failed: usize,
    /// Informational or skipped lines
    pub skipped: usize,
}

impl Summary {
    /// Percentage of passed checks, excluding skipped ones. 0 when nothing was decided.
    pub fn success_rate(&self) -> f64 {
        let decided = self.passed + self.failed;
        if decided == 0 {
            0.0
        } else {
            self.passed as f64 / decided as f64 * 100.0
        }
    }
}

/// Accumulates check results and mirrors them to a file.
#[derive(Debug)]
pub struct ResultLog {
    results: Vec<CheckResult>,
    file: Option<PathBuf>,
    echo: bool,
}

impl ResultLog {
    /// Create a log in `output_dir`, named after `started`.
    ///
    /// The directory is created if needed; on failure the log runs without a file.
    pub fn create(output_dir: &Path, started: DateTime<Local>, profiles_dir: &Path) -> Self {
        let path = output_dir.join(file_name(started));
        let file = fs::create_dir_all(output_dir)
            .and_then(|_| File::create(&path))
            .and_then(|mut f| {
                writeln!(
                    f,
                    "VibrationVIEW Test Results - {}",
                    started.format("%Y-%m-%d %H:%M:%S")
                )?;
                writeln!(f, "{}\n", "-".repeat(80))?;
                writeln!(f, "Test folder: {}\n", profiles_dir.display())
            });
        let file = match file {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not create result log file");
                None
            }
        };
        Self {
            results: Vec::new(),
            file,
            echo: true,
        }
    }

    /// A log that keeps results in memory only.
    pub fn in_memory() -> Self {
        Self {
            results: Vec::new(),
            file: None,
            echo: false,
        }
    }

    /// Print lines to stdout as they are logged.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Path of the backing file, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Record a check.
    pub fn log(&mut self, message: impl Into<String>, success: Option<bool>) {
        let message = message.into();
        let line = format!("{} {}", status_prefix(success), message);
        if self.echo {
            println!("{line}");
        }
        self.append(&line);
        self.results.push(CheckResult { message, success });
    }

    /// Record a passed or failed check.
    pub fn check(&mut self, message: impl Into<String>, success: bool) {
        self.log(message, Some(success));
    }

    /// Record an informational or skipped line.
    pub fn note(&mut self, message: impl Into<String>) {
        self.log(message, None);
    }

    /// Everything logged so far.
    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    /// Totals over everything logged so far.
    pub fn summary(&self) -> Summary {
        let passed = self.results.iter().filter(|r| r.success == Some(true)).count();
        let failed = self.results.iter().filter(|r| r.success == Some(false)).count();
        Summary {
            total: self.results.len(),
            passed,
            failed,
            skipped: self.results.len() - passed - failed,
        }
    }

    /// Print the summary block and append it to the file.
    pub fn write_summary(&mut self) -> Summary {
        let summary = self.summary();
        let mut text = format!(
            "\nTest Summary:\n-------------\nTotal tests:  {}\nPassed:       {}\nFailed:       {}\nSkipped:      {}\nSuccess rate: {:.1}% (excluding skipped tests)\n\n",
            summary.total,
            summary.passed,
            summary.failed,
            summary.skipped,
            summary.success_rate()
        );
        if let Some(path) = &self.file {
            text.push_str(&format!("Results saved to: {}", path.display()));
        }
        if self.echo {
            println!("{text}");
        }
        self.append(&format!("\n{text}"));
        summary
    }

    fn append(&mut self, line: &str) {
        let Some(path) = &self.file else {
            return;
        };
        let written = OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "Could not write to result log file");
        }
    }
}

/// `[PASS]`, `[FAIL]` or nothing.
pub fn status_prefix(success: Option<bool>) -> &'static str {
    match success {
        Some(true) => "[PASS]",
        Some(false) => "[FAIL]",
        None => "",
    }
}

/// `vv_test_results_YYYYMMDD_HHMMSS.txt`
pub fn file_name(started: DateTime<Local>) -> String {
    format!("vv_test_results_{}.txt", started.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_format() {
        let t = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(file_name(t), "vv_test_results_20240305_140709.txt");
    }

    #[test]
    fn test_summary_excludes_skipped() {
        let mut log = ResultLog::in_memory();
        log.check("a", true);
        log.check("b", true);
        log.check("c", true);
        log.check("d", false);
        log.note("e");

        let s = log.summary();
        assert_eq!((s.total, s.passed, s.failed, s.skipped), (5, 3, 1, 1));
        assert!((s.success_rate() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary_rate_is_zero() {
        assert_eq!(ResultLog::in_memory().summary().success_rate(), 0.0);
    }

    #[test]
    fn test_file_receives_lines_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ResultLog::create(dir.path(), Local::now(), Path::new("Profiles")).with_echo(false);
        log.check("Connected to VibrationVIEW successfully", true);
        log.check("Window minimized", false);
        log.note("Test not running, skipping sweep commands");
        log.write_summary();

        let text = fs::read_to_string(log.file().unwrap()).unwrap();
        assert!(text.starts_with("VibrationVIEW Test Results - "));
        assert!(text.contains("Test folder: Profiles"));
        assert!(text.contains("[PASS] Connected to VibrationVIEW successfully"));
        assert!(text.contains("[FAIL] Window minimized"));
        assert!(text.contains("\n Test not running, skipping sweep commands"));
        assert!(text.contains("Success rate: 50.0% (excluding skipped tests)"));
    }

    #[test]
    fn test_unwritable_directory_keeps_memory_log() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();

        let mut log = ResultLog::create(&blocker, Local::now(), Path::new(".")).with_echo(false);
        assert!(log.file().is_none());
        log.check("still recorded", true);
        assert_eq!(log.results().len(), 1);
    }
}
