//! End-to-end harness that exercises a VibrationVIEW instance.
//!
//! The harness connects once, runs the selected suites in order against the same
//! client, logs every check through a [`ResultLog`] and ends with a summary. A
//! suite that returns an error is logged as failed and the run moves on to the
//! next one. If the connection fails nothing else runs.
//!
//! Against a live instance the suites pause between window and sweep commands so
//! the operator can follow along; [`HarnessOptions::pause`] sets the unit.

pub mod fixtures;
pub mod profiles;
pub mod reconcile;
pub mod results;
pub mod suites;

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info};

use crate::client::VibrationView;
use crate::config::{Config, PathsConfig};
use crate::endpoint::Connector;
use crate::error::{ErrorInfo, VvError};
use crate::session::{ConnectionSettings, Session, ThreadRegistry};
use crate::wait::WaitSettings;

pub use results::{CheckResult, ResultLog, Summary};

/// What the suites need besides the client.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Profiles, output and input configuration folders
    pub paths: PathsConfig,
    /// Status flag polling
    pub wait: WaitSettings,
    /// Connection handshake
    pub connection: ConnectionSettings,
    /// One pause unit between operator-visible commands
    pub pause: Duration,
}

impl HarnessOptions {
    /// Options from a loaded configuration, with one-second pauses.
    pub fn from_config(config: &Config) -> Self {
        Self {
            paths: config.paths.clone(),
            wait: config.wait_settings(),
            connection: config.connection_settings(),
            pause: Duration::from_secs(1),
        }
    }

    /// Override the pause unit. Zero disables pauses.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Per-suite view of the log and options.
pub struct SuiteContext<'a> {
    /// Result log of the run
    pub log: &'a mut ResultLog,
    /// Harness options
    pub options: &'a HarnessOptions,
}

impl SuiteContext<'_> {
    /// Record a passed or failed check.
    pub fn check(&mut self, message: impl Into<String>, success: bool) {
        self.log.check(message, success);
    }

    /// Record an informational line.
    pub fn note(&mut self, message: impl Into<String>) {
        self.log.note(message);
    }

    /// Sleep `units` pause units.
    pub fn pause(&self, units: u32) {
        let pause = self.options.pause * units;
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
}

/// A named group of checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    /// Connect and confirm readiness. Always runs first.
    Connection,
    /// Hardware description
    BasicProperties,
    /// Window commands
    WindowControl,
    /// Open, run and save a profile
    FileOperations,
    /// Per-channel configuration
    ChannelInfo,
    /// Vectors and live readings
    DataAcquisition,
    /// Status flags and start/stop
    TestControl,
    /// Sine parameters and sweep commands
    SineSpecific,
    /// Load an input configuration and reconcile it
    InputConfigurationFile,
    /// Data recorder
    Recording,
}

impl Suite {
    /// Every suite in run order.
    pub const ALL: [Suite; 10] = [
        Suite::Connection,
        Suite::BasicProperties,
        Suite::WindowControl,
        Suite::FileOperations,
        Suite::ChannelInfo,
        Suite::DataAcquisition,
        Suite::TestControl,
        Suite::SineSpecific,
        Suite::InputConfigurationFile,
        Suite::Recording,
    ];

    /// Identifier used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Suite::Connection => "connection",
            Suite::BasicProperties => "basic_properties",
            Suite::WindowControl => "window_control",
            Suite::FileOperations => "file_operations",
            Suite::ChannelInfo => "channel_info",
            Suite::DataAcquisition => "data_acquisition",
            Suite::TestControl => "test_control",
            Suite::SineSpecific => "sine_specific",
            Suite::InputConfigurationFile => "input_configuration_file",
            Suite::Recording => "recording",
        }
    }

    /// Heading printed before the suite runs.
    pub fn title(self) -> &'static str {
        match self {
            Suite::Connection => "Connection",
            Suite::BasicProperties => "Basic Properties",
            Suite::WindowControl => "Window Control",
            Suite::FileOperations => "File Operations",
            Suite::ChannelInfo => "Channel Information",
            Suite::DataAcquisition => "Data Acquisition",
            Suite::TestControl => "Test Control",
            Suite::SineSpecific => "Sine-Specific Functions",
            Suite::InputConfigurationFile => "Input Configuration File",
            Suite::Recording => "Recording",
        }
    }

    /// Parse a command-line identifier. Dashes and underscores are interchangeable.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().replace('-', "_").to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.name() == wanted)
    }

    fn run(self, vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> anyhow::Result<()> {
        match self {
            Suite::Connection => Ok(()),
            Suite::BasicProperties => suites::basic_properties(vv, ctx),
            Suite::WindowControl => suites::window_control(vv, ctx),
            Suite::FileOperations => suites::file_operations(vv, ctx),
            Suite::ChannelInfo => suites::channel_info(vv, ctx),
            Suite::DataAcquisition => suites::data_acquisition(vv, ctx),
            Suite::TestControl => suites::test_control(vv, ctx),
            Suite::SineSpecific => suites::sine_specific(vv, ctx),
            Suite::InputConfigurationFile => suites::input_configuration_file(vv, ctx),
            Suite::Recording => suites::recording(vv, ctx),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error details for a failed suite.
pub fn describe_error(err: &anyhow::Error) -> ErrorInfo {
    match err.downcast_ref::<VvError>() {
        Some(vv) => ErrorInfo::from(vv),
        None => ErrorInfo::extract(&**err),
    }
}

/// Runs suites against one connection.
pub struct Harness {
    connector: Arc<dyn Connector>,
    registry: Arc<ThreadRegistry>,
    options: HarnessOptions,
    log: ResultLog,
}

impl Harness {
    /// Harness using the process-wide thread registry.
    pub fn new(connector: Arc<dyn Connector>, options: HarnessOptions, log: ResultLog) -> Self {
        Self {
            connector,
            registry: ThreadRegistry::global(),
            options,
            log,
        }
    }

    /// Use `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<ThreadRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// The result log.
    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    /// Connect, run `selected` in [`Suite::ALL`] order, disconnect and summarize.
    ///
    /// An empty selection runs every suite.
    pub fn run(&mut self, selected: &[Suite]) -> Summary {
        info!(suites = selected.len(), "Starting VibrationVIEW tests");

        let session = Session::connect_with_registry(
            Arc::clone(&self.connector),
            &self.options.connection,
            Arc::clone(&self.registry),
        );
        let mut vv = VibrationView::from_session(session);
        if !vv.is_alive() {
            error!("Connection to VibrationVIEW failed, skipping remaining suites");
            self.log.check("Connection to VibrationVIEW failed", false);
            return self.log.write_summary();
        }
        self.log.check("Connected to VibrationVIEW successfully", true);

        let plan = Suite::ALL
            .into_iter()
            .filter(|s| *s != Suite::Connection)
            .filter(|s| selected.is_empty() || selected.contains(s));

        for suite in plan {
            info!(suite = suite.name(), "Testing: {}", suite.title());
            let mut ctx = SuiteContext {
                log: &mut self.log,
                options: &self.options,
            };
            match suite.run(&vv, &mut ctx) {
                Ok(()) => self
                    .log
                    .check(format!("{} - Completed successfully", suite.title()), true),
                Err(e) => {
                    let info = describe_error(&e);
                    error!(suite = suite.name(), error = %info, "Suite failed");
                    self.log.check(
                        format!("{} - Failed with error: {info}", suite.title()),
                        false,
                    );
                }
            }
        }

        vv.close();
        self.log.write_summary()
    }
}
