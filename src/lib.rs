//! # VibrationVIEW automation client
//!
//! This crate drives a running VibrationVIEW vibration-test controller through its
//! automation server and ships an end-to-end harness that exercises that
//! surface against a live instance or a simulated one.
//!
//! ## Crate Structure
//!
//! - **`endpoint`**: The `Connector` and `Endpoint` seams over the late-bound
//!   automation transport, and the dynamic `Value` passed across them.
//! - **`session`**: Connecting, the readiness handshake, per-thread transport
//!   reference counting, and release.
//! - **`client`**: `VibrationView`, one typed method per remote operation.
//! - **`enums`**: Test types and vector identifiers.
//! - **`teds`**: TEDS sheets, per-channel outcomes and reconciliation.
//! - **`wait`**: Polling helpers for status flags.
//! - **`error`**: `VvError`, the remote error record and `ErrorInfo`.
//! - **`config`**: Layered TOML + environment configuration.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`mock`**: An in-process simulation of the automation server.
//! - **`com`**: The real IDispatch transport (Windows, `com` feature).
//! - **`harness`**: Suites, result log and reference-bench fixtures.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use vibrationview::mock::{MockConfig, MockConnector};
//! use vibrationview::{ConnectionSettings, VibrationView};
//!
//! let vv = VibrationView::connect(
//!     Arc::new(MockConnector::new(MockConfig::default())),
//!     &ConnectionSettings::default(),
//! );
//! assert!(vv.is_alive());
//! assert_eq!(vv.hardware_input_channels().unwrap(), 16);
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod enums;
pub mod error;
pub mod harness;
pub mod logging;
pub mod mock;
pub mod session;
pub mod teds;
pub mod wait;

#[cfg(all(windows, feature = "com"))]
pub mod com;

pub use client::{Status, VibrationView, REAR_INPUT_CHANNELS};
pub use config::Config;
pub use endpoint::{Connector, Endpoint, Value};
pub use enums::{TestType, VectorId, VectorKind};
pub use error::{ErrorInfo, RemoteError, Result, VvError};
pub use session::{ConnectionSettings, RetryPolicy, Session, ThreadRegistry};
pub use teds::{ChannelTeds, TedsEntry, TedsOutcome};
pub use wait::{wait_until_false, wait_until_true, WaitSettings};
