//! Connection management for the VibrationVIEW automation server.
//!
//! Handles per-thread transport initialization, obtaining a handle on the
//! application, waiting for it to become ready, and releasing it again.
//!
//! ## Transport reference counting
//!
//! The automation transport has per-thread global state: it must be initialized
//! once on a thread before any handle is created there, and uninitialized when the
//! last user on that thread is gone. [`ThreadRegistry`] keeps an explicit count per
//! `ThreadId`:
//! - When a thread's count goes 0 → 1: `Connector::initialize_thread()`
//! - When it goes 1 → 0: `Connector::uninitialize_thread()`
//!
//! Constructing several sessions on one thread therefore initializes the
//! transport once, and only the last session to close tears it down.
//!
//! ## Thread affinity
//!
//! A [`Session`] is bound to the thread that created it. The boxed endpoint it
//! holds carries no `Send` bound, so moving a session to another thread does not
//! compile. Sharing one session between threads by other means is unsupported.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::endpoint::{Connector, Endpoint};
use crate::error::{ErrorInfo, RemoteResult, Result, VvError};

/// ProgID the host application registers its automation server under.
pub const DEFAULT_PROG_ID: &str = "VibrationVIEW.TestControl";

/// Property polled to decide whether a freshly dispatched handle is usable.
const READY_MEMBER: &str = "IsReady";

/// Process-wide registry used by [`Session::connect`].
static GLOBAL_REGISTRY: Lazy<Arc<ThreadRegistry>> = Lazy::new(|| Arc::new(ThreadRegistry::new()));

/// Bounded exponential backoff for the initial readiness handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of readiness checks
    pub attempts: u32,
    /// Sleep before the second check; doubled before each later one
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Sleep schedule, one entry per attempt.
    ///
    /// A not-ready answer is followed by its delay even on the last attempt, so
    /// the default policy waits 0.5 + 1 + 2 + 4 + 8 = 15.5 s before giving up.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let initial = self.initial_backoff;
        (0..self.attempts).map(move |i| initial.saturating_mul(1u32 << i.min(31)))
    }

    /// Time spent sleeping before giving up on a handle that never becomes ready.
    pub fn total_backoff(&self) -> Duration {
        self.delays().sum()
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// ProgID of the automation server
    pub prog_id: String,
    /// Readiness handshake policy
    pub retry: RetryPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            prog_id: DEFAULT_PROG_ID.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Reference counts of transport users, keyed by thread.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    counts: Mutex<HashMap<ThreadId, usize>>,
}

impl ThreadRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<ThreadRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register one transport user on the calling thread.
    ///
    /// Initializes the transport if this is the thread's first user. On
    /// initialization failure nothing is recorded.
    pub fn acquire(&self, connector: &dyn Connector) -> RemoteResult<()> {
        let thread = thread::current().id();
        let mut counts = self.counts.lock();
        let count = counts.get(&thread).copied().unwrap_or(0);

        if count == 0 {
            connector.initialize_thread()?;
            debug!(?thread, "Automation transport initialized (ref count: 1)");
        } else {
            debug!(
                ?thread,
                "Automation transport already initialized (ref count: {})",
                count + 1
            );
        }

        counts.insert(thread, count + 1);
        Ok(())
    }

    /// Drop one transport user on the calling thread.
    ///
    /// Uninitializes the transport when the thread's last user is gone.
    pub fn release(&self, connector: &dyn Connector) {
        let thread = thread::current().id();
        let mut counts = self.counts.lock();

        match counts.get(&thread).copied() {
            Some(1) => {
                counts.remove(&thread);
                connector.uninitialize_thread();
                debug!(?thread, "Automation transport uninitialized (last user released)");
            }
            Some(n) if n > 1 => {
                counts.insert(thread, n - 1);
                debug!(?thread, "Automation transport still in use (ref count: {})", n - 1);
            }
            _ => {
                error!(?thread, "Automation transport released on a thread that holds no reference");
                counts.remove(&thread);
            }
        }
    }

    /// Current count for `thread`.
    pub fn count(&self, thread: ThreadId) -> usize {
        self.counts.lock().get(&thread).copied().unwrap_or(0)
    }
}

/// A connection to one VibrationVIEW instance.
pub struct Session {
    endpoint: Option<Box<dyn Endpoint>>,
    connector: Arc<dyn Connector>,
    registry: Arc<ThreadRegistry>,
    holds_transport: bool,
    owner: ThreadId,
}

impl Session {
    /// Connect using the process-wide thread registry.
    ///
    /// Never fails: if the application cannot be reached or never becomes ready
    /// within the retry budget, the returned session is dead
    /// (`is_alive() == false`) and every call made through it fails with
    /// [`VvError::NotConnected`].
    pub fn connect(connector: Arc<dyn Connector>, settings: &ConnectionSettings) -> Self {
        Self::connect_with_registry(connector, settings, ThreadRegistry::global())
    }

    /// Connect using an explicit thread registry.
    pub fn connect_with_registry(
        connector: Arc<dyn Connector>,
        settings: &ConnectionSettings,
        registry: Arc<ThreadRegistry>,
    ) -> Self {
        let mut session = Self {
            endpoint: None,
            connector,
            registry,
            holds_transport: false,
            owner: thread::current().id(),
        };

        if let Err(e) = session.registry.acquire(session.connector.as_ref()) {
            error!(error = %ErrorInfo::from(&e), "Failed to initialize automation transport");
            return session;
        }
        session.holds_transport = true;

        let endpoint = match session.connector.dispatch(&settings.prog_id) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!(
                    prog_id = %settings.prog_id,
                    error = %ErrorInfo::from(&e),
                    "Failed to connect to VibrationVIEW"
                );
                return session;
            }
        };
        info!(prog_id = %settings.prog_id, "VibrationVIEW object created");

        let attempts = settings.retry.attempts.max(1);
        let mut delays = settings.retry.delays();
        for attempt in 1..=attempts {
            match query_ready(endpoint.as_ref()) {
                Ok(true) => {
                    info!(attempt, "VibrationVIEW is ready");
                    session.endpoint = Some(endpoint);
                    return session;
                }
                Ok(false) => debug!(attempt, "VibrationVIEW not ready yet"),
                Err(e) => {
                    warn!(
                        attempt,
                        error = %ErrorInfo::from(&e),
                        "Attempt to connect to VibrationVIEW failed"
                    );
                    // A query that raised on the last attempt ends the handshake at once
                    if attempt == attempts {
                        break;
                    }
                }
            }

            if let Some(delay) = delays.next() {
                debug!(?delay, "Waiting before next attempt");
                thread::sleep(delay);
            }
        }

        error!(attempts, "Failed to connect to VibrationVIEW after multiple attempts");
        session
    }

    /// Whether the session holds a handle.
    pub fn is_alive(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Live readiness query. Not cached.
    pub fn is_ready(&self) -> Result<bool> {
        query_ready(self.endpoint()?)
    }

    /// The handle, or [`VvError::NotConnected`].
    pub fn endpoint(&self) -> Result<&dyn Endpoint> {
        self.endpoint.as_deref().ok_or(VvError::NotConnected)
    }

    /// Thread that created this session.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Release the handle and this session's transport reference.
    ///
    /// Idempotent: closing a closed or never-connected session does nothing.
    pub fn close(&mut self) {
        if self.endpoint.take().is_some() {
            info!("VibrationVIEW handle released");
        }
        if self.holds_transport {
            self.holds_transport = false;
            self.registry.release(self.connector.as_ref());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("alive", &self.is_alive())
            .field("holds_transport", &self.holds_transport)
            .field("owner", &self.owner)
            .finish()
    }
}

fn query_ready(endpoint: &dyn Endpoint) -> Result<bool> {
    endpoint
        .get(READY_MEMBER, &[])
        .map_err(|e| VvError::remote(READY_MEMBER, e))?
        .into_bool(READY_MEMBER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConfig, MockConnector};

    fn fast_settings(attempts: u32) -> ConnectionSettings {
        ConnectionSettings {
            prog_id: DEFAULT_PROG_ID.to_string(),
            retry: RetryPolicy {
                attempts,
                initial_backoff: Duration::from_millis(1),
            },
        }
    }

    #[test]
    fn default_schedule_doubles_from_half_second() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
            ]
        );
        assert_eq!(RetryPolicy::default().total_backoff(), Duration::from_millis(15500));
    }

    #[test]
    fn one_delay_per_attempt() {
        let policy = RetryPolicy {
            attempts: 1,
            initial_backoff: Duration::from_secs(10),
        };
        assert_eq!(policy.delays().collect::<Vec<_>>(), vec![Duration::from_secs(10)]);

        let none = RetryPolicy {
            attempts: 0,
            ..policy
        };
        assert_eq!(none.delays().count(), 0);
    }

    #[test]
    fn registry_initializes_once_per_thread() {
        let connector = MockConnector::new(MockConfig::default());
        let registry = ThreadRegistry::new();
        let me = thread::current().id();

        registry.acquire(&connector).unwrap();
        registry.acquire(&connector).unwrap();
        assert_eq!(registry.count(me), 2);
        assert_eq!(connector.transport_inits(), 1);

        registry.release(&connector);
        assert_eq!(connector.transport_uninits(), 0);
        registry.release(&connector);
        assert_eq!(connector.transport_uninits(), 1);
        assert_eq!(registry.count(me), 0);
    }

    #[test]
    fn registry_counts_threads_separately() {
        let connector = Arc::new(MockConnector::new(MockConfig::default()));
        let registry = Arc::new(ThreadRegistry::new());

        registry.acquire(connector.as_ref()).unwrap();

        let (c, r) = (Arc::clone(&connector), Arc::clone(&registry));
        thread::spawn(move || {
            r.acquire(c.as_ref()).unwrap();
            r.release(c.as_ref());
        })
        .join()
        .unwrap();

        assert_eq!(connector.transport_inits(), 2);
        assert_eq!(connector.transport_uninits(), 1);
        assert_eq!(registry.count(thread::current().id()), 1);
    }

    #[test]
    fn failed_transport_init_is_not_recorded() {
        let connector = MockConnector::new(MockConfig::default());
        connector.fail_transport_init(true);
        let registry = ThreadRegistry::new();

        assert!(registry.acquire(&connector).is_err());
        assert_eq!(registry.count(thread::current().id()), 0);
    }

    #[test]
    fn connect_succeeds_when_ready() {
        let connector = Arc::new(MockConnector::new(MockConfig::default()));
        let session =
            Session::connect_with_registry(connector, &fast_settings(5), Arc::new(ThreadRegistry::new()));
        assert!(session.is_alive());
        assert!(session.is_ready().unwrap());
    }

    #[test]
    fn exhausted_retries_leave_dead_session() {
        let connector = Arc::new(MockConnector::new(MockConfig {
            ready_after_checks: 10,
            ..MockConfig::default()
        }));
        let session = Session::connect_with_registry(
            connector.clone(),
            &fast_settings(3),
            Arc::new(ThreadRegistry::new()),
        );
        assert!(!session.is_alive());
        assert!(matches!(session.endpoint(), Err(VvError::NotConnected)));
        assert_eq!(connector.ready_checks(), 3);
    }

    #[test]
    fn dispatch_failure_leaves_dead_session() {
        let connector = Arc::new(MockConnector::new(MockConfig::default()));
        connector.fail_dispatch(true);
        let session = Session::connect_with_registry(
            connector,
            &fast_settings(5),
            Arc::new(ThreadRegistry::new()),
        );
        assert!(!session.is_alive());
    }

    #[test]
    fn close_twice_is_noop() {
        let connector = Arc::new(MockConnector::new(MockConfig::default()));
        let registry = Arc::new(ThreadRegistry::new());
        let mut session =
            Session::connect_with_registry(connector.clone(), &fast_settings(5), registry.clone());

        session.close();
        session.close();
        assert!(!session.is_alive());
        assert_eq!(connector.transport_uninits(), 1);
        assert_eq!(registry.count(thread::current().id()), 0);

        drop(session);
        assert_eq!(connector.transport_uninits(), 1);
    }

    #[test]
    fn second_session_on_thread_shares_transport() {
        let connector = Arc::new(MockConnector::new(MockConfig::default()));
        let registry = Arc::new(ThreadRegistry::new());

        let first = Session::connect_with_registry(connector.clone(), &fast_settings(5), registry.clone());
        let second = Session::connect_with_registry(connector.clone(), &fast_settings(5), registry.clone());
        assert_eq!(connector.transport_inits(), 1);

        drop(first);
        assert_eq!(connector.transport_uninits(), 0);
        drop(second);
        assert_eq!(connector.transport_uninits(), 1);
    }
}
