//! Integration tests for connecting to and releasing VibrationVIEW sessions
//!
//! These run against the simulated instance and check the readiness handshake
//! timing and the per-thread transport bookkeeping.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serial_test::serial;
use vibrationview::mock::{MockConfig, MockConnector};
use vibrationview::{ConnectionSettings, RetryPolicy, Session, ThreadRegistry, VibrationView, VvError};

fn settings(attempts: u32, backoff_ms: u64) -> ConnectionSettings {
    ConnectionSettings {
        retry: RetryPolicy {
            attempts,
            initial_backoff: Duration::from_millis(backoff_ms),
        },
        ..ConnectionSettings::default()
    }
}

// =============================================================================
// Readiness handshake
// =============================================================================

#[test]
fn test_ready_on_third_attempt_waits_two_backoffs() {
    let connector = Arc::new(MockConnector::new(MockConfig {
        ready_after_checks: 3,
        ..MockConfig::default()
    }));
    let registry = Arc::new(ThreadRegistry::new());

    let start = Instant::now();
    let session = Session::connect_with_registry(connector.clone(), &settings(5, 50), registry);
    let elapsed = start.elapsed();

    println!("Connect took: {:?}", elapsed);

    assert!(session.is_alive());
    assert_eq!(connector.ready_checks(), 3);
    // 50ms + 100ms of backoff, allow scheduling slack
    assert!(
        elapsed.as_millis() >= 150 && elapsed.as_millis() <= 400,
        "Expected ~150ms, got {}ms",
        elapsed.as_millis()
    );
}

#[test]
fn test_never_ready_gives_up_after_budget() {
    let connector = Arc::new(MockConnector::new(MockConfig {
        ready_after_checks: u32::MAX,
        ..MockConfig::default()
    }));
    let registry = Arc::new(ThreadRegistry::new());

    let start = Instant::now();
    let session = Session::connect_with_registry(connector.clone(), &settings(3, 20), registry.clone());
    let elapsed = start.elapsed();

    assert!(!session.is_alive());
    assert_eq!(connector.ready_checks(), 3);
    assert!(elapsed >= Duration::from_millis(60), "got {:?}", elapsed);

    // The dead session still holds its transport reference until closed
    assert_eq!(registry.count(thread::current().id()), 1);
    drop(session);
    assert_eq!(registry.count(thread::current().id()), 0);
    assert_eq!(connector.transport_uninits(), 1);
}

#[test]
fn test_never_ready_sleeps_after_final_attempt() {
    let connector = Arc::new(MockConnector::new(MockConfig {
        ready_after_checks: u32::MAX,
        ..MockConfig::default()
    }));
    let policy = settings(5, 20).retry;
    assert_eq!(policy.total_backoff(), Duration::from_millis(620));

    let start = Instant::now();
    let session =
        Session::connect_with_registry(connector.clone(), &settings(5, 20), Arc::new(ThreadRegistry::new()));
    let elapsed = start.elapsed();

    println!("Give up took: {:?}", elapsed);

    assert!(!session.is_alive());
    assert_eq!(connector.ready_checks(), 5);
    // 20 + 40 + 80 + 160 + 320ms, the last one included
    assert!(
        elapsed.as_millis() >= 620 && elapsed.as_millis() <= 900,
        "Expected ~620ms, got {}ms",
        elapsed.as_millis()
    );
}

#[test]
fn test_failing_final_query_skips_last_backoff() {
    let connector = Arc::new(MockConnector::default());
    connector.fail_member("IsReady");

    let start = Instant::now();
    let session =
        Session::connect_with_registry(connector.clone(), &settings(3, 20), Arc::new(ThreadRegistry::new()));
    let elapsed = start.elapsed();

    assert!(!session.is_alive());
    // 20 + 40ms; the 80ms delay after the third query is never slept
    assert!(
        elapsed.as_millis() >= 60 && elapsed.as_millis() < 140,
        "Expected ~60ms, got {}ms",
        elapsed.as_millis()
    );
}

#[test]
fn test_unregistered_server_yields_dead_client() {
    let connector = Arc::new(MockConnector::default());
    connector.fail_dispatch(true);

    let session =
        Session::connect_with_registry(connector.clone(), &settings(2, 1), Arc::new(ThreadRegistry::new()));
    let vv = VibrationView::from_session(session);

    assert!(!vv.is_alive());
    assert!(matches!(vv.software_version(), Err(VvError::NotConnected)));
    assert!(matches!(vv.is_ready(), Err(VvError::NotConnected)));
}

// =============================================================================
// Release
// =============================================================================

#[test]
fn test_double_close_is_harmless() {
    let connector = Arc::new(MockConnector::default());
    let registry = Arc::new(ThreadRegistry::new());
    let mut vv = VibrationView::from_session(Session::connect_with_registry(
        connector.clone(),
        &settings(1, 1),
        registry.clone(),
    ));

    vv.close();
    vv.close();
    drop(vv);

    assert_eq!(connector.transport_inits(), 1);
    assert_eq!(connector.transport_uninits(), 1);
    assert_eq!(registry.count(thread::current().id()), 0);
}

#[test]
fn test_sessions_on_one_thread_share_transport() {
    let connector = Arc::new(MockConnector::default());
    let registry = Arc::new(ThreadRegistry::new());

    let mut first = Session::connect_with_registry(connector.clone(), &settings(1, 1), registry.clone());
    let second = Session::connect_with_registry(connector.clone(), &settings(1, 1), registry.clone());
    assert_eq!(connector.transport_inits(), 1);
    assert_eq!(registry.count(thread::current().id()), 2);

    first.close();
    assert_eq!(connector.transport_uninits(), 0);
    assert!(second.is_alive());

    drop(second);
    assert_eq!(connector.transport_uninits(), 1);
}

#[test]
fn test_sessions_on_different_threads_count_separately() {
    let connector = Arc::new(MockConnector::default());
    let registry = Arc::new(ThreadRegistry::new());

    let main_session = Session::connect_with_registry(connector.clone(), &settings(1, 1), registry.clone());

    let worker = {
        let connector = connector.clone();
        let registry = registry.clone();
        thread::spawn(move || {
            let session = Session::connect_with_registry(connector, &settings(1, 1), registry.clone());
            assert!(session.is_alive());
            assert_eq!(registry.count(thread::current().id()), 1);
        })
    };
    worker.join().unwrap();

    assert_eq!(connector.transport_inits(), 2);
    assert_eq!(connector.transport_uninits(), 1);
    assert_eq!(registry.count(main_session.owner()), 1);
}

#[test]
#[serial]
fn test_global_registry_connect_and_release() {
    let connector = Arc::new(MockConnector::default());
    let me = thread::current().id();
    let before = ThreadRegistry::global().count(me);

    let mut vv = VibrationView::connect(connector.clone(), &settings(1, 1));
    assert!(vv.is_alive());
    assert_eq!(ThreadRegistry::global().count(me), before + 1);

    vv.close();
    assert_eq!(ThreadRegistry::global().count(me), before);
}
