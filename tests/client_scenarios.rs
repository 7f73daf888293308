//! Integration tests for the typed client against the simulated instance
//!
//! Covers the documented behaviors operators rely on: profile scenarios,
//! vector shapes before and after a run, TEDS on every channel and the
//! configuration getters.

use std::sync::Arc;
use std::time::Duration;

use vibrationview::mock::{MockChannel, MockConfig, MockConnector};
use vibrationview::{
    ConnectionSettings, ErrorInfo, RetryPolicy, Session, TedsOutcome, TestType, ThreadRegistry,
    VectorId, VibrationView, VvError, WaitSettings,
};

fn connect(connector: &Arc<MockConnector>) -> VibrationView {
    let settings = ConnectionSettings {
        retry: RetryPolicy {
            attempts: 1,
            initial_backoff: Duration::from_millis(1),
        },
        ..ConnectionSettings::default()
    };
    VibrationView::from_session(Session::connect_with_registry(
        connector.clone(),
        &settings,
        Arc::new(ThreadRegistry::new()),
    ))
}

fn fast_wait() -> WaitSettings {
    WaitSettings {
        timeout: Duration::from_secs(1),
        interval: Duration::from_millis(1),
    }
}

// =============================================================================
// Sine profile scenario
// =============================================================================

#[test]
fn test_sine_profile_scenario() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);

    vv.open_test(r"C:\VibrationVIEW\Profiles\Sine.vsp").unwrap();
    assert_eq!(vv.test_type().unwrap(), TestType::Sine);

    let frequency = vv.sine_frequency().unwrap();
    assert!(frequency > 0.0, "frequency {frequency}");

    let multiplier = vv.sweep_multiplier().unwrap();
    vv.set_sweep_multiplier(multiplier * 0.5).unwrap();
    assert_eq!(vv.sweep_multiplier().unwrap(), multiplier * 0.5);
}

#[test]
fn test_run_and_stop_cycle() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);
    let wait = fast_wait();

    vv.run_test("Sine.vsp").unwrap();
    assert!(wait.until_true(|| vv.is_running().unwrap_or(false)));
    vv.sweep_hold().unwrap();
    assert!(vv.is_hold_level().unwrap());

    vv.stop_test().unwrap();
    assert!(!wait.until_false(|| vv.is_running().unwrap_or(false)));
    assert!(vv.can_resume_test().unwrap());
    assert_eq!(vv.status().unwrap().stop_code, 1);
}

#[test]
fn test_sweep_requires_running_sine() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);

    vv.open_test("Random.vrp").unwrap();
    let err = vv.sweep_up().unwrap_err();
    match err {
        VvError::Remote { member, .. } => assert_eq!(member, "SweepUp"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_abort_is_reported() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);

    vv.run_test("Random.vrp").unwrap();
    connector.abort_test(42, 3);

    assert!(vv.is_aborted().unwrap());
    let status = vv.status().unwrap();
    assert_eq!((status.stop_code, status.stop_code_index), (42, 3));
}

// =============================================================================
// Vectors
// =============================================================================

#[test]
fn test_vector_before_any_run_is_empty() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);
    let inputs = vv.hardware_input_channels().unwrap();

    let matrix = vv.vector(VectorId::FREQUENCY_AXIS, inputs + 1).unwrap();
    assert!(matrix.is_empty());
    assert_eq!(vv.vector_length(VectorId::FREQUENCY_AXIS).unwrap(), 0);
}

#[test]
fn test_vector_after_run_has_axis_and_channels() {
    let connector = Arc::new(MockConnector::new(MockConfig {
        vector_rows: 64,
        ..MockConfig::default()
    }));
    let vv = connect(&connector);
    let inputs = vv.hardware_input_channels().unwrap();

    vv.run_test("Sine.vsp").unwrap();
    let matrix = vv.vector(VectorId::FREQUENCY_AXIS, inputs + 1).unwrap();

    assert_eq!(matrix.len(), 64);
    assert!(matrix.iter().all(|row| row.len() == inputs + 1));
    assert_eq!(matrix[3][0], 30.0);
    assert_eq!(vv.vector_unit(VectorId::FREQUENCY_AXIS).unwrap(), "Hz");
    assert_eq!(vv.vector_label(VectorId::FREQUENCY_AXIS.column(1)).unwrap(), "Acceleration");
}

// =============================================================================
// Channel configuration and TEDS
// =============================================================================

#[test]
fn test_every_channel_getter_answers() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);

    for ch in 0..vv.hardware_input_channels().unwrap() {
        assert!(!vv.channel_label(ch).unwrap().is_empty());
        assert_eq!(vv.channel_unit(ch).unwrap(), "g");
        assert_eq!(vv.input_sensitivity(ch).unwrap(), 10.0);
        assert_eq!(vv.input_engineering_scale(ch).unwrap(), 1.0);
        assert!(!vv.input_capacitor_coupled(ch).unwrap());
        assert!(!vv.input_accel_power_source(ch).unwrap());
        assert!(!vv.input_differential(ch).unwrap());
        assert!(vv.hardware_supports_differential(ch).unwrap());
    }

    // Out of range surfaces a normalized remote error
    let err = vv.channel_label(99).unwrap_err();
    let info = ErrorInfo::from(&err);
    assert_ne!(info.code, 0);
    assert_eq!(info.source, "VibrationVIEW");
}

#[test]
fn test_teds_only_on_primary_channel() {
    let connector = Arc::new(MockConnector::default());
    connector.set_channel(
        0,
        MockChannel {
            teds: vec![
                ("Manufacturer".into(), "Dytran Instruments".into()),
                ("Model number".into(), "3055".into()),
            ],
            ..MockChannel::default()
        },
    );
    let vv = connect(&connector);

    let sheets = vv.teds(None).unwrap();
    assert_eq!(sheets.len(), 16);
    assert_eq!(sheets[0].channel, 1);
    assert_eq!(sheets[0].teds().unwrap().len(), 2);
    for sheet in &sheets[1..] {
        assert_eq!(sheet.outcome, TedsOutcome::Teds(Vec::new()), "channel {}", sheet.channel);
    }
}

#[test]
fn test_teds_serializes_like_the_host_report() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);
    connector.fail_member("Teds");

    let sheets = vv.teds(Some(&[2])).unwrap();
    let json = serde_json::to_value(&sheets).unwrap();

    assert_eq!(json[0]["channel"], 3);
    assert!(json[0]["error"]["message"].is_string());
    assert!(json[0].get("teds").is_none());
}

#[test]
fn test_setters_round_trip_on_channel() {
    let connector = Arc::new(MockConnector::default());
    let vv = connect(&connector);

    vv.set_input_accel_power_source(1, true).unwrap();
    assert!(vv.input_accel_power_source(1).unwrap());
    assert!(connector.channel(1).unwrap().accel_power_source);
}
