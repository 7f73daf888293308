//! End-to-end harness runs against the simulated reference bench

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use vibrationview::harness::fixtures::{self, TEDS_CONFIG_FILE};
use vibrationview::harness::{Harness, HarnessOptions, ResultLog, Suite};
use vibrationview::{Config, ThreadRegistry, WaitSettings};

fn options(config: &Config, paths: vibrationview::config::PathsConfig) -> HarnessOptions {
    let mut options = HarnessOptions::from_config(config).with_pause(Duration::ZERO);
    options.paths = paths;
    options.wait = WaitSettings {
        timeout: Duration::from_secs(2),
        interval: Duration::from_millis(1),
    };
    options.connection.retry.initial_backoff = Duration::from_millis(1);
    options
}

// =============================================================================
// Full run
// =============================================================================

#[test]
fn test_full_run_passes_on_reference_bench() {
    let dir = tempfile::tempdir().unwrap();
    let paths = fixtures::materialize(dir.path()).unwrap();
    let connector = fixtures::mock_bench(&paths);

    let log = ResultLog::create(&paths.output_dir, Local::now(), &paths.profiles_dir).with_echo(false);
    let mut harness = Harness::new(Arc::new(connector.clone()), options(&Config::default(), paths.clone()), log)
        .with_registry(Arc::new(ThreadRegistry::new()));
    let summary = harness.run(&[]);

    let failed: Vec<_> = harness
        .log()
        .results()
        .iter()
        .filter(|r| r.success == Some(false))
        .map(|r| r.message.clone())
        .collect();
    assert!(failed.is_empty(), "failed checks: {failed:#?}");
    assert!(summary.passed > 100, "only {} passed", summary.passed);
    assert_eq!(summary.success_rate(), 100.0);

    // Every suite reported completion
    for suite in Suite::ALL.iter().filter(|s| **s != Suite::Connection) {
        let done = format!("{} - Completed successfully", suite.title());
        assert!(
            harness.log().results().iter().any(|r| r.message == done),
            "missing: {done}"
        );
    }

    // Side effects on the simulated instance
    assert_eq!(connector.saved_data().len(), 1);
    assert!(connector.saved_data()[0].ends_with("Sine.vsd"));
    assert_eq!(connector.channel(0).unwrap().sensitivity, 10.0, "default config restored");
    assert_eq!(connector.transport_uninits(), 1);

    // Result file mirrors the log
    let file = harness.log().file().unwrap().to_path_buf();
    let name = file.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("vv_test_results_") && name.ends_with(".txt"));
    let text = fs::read_to_string(&file).unwrap();
    assert!(text.contains("[PASS] Connected to VibrationVIEW successfully"));
    assert!(text.contains("TEDS Validation: 21/21 matches (100.0%)"));
    assert!(text.contains("No TEDS data (as expected for non-TEDS channel)"));
    assert!(text.contains("Success rate: 100.0% (excluding skipped tests)"));
}

#[test]
fn test_missing_input_configuration_fails_suite_checks() {
    let dir = tempfile::tempdir().unwrap();
    let paths = fixtures::materialize(dir.path()).unwrap();
    let connector = fixtures::mock_bench(&paths);
    fs::remove_file(paths.input_config_dir.join(TEDS_CONFIG_FILE)).unwrap();

    let mut harness = Harness::new(
        Arc::new(connector),
        options(&Config::default(), paths),
        ResultLog::in_memory(),
    )
    .with_registry(Arc::new(ThreadRegistry::new()));
    let summary = harness.run(&[Suite::InputConfigurationFile]);

    assert_eq!(summary.failed, 1);
    assert!(harness
        .log()
        .results()
        .iter()
        .any(|r| r.success == Some(false) && r.message.starts_with("Configuration file not found")));
}

#[test]
fn test_wrong_teds_sheet_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let paths = fixtures::materialize(dir.path()).unwrap();
    let connector = fixtures::mock_bench(&paths);

    // Register a configuration whose channel 1 sensor reports a different sheet
    let mut channels: Vec<_> = (0..fixtures::CHECKED_CHANNELS)
        .map(|i| fixtures::expected_channel(i).to_mock(Vec::new()))
        .collect();
    channels[0].teds = vec![("Manufacturer".into(), "PCB Piezotronics".into())];
    connector.add_input_configuration(
        fixtures::input_config_path(&paths, TEDS_CONFIG_FILE).to_string_lossy(),
        channels,
    );

    let mut harness = Harness::new(
        Arc::new(connector),
        options(&Config::default(), paths),
        ResultLog::in_memory(),
    )
    .with_registry(Arc::new(ThreadRegistry::new()));
    let summary = harness.run(&[Suite::InputConfigurationFile]);

    assert!(summary.failed > 0);
    assert!(harness
        .log()
        .results()
        .iter()
        .any(|r| r.success == Some(false) && r.message.contains("TEDS Validation: 0/21")));
}
