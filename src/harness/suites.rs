//! End-to-end check suites.
//!
//! Each suite logs individual checks and keeps going after a failed call; only
//! an error that makes the rest of the suite meaningless is returned.

use std::fs;

use anyhow::{Context as _, Result};

use crate::client::VibrationView;
use crate::enums::{TestType, VectorId, VectorKind};
use crate::error::{ErrorInfo, VvError};
use crate::teds::{reconcile, TedsOutcome, TEDS_MATCH_THRESHOLD};

use super::fixtures::{
    dytran_3055_teds, expected_channel, input_config_path, CHECKED_CHANNELS, DEFAULT_CONFIG_FILE,
    TEDS_CONFIG_FILE,
};
use super::profiles::{data_save_path, find_test_file};
use super::reconcile::{compare_channel, ObservedChannel};
use super::SuiteContext;

/// Input channel counts the hardware ships with.
const VALID_INPUT_COUNTS: [usize; 4] = [4, 8, 12, 16];
/// Demo mode serial number.
const DEMO_SERIAL: i32 = 0x00FF_FFFF;

fn err_text(e: &VvError) -> ErrorInfo {
    ErrorInfo::from(e)
}

/// Hardware description and readiness.
pub fn basic_properties(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    let inputs = vv.hardware_input_channels()?;
    ctx.check(
        format!("Hardware input channels: {inputs}"),
        VALID_INPUT_COUNTS.contains(&inputs),
    );

    let outputs = vv.hardware_output_channels()?;
    ctx.check(
        format!("Hardware output channels: {outputs}"),
        (1..=4).contains(&outputs),
    );

    let serial = vv.hardware_serial_number()?;
    ctx.check(format!("Hardware serial number: {serial:X}"), true);
    ctx.check(format!("Running demo mode: {serial:X}"), serial == DEMO_SERIAL);

    let version = vv.software_version()?;
    ctx.check(format!("Software version: {version}"), !version.is_empty());

    let ready = vv.is_ready()?;
    ctx.check(format!("VibrationVIEW ready: {ready}"), ready);
    Ok(())
}

/// Window commands.
pub fn window_control(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    vv.maximize()?;
    ctx.check("Window maximized", true);
    ctx.pause(1);

    vv.minimize()?;
    ctx.check("Window minimized", true);
    ctx.pause(1);

    vv.restore()?;
    ctx.check("Window restored", true);
    ctx.pause(1);

    vv.restore()?;
    ctx.check("Window restored Again", true);

    vv.activate()?;
    ctx.check("Window activated", true);
    ctx.pause(1);
    Ok(())
}

/// Open, run and save a sine profile.
pub fn file_operations(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    let test_file = find_test_file(&ctx.options.paths.profiles_dir, "sine");
    let shown = test_file.display().to_string();

    ctx.note(format!("Attempting to open test file: {shown}"));
    match vv.open_test(&shown) {
        Ok(_) => ctx.check(format!("Test file opened: {shown}"), true),
        Err(e) => ctx.check(format!("Opening test file failed: {}", err_text(&e)), false),
    }

    ctx.note(format!("Attempting to open and run test file: {shown}"));
    if let Err(e) = vv.run_test(&shown) {
        ctx.check(format!("Running test file failed: {}", err_text(&e)), false);
        return Ok(());
    }
    ctx.check(format!("Test file run: {shown}"), true);

    match vv.test_type() {
        Ok(t) => ctx.check(format!("Test type: {}", t.name()), true),
        Err(e) => ctx.check(format!("Getting test type failed: {}", err_text(&e)), false),
    }

    let data_dir = ctx.options.paths.output_dir.join("data");
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let save_path = data_save_path(&data_dir, &test_file);
    match vv.save_data(&save_path.display().to_string()) {
        Ok(_) => ctx.check(format!("Test data saved to: {}", save_path.display()), true),
        Err(e) => ctx.check(format!("Saving data failed: {}", err_text(&e)), false),
    }
    Ok(())
}

/// Every configuration getter on every input.
pub fn channel_info(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    let channels = vv.hardware_input_channels()?;
    ctx.check(format!("Number of hardware input channels: {channels}"), channels > 0);

    for index in 0..channels {
        let n = index + 1;
        ctx.check(format!("\n--- Testing Channel {n} ---"), true);

        match vv.channel_label(index) {
            Ok(label) => ctx.check(format!("Channel {n} label: {label}"), true),
            Err(e) => ctx.check(format!("Error getting channel label: {}", err_text(&e)), false),
        }
        match vv.channel_unit(index) {
            Ok(unit) => ctx.check(format!("Channel {n} unit: {unit}"), true),
            Err(e) => ctx.check(format!("Error getting channel unit: {}", err_text(&e)), false),
        }
        match vv.input_sensitivity(index) {
            Ok(s) => ctx.check(format!("Channel {n} sensitivity: {s}"), true),
            Err(e) => ctx.check(format!("Channel {n} sensitivity: {}", err_text(&e)), false),
        }

        for entry in vv.teds(Some(&[index]))? {
            match &entry.outcome {
                TedsOutcome::Teds(items) => {
                    ctx.check(format!("Channel {n} TEDS data retrieved"), true);
                    if !items.is_empty() {
                        let text = format!("{items:?}");
                        let shown: String = text.chars().take(200).collect();
                        let suffix = if text.chars().count() > 200 { "..." } else { "" };
                        ctx.check(format!("TEDS data: {shown}{suffix}"), true);
                    }
                }
                TedsOutcome::Error(info) => {
                    ctx.check(format!("Channel {n} TEDS data: {info}"), false);
                }
            }
        }

        let capabilities = (|| -> crate::error::Result<()> {
            let cap = vv.hardware_supports_capacitor_coupled(index)?;
            ctx.check(format!("Channel {n} supports capacitor coupled: {cap}"), true);
            let power = vv.hardware_supports_accel_power_source(index)?;
            ctx.check(format!("Channel {n} supports accel power source: {power}"), true);
            let diff = vv.hardware_supports_differential(index)?;
            ctx.check(format!("Channel {n} supports differential: {diff}"), true);
            Ok(())
        })();
        if let Err(e) = capabilities {
            ctx.check(format!("Error getting hardware capabilities: {}", err_text(&e)), false);
        }

        let details = (|| -> crate::error::Result<()> {
            let serial = vv.input_serial_number(index)?;
            ctx.check(format!("Channel {n} serial number: {serial}"), true);
            let date = vv.input_cal_date(index)?;
            ctx.check(format!("Channel {n} calibration date: {date}"), true);
            let cap = vv.input_capacitor_coupled(index)?;
            ctx.check(format!("Channel {n} capacitor coupled status: {cap}"), true);
            let power = vv.input_accel_power_source(index)?;
            ctx.check(format!("Channel {n} accel power source status: {power}"), true);
            let diff = vv.input_differential(index)?;
            ctx.check(format!("Channel {n} differential status: {diff}"), true);
            let scale = vv.input_engineering_scale(index)?;
            ctx.check(format!("Channel {n} engineering scale: {scale}"), true);
            Ok(())
        })();
        if let Err(e) = details {
            ctx.check(
                format!("Error getting additional channel information: {}", err_text(&e)),
                false,
            );
        }
    }
    Ok(())
}

/// Vectors and live readings while a sine test runs.
pub fn data_acquisition(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    let sine = find_test_file(&ctx.options.paths.profiles_dir, "sine");
    let started = vv
        .run_test(&sine.display().to_string())
        .and_then(|_| vv.test_type());
    match started {
        Ok(TestType::Sine) => {}
        Ok(_) => ctx.note("Could not run a sine test, vectors will have unexpected results"),
        Err(_) => {
            ctx.note("Could not run a sine test, vectors will have unexpected results");
            return Ok(());
        }
    }

    if ctx.options.wait.until_true(|| vv.is_running().unwrap_or(false)) {
        vv.sweep_hold()?;
        ctx.check("Sweep hold command sent", true);
    }

    for axis in [
        VectorId::WAVEFORM_AXIS,
        VectorId::FREQUENCY_AXIS,
        VectorId::TIME_HISTORY_AXIS,
    ] {
        if let Err(e) = check_vector(vv, ctx, axis) {
            ctx.check(format!("Error with {axis}: {}", err_text(&e)), false);
        }
    }

    let readings = (|| -> crate::error::Result<()> {
        let channel = vv.channel()?;
        ctx.check(format!("Channel data retrieved, length: {}", channel.len()), true);
        let demand = vv.demand()?;
        ctx.check(format!("Demand data retrieved, length: {}", demand.len()), true);
        let control = vv.control()?;
        ctx.check(format!("Control data retrieved, length: {}", control.len()), true);
        let output = vv.output()?;
        ctx.check(format!("Output data retrieved, length: {}", output.len()), true);
        match vv.rear_input() {
            Ok(rear) => ctx.check(format!("Rear input data retrieved, length: {}", rear.len()), true),
            Err(e) => ctx.check(format!("Rear input data retrieval failed: {}", err_text(&e)), false),
        }
        Ok(())
    })();
    if let Err(e) = readings {
        ctx.check(format!("Error in data acquisition tests: {}", err_text(&e)), false);
    }
    Ok(())
}

fn check_vector(vv: &VibrationView, ctx: &mut SuiteContext<'_>, axis: VectorId) -> crate::error::Result<()> {
    let length = vv.vector_length(axis)?;
    ctx.check(format!("{axis} length: {length}"), true);

    let inputs = vv.hardware_input_channels()?;
    let data = vv.vector(axis, inputs + 1)?;
    let columns = data.first().map_or(0, Vec::len);
    ctx.check(
        format!("{axis} data retrieved, length: {}, columns: {columns}", data.len()),
        true,
    );

    for (column, id) in column_ids(axis, columns) {
        let unit = vv.vector_unit(id)?;
        ctx.check(format!("{axis} Channel:{column} unit: {unit}"), true);
        let label = vv.vector_label(id)?;
        ctx.check(format!("{axis} Channel:{column} label: {label}"), true);
    }
    Ok(())
}

/// Column ids of a vector family, capped at the family's code block.
fn column_ids(axis: VectorId, columns: usize) -> impl Iterator<Item = (usize, VectorId)> {
    let block = usize::try_from(VectorKind::BLOCK).unwrap_or(0);
    (0..columns.min(block)).zip(0u16..).map(move |(column, offset)| (column, axis.column(offset)))
}

/// Status predicates and a start/stop cycle.
pub fn test_control(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    let status = (|| -> crate::error::Result<()> {
        let status = vv.status()?;
        ctx.check(
            format!(
                "Test status: stop code {}, index {}",
                status.stop_code, status.stop_code_index
            ),
            true,
        );
        ctx.check(format!("Test running: {}", vv.is_running()?), true);
        ctx.check(format!("Test starting: {}", vv.is_starting()?), true);
        ctx.check(format!("Test changing level: {}", vv.is_changing_level()?), true);
        ctx.check(format!("Test hold level: {}", vv.is_hold_level()?), true);
        ctx.check(format!("Test open loop: {}", vv.is_open_loop()?), true);
        ctx.check(format!("Test aborted: {}", vv.is_aborted()?), true);
        Ok(())
    })();
    if let Err(e) = status {
        ctx.check(format!("Error getting test status: {}", err_text(&e)), false);
    }

    vv.stop_test()?;
    let wait = ctx.options.wait;
    let still_running = wait.until_false(|| vv.is_running().unwrap_or(false));
    ctx.pause(1);

    if still_running {
        ctx.note("Test already running, skipping start/stop test");
    } else {
        let cycle = (|| -> crate::error::Result<()> {
            vv.start_test()?;
            ctx.check("Test started", true);

            let starting = wait.until_true(|| vv.is_starting().unwrap_or(false));
            ctx.check(format!("Test starting after start: {starting}"), starting);

            wait.until_true(|| vv.is_running().unwrap_or(false));
            let running = vv.is_running()?;
            ctx.check(format!("Test running after start: {running}"), running);

            vv.stop_test()?;
            ctx.check("Test stopped", true);

            let running = wait.until_false(|| vv.is_running().unwrap_or(false));
            ctx.check(format!("Test running after stop: {running}"), !running);
            Ok(())
        })();
        if let Err(e) = cycle {
            ctx.check(format!("Error in test start/stop: {}", err_text(&e)), false);
        }
    }

    vv.stop_test()?;
    Ok(())
}

/// Sine parameters and sweep commands.
pub fn sine_specific(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    match vv.test_type()? {
        TestType::Sine => {
            vv.start_test()?;
        }
        _ => {
            let sine = find_test_file(&ctx.options.paths.profiles_dir, "sine");
            let opened = vv
                .open_test(&sine.display().to_string())
                .and_then(|_| vv.test_type());
            if !matches!(opened, Ok(TestType::Sine)) {
                ctx.note("Could not open a sine test, skipping sine-specific tests");
                return Ok(());
            }
        }
    }

    let frequency = vv.sine_frequency()?;
    ctx.check(format!("Sine frequency: {frequency}"), frequency > 0.0);

    let multiplier = vv.sweep_multiplier()?;
    ctx.check(format!("Sweep multiplier: {multiplier}"), true);

    let wanted = multiplier * 0.5;
    vv.set_sweep_multiplier(wanted)?;
    ctx.check(format!("Set sweep multiplier to: {wanted}"), true);
    let read_back = vv.sweep_multiplier()?;
    ctx.check(
        format!("Verified sweep multiplier set to: {read_back}"),
        read_back == wanted,
    );

    if ctx.options.wait.until_true(|| vv.is_running().unwrap_or(false)) {
        if let Err(e) = sweep_commands(vv, ctx) {
            ctx.check(format!("Error in sweep commands: {}", err_text(&e)), false);
        }
    } else {
        ctx.note("Test not running, skipping sweep commands");
    }

    if vv.is_running()? {
        vv.stop_test()?;
    }
    Ok(())
}

fn sweep_commands(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> crate::error::Result<()> {
    let demand = vv.demand_multiplier()?;
    ctx.check(format!("Demand multiplier: {demand}"), true);

    let wanted = 1.0;
    vv.set_demand_multiplier(wanted)?;
    ctx.check(format!("Set demand multiplier to: {wanted}"), true);
    let read_back = vv.demand_multiplier()?;
    ctx.check(
        format!("Verified demand multiplier set to: {read_back}"),
        read_back == wanted,
    );

    vv.sweep_hold()?;
    ctx.check("Sweep hold command sent", true);
    ctx.pause(1);

    vv.sweep_up()?;
    ctx.check("Sweep up command sent", true);
    ctx.pause(1);

    vv.sweep_down()?;
    ctx.check("Sweep down command sent", true);
    ctx.pause(1);

    vv.sweep_step_up()?;
    ctx.check("Sweep step up command sent", true);
    ctx.pause(1);

    vv.sweep_step_down()?;
    ctx.check("Sweep step down command sent", true);
    ctx.pause(1);

    vv.sweep_resonance_hold()?;
    ctx.check("Sweep resonance hold command sent", true);
    Ok(())
}

/// Load the reference input configuration and reconcile every channel.
pub fn input_configuration_file(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    let channels = vv.hardware_input_channels()?;
    if channels == 0 {
        ctx.check("Unable to get number of hardware input channels", false);
        return Ok(());
    }
    ctx.note(format!("Testing SetInputConfigurationFile for {channels} channels"));

    let paths = ctx.options.paths.clone();
    if !paths.input_config_dir.is_dir() {
        ctx.check(
            format!("Configuration folder not found: {}", paths.input_config_dir.display()),
            false,
        );
        return Ok(());
    }
    let config_file = input_config_path(&paths, TEDS_CONFIG_FILE);
    if !config_file.exists() {
        ctx.check(
            format!("Configuration file not found: {}", config_file.display()),
            false,
        );
        return Ok(());
    }

    if let Err(e) = vv.set_input_configuration_file(&config_file.display().to_string()) {
        ctx.check(
            format!("Error applying configuration file: {}", err_text(&e)),
            false,
        );
        return Ok(());
    }
    ctx.check(
        format!("\nApplied configuration file: {} to all channels", config_file.display()),
        true,
    );

    ctx.check("\n--- Getting settings for all channels after configuration ---", true);
    for index in 0..channels.min(CHECKED_CHANNELS) {
        if let Err(e) = reconcile_channel(vv, ctx, index) {
            ctx.check(
                format!(
                    "Error getting channel {} properties after config: {}",
                    index + 1,
                    err_text(&e)
                ),
                false,
            );
        }
    }

    let final_file = input_config_path(&paths, DEFAULT_CONFIG_FILE);
    if final_file.exists() {
        match vv.set_input_configuration_file(&final_file.display().to_string()) {
            Ok(()) => ctx.check(
                format!(
                    "\nTest completed - Applied final configuration file: {}",
                    final_file.display()
                ),
                true,
            ),
            Err(e) => ctx.check(
                format!("Error applying final configuration file: {}", err_text(&e)),
                false,
            ),
        }
    } else {
        ctx.check(
            format!("Final configuration file not found: {}", final_file.display()),
            false,
        );
    }
    Ok(())
}

fn reconcile_channel(vv: &VibrationView, ctx: &mut SuiteContext<'_>, index: usize) -> crate::error::Result<()> {
    let n = index + 1;
    let observed = ObservedChannel::read(vv, index)?;

    ctx.check(format!("Channel {n} settings after config:"), true);
    ctx.check(format!("  - Label: {}", observed.label), true);
    ctx.check(format!("  - Unit: {}", observed.unit), true);
    ctx.check(format!("  - Sensitivity: {}", observed.sensitivity), true);
    ctx.check(format!("  - Engineering Scale: {}", observed.engineering_scale), true);
    ctx.check(format!("  - Capacitor Coupled: {}", observed.capacitor_coupled), true);
    ctx.check(format!("  - Accel Power Source: {}", observed.accel_power_source), true);
    ctx.check(format!("  - Differential: {}", observed.differential), true);
    ctx.check(format!("  - Serial Number: {}", observed.serial_number), true);
    ctx.check(format!("  - Calibration Date: {}", observed.cal_date), true);

    let primary = index == 0;
    let teds = vv.teds(Some(&[index]))?;
    match teds.first().map(|c| &c.outcome) {
        None if primary => ctx.check("  - No TEDS data returned", false),
        None => ctx.check("  - No TEDS data (as expected for non-TEDS channel)", true),
        Some(TedsOutcome::Error(info)) if primary => {
            ctx.check(format!("  - TEDS Error: {info}"), false)
        }
        Some(TedsOutcome::Error(_)) => ctx.check(
            "  - No TEDS data (as expected for non-primary channel)",
            true,
        ),
        Some(TedsOutcome::Teds(items)) if items.is_empty() => {
            if primary {
                ctx.check("  - TEDS data structure found but empty", false);
            } else {
                ctx.check("  - No TEDS data (as expected for non-TEDS channel)", true);
            }
        }
        Some(TedsOutcome::Teds(items)) if primary => {
            ctx.check(format!("  - TEDS Data: Found {} items", items.len()), true);
            let expected = dytran_3055_teds();
            let result = reconcile(items, &expected);
            for want in &expected {
                let found = !result.mismatches.contains(&want.key);
                let verdict = if found { "found match" } else { "not found or mismatched" };
                ctx.check(
                    format!("  - TEDS '{}': expected '{}', {verdict}", want.key, want.value),
                    found,
                );
            }
            ctx.check(
                format!(
                    "  - TEDS Validation: {}/{} matches ({:.1}%)",
                    result.matched,
                    result.expected,
                    result.ratio() * 100.0
                ),
                result.ratio() >= TEDS_MATCH_THRESHOLD,
            );
        }
        Some(TedsOutcome::Teds(items)) => {
            let mut preview = items
                .iter()
                .take(3)
                .map(|e| format!("{}: {}", e.key, e.value))
                .collect::<Vec<_>>()
                .join(", ");
            if items.len() > 3 {
                preview.push_str(&format!(", ... ({} items total)", items.len()));
            }
            ctx.note(format!("  - Found TEDS data on non-primary channel: {preview}"));
        }
    }

    ctx.check(format!("Channel {n} expected vs actual:"), true);
    for (line, matched) in compare_channel(&expected_channel(index), &observed) {
        ctx.check(line, matched);
    }
    Ok(())
}

/// Recorder start, pause, stop and file name.
pub fn recording(vv: &VibrationView, ctx: &mut SuiteContext<'_>) -> Result<()> {
    vv.record_start()?;
    ctx.check("Recording started", true);
    ctx.pause(2);

    vv.record_pause()?;
    ctx.check("Recording paused", true);
    ctx.pause(1);

    vv.record_stop()?;
    ctx.check("Recording stopped", true);

    match vv.record_get_filename() {
        Ok(name) => ctx.check(format!("Recording filename: {name}"), true),
        Err(e) => ctx.check(
            format!("Error getting recording filename: {}", err_text(&e)),
            false,
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_ids_follow_the_axis() {
        let ids: Vec<_> = column_ids(VectorId::FREQUENCY_AXIS, 3).collect();
        assert_eq!(
            ids,
            vec![
                (0, VectorId::FREQUENCY_AXIS),
                (1, VectorId::FREQUENCY_AXIS.column(1)),
                (2, VectorId::FREQUENCY_AXIS.column(2)),
            ]
        );
    }

    #[test]
    fn column_ids_stop_at_family_block() {
        let ids: Vec<_> = column_ids(VectorId::WAVEFORM_AXIS, 70_000).collect();
        assert_eq!(ids.len(), 100);
        let (last, id) = ids[ids.len() - 1];
        assert_eq!(last, 99);
        assert_eq!(id.column, 99);
        assert!(ids.iter().all(|(_, id)| id.kind == VectorKind::Waveform));
    }
}
