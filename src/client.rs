//! Typed call surface over a VibrationVIEW session.
//!
//! [`VibrationView`] exposes one method per remote operation. Methods do no local
//! validation: channel indices, file paths and test-type preconditions are checked
//! by the host, and a violation surfaces as [`VvError::Remote`].
//!
//! Channel indices are 0-based on the wire. Only the TEDS outcome reports
//! channels 1-based, matching what operators see in the host's UI.
//!
//! ## Soft failures
//!
//! Two operations swallow remote failures instead of propagating them:
//! - [`VibrationView::vector`] logs and returns the zero-filled matrix
//! - [`VibrationView::teds`] records the failure per channel and moves on
//!
//! Everything else returns `Err`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::endpoint::{Connector, Endpoint, Value};
use crate::enums::{TestType, VectorId};
use crate::error::{ErrorInfo, Result, VvError};
use crate::session::{ConnectionSettings, Session};
use crate::teds::{ChannelTeds, TedsEntry, TEDS_BUFFER_COLUMNS, TEDS_BUFFER_ROWS};

/// Number of rear input channels. Fixed by the hardware.
pub const REAR_INPUT_CHANNELS: usize = 8;

/// Stop reason reported by `Status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Status {
    /// Stop code
    pub stop_code: i32,
    /// Index qualifying the stop code (e.g. the offending channel)
    pub stop_code_index: i32,
}

/// Client for one VibrationVIEW instance.
#[derive(Debug)]
pub struct VibrationView {
    session: Session,
}

impl VibrationView {
    /// Connect through `connector`. See [`Session::connect`] for failure behavior.
    pub fn connect(connector: Arc<dyn Connector>, settings: &ConnectionSettings) -> Self {
        Self::from_session(Session::connect(connector, settings))
    }

    /// Wrap an existing session.
    pub fn from_session(session: Session) -> Self {
        Self { session }
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the session holds a handle.
    pub fn is_alive(&self) -> bool {
        self.session.is_alive()
    }

    /// Release the handle. Idempotent.
    pub fn close(&mut self) {
        self.session.close();
    }

    fn endpoint(&self) -> Result<&dyn Endpoint> {
        self.session.endpoint()
    }

    fn get(&self, member: &'static str, args: &[Value]) -> Result<Value> {
        self.endpoint()?
            .get(member, args)
            .map_err(|e| VvError::remote(member, e))
    }

    fn put(&self, member: &'static str, args: &[Value], value: Value) -> Result<()> {
        self.endpoint()?
            .put(member, args, value)
            .map_err(|e| VvError::remote(member, e))
    }

    fn call(&self, member: &'static str, args: &mut [Value]) -> Result<Value> {
        self.endpoint()?
            .call(member, args)
            .map_err(|e| VvError::remote(member, e))
    }

    fn get_bool(&self, member: &'static str) -> Result<bool> {
        self.get(member, &[])?.into_bool(member)
    }

    fn get_f64(&self, member: &'static str) -> Result<f64> {
        self.get(member, &[])?.into_f64(member)
    }

    fn channel_call(&self, member: &'static str, channel: usize) -> Result<Value> {
        self.call(member, &mut [Value::index(channel)])
    }

    fn count(&self, member: &'static str) -> Result<usize> {
        let raw = self.get(member, &[])?.into_i32(member)?;
        usize::try_from(raw).map_err(|_| VvError::UnexpectedValue {
            member,
            expected: "non-negative count",
            found: raw.to_string(),
        })
    }

    /// Invoke a member that fills a pre-sized float array.
    fn fill_array(&self, member: &'static str, len: usize) -> Result<Vec<f64>> {
        let mut args = [Value::FloatArray(vec![0.0; len])];
        match self.call(member, &mut args)? {
            Value::FloatArray(values) => Ok(values),
            _ => std::mem::take(&mut args[0]).into_float_array(member),
        }
    }

    // =========================================================================
    // Test lifecycle
    // =========================================================================

    /// Open and start the test profile at `path`.
    pub fn run_test(&self, path: &str) -> Result<Value> {
        self.call("RunTest", &mut [Value::from(path)])
    }

    /// Open the test profile at `path` without starting it.
    pub fn open_test(&self, path: &str) -> Result<Value> {
        self.call("OpenTest", &mut [Value::from(path)])
    }

    /// Open the test profile at `path` in the editor.
    pub fn edit_test(&self, path: &str) -> Result<Value> {
        self.call("EditTest", &mut [Value::from(path)])
    }

    /// Start the loaded test.
    pub fn start_test(&self) -> Result<Value> {
        self.call("StartTest", &mut [])
    }

    /// Stop the running test.
    pub fn stop_test(&self) -> Result<Value> {
        self.call("StopTest", &mut [])
    }

    /// Close the editor without saving.
    pub fn abort_edit(&self) -> Result<Value> {
        self.call("AbortEdit", &mut [])
    }

    /// Resume a stopped test.
    pub fn resume_test(&self) -> Result<Value> {
        self.call("ResumeTest", &mut [])
    }

    /// Save the current test data to `path`.
    pub fn save_data(&self, path: &str) -> Result<Value> {
        self.call("SaveData", &mut [Value::from(path)])
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Test is running.
    pub fn is_running(&self) -> Result<bool> {
        self.get_bool("Running")
    }

    /// Test is starting up.
    pub fn is_starting(&self) -> Result<bool> {
        self.get_bool("Starting")
    }

    /// Test level is changing.
    pub fn is_changing_level(&self) -> Result<bool> {
        self.get_bool("ChangingLevel")
    }

    /// Schedule timer is holding at the current level.
    pub fn is_hold_level(&self) -> Result<bool> {
        self.get_bool("HoldLevel")
    }

    /// Running open loop.
    pub fn is_open_loop(&self) -> Result<bool> {
        self.get_bool("OpenLoop")
    }

    /// Test was aborted.
    pub fn is_aborted(&self) -> Result<bool> {
        self.get_bool("Aborted")
    }

    /// A stopped test can be resumed.
    pub fn can_resume_test(&self) -> Result<bool> {
        self.get_bool("CanResumeTest")
    }

    /// Host is ready for commands.
    pub fn is_ready(&self) -> Result<bool> {
        self.session.is_ready()
    }

    /// Stop code and stop code index of the last stop.
    pub fn status(&self) -> Result<Status> {
        let mut args = [Value::Int(0), Value::Int(0)];
        self.call("Status", &mut args)?;
        let [stop_code, stop_code_index] = args;
        Ok(Status {
            stop_code: stop_code.into_i32("Status")?,
            stop_code_index: stop_code_index.into_i32("Status")?,
        })
    }

    // =========================================================================
    // Hardware description
    // =========================================================================

    /// Number of hardware input channels.
    pub fn hardware_input_channels(&self) -> Result<usize> {
        self.count("HardwareInputChannels")
    }

    /// Number of hardware output channels (control loops).
    pub fn hardware_output_channels(&self) -> Result<usize> {
        self.count("HardwareOutputChannels")
    }

    /// Hardware serial number. Reads 0xFFFFFF in demo mode.
    pub fn hardware_serial_number(&self) -> Result<i32> {
        self.get("HardwareSerialNumber", &[])?
            .into_i32("HardwareSerialNumber")
    }

    /// Host software version.
    pub fn software_version(&self) -> Result<String> {
        self.get("SoftwareVersion", &[])?.into_string("SoftwareVersion")
    }

    /// Type of the loaded test.
    pub fn test_type(&self) -> Result<TestType> {
        let code = self.get("TestType", &[])?.into_i32("TestType")?;
        TestType::from_code(code).ok_or_else(|| VvError::UnexpectedValue {
            member: "TestType",
            expected: "test type code",
            found: code.to_string(),
        })
    }

    /// Switch the active test type. Returns the value written; not re-read.
    pub fn set_test_type(&self, test_type: TestType) -> Result<TestType> {
        self.put("TestType", &[], Value::Int(test_type.code()))?;
        Ok(test_type)
    }

    /// Read a field of the report template (e.g. `TestName`).
    pub fn report_field(&self, name: &str) -> Result<String> {
        self.call("ReportField", &mut [Value::from(name)])?
            .into_string("ReportField")
    }

    // =========================================================================
    // Per-channel configuration
    // =========================================================================

    /// Label of input channel `channel`.
    pub fn channel_label(&self, channel: usize) -> Result<String> {
        self.channel_call("ChannelLabel", channel)?
            .into_string("ChannelLabel")
    }

    /// Engineering unit of input channel `channel`.
    pub fn channel_unit(&self, channel: usize) -> Result<String> {
        self.channel_call("ChannelUnit", channel)?
            .into_string("ChannelUnit")
    }

    /// Sensitivity of input channel `channel` in mV per engineering unit.
    pub fn input_sensitivity(&self, channel: usize) -> Result<f64> {
        self.channel_call("InputSensitivity", channel)?
            .into_f64("InputSensitivity")
    }

    /// Engineering scale of input channel `channel`.
    pub fn input_engineering_scale(&self, channel: usize) -> Result<f64> {
        self.channel_call("InputEngineeringScale", channel)?
            .into_f64("InputEngineeringScale")
    }

    /// Sensor serial number on input channel `channel`.
    pub fn input_serial_number(&self, channel: usize) -> Result<String> {
        self.channel_call("InputSerialNumber", channel)?
            .into_string("InputSerialNumber")
    }

    /// Sensor calibration date on input channel `channel`.
    pub fn input_cal_date(&self, channel: usize) -> Result<String> {
        self.channel_call("InputCalDate", channel)?
            .into_string("InputCalDate")
    }

    /// Input channel `channel` is AC (capacitor) coupled.
    pub fn input_capacitor_coupled(&self, channel: usize) -> Result<bool> {
        self.get("InputCapacitorCoupled", &[Value::index(channel)])?
            .into_bool("InputCapacitorCoupled")
    }

    /// Set AC coupling on input channel `channel`. Returns the value written; not re-read.
    pub fn set_input_capacitor_coupled(&self, channel: usize, on: bool) -> Result<bool> {
        self.put("InputCapacitorCoupled", &[Value::index(channel)], Value::Bool(on))?;
        Ok(on)
    }

    /// Input channel `channel` powers an accelerometer (IEPE).
    pub fn input_accel_power_source(&self, channel: usize) -> Result<bool> {
        self.get("InputAccelPowerSource", &[Value::index(channel)])?
            .into_bool("InputAccelPowerSource")
    }

    /// Set accelerometer power on input channel `channel`. Returns the value written; not re-read.
    pub fn set_input_accel_power_source(&self, channel: usize, on: bool) -> Result<bool> {
        self.put("InputAccelPowerSource", &[Value::index(channel)], Value::Bool(on))?;
        Ok(on)
    }

    /// Input channel `channel` is differential.
    pub fn input_differential(&self, channel: usize) -> Result<bool> {
        self.get("InputDifferential", &[Value::index(channel)])?
            .into_bool("InputDifferential")
    }

    /// Set differential mode on input channel `channel`. Returns the value written; not re-read.
    pub fn set_input_differential(&self, channel: usize, on: bool) -> Result<bool> {
        self.put("InputDifferential", &[Value::index(channel)], Value::Bool(on))?;
        Ok(on)
    }

    /// Hardware can AC couple input channel `channel`.
    pub fn hardware_supports_capacitor_coupled(&self, channel: usize) -> Result<bool> {
        self.channel_call("HardwareSupportsCapacitorCoupled", channel)?
            .into_bool("HardwareSupportsCapacitorCoupled")
    }

    /// Hardware can power an accelerometer on input channel `channel`.
    pub fn hardware_supports_accel_power_source(&self, channel: usize) -> Result<bool> {
        self.channel_call("HardwareSupportsAccelPowerSource", channel)?
            .into_bool("HardwareSupportsAccelPowerSource")
    }

    /// Hardware can run input channel `channel` differentially.
    pub fn hardware_supports_differential(&self, channel: usize) -> Result<bool> {
        self.channel_call("HardwareSupportsDifferential", channel)?
            .into_bool("HardwareSupportsDifferential")
    }

    /// Set power, coupling and differential mode of one channel in a single call.
    pub fn input_mode(
        &self,
        channel: usize,
        accel_power: bool,
        capacitor_coupled: bool,
        differential: bool,
    ) -> Result<Value> {
        self.call(
            "InputMode",
            &mut [
                Value::index(channel),
                Value::Bool(accel_power),
                Value::Bool(capacitor_coupled),
                Value::Bool(differential),
            ],
        )
    }

    /// Set sensitivity, serial number and calibration date of one channel.
    pub fn input_calibration(
        &self,
        channel: usize,
        sensitivity: f64,
        serial_number: &str,
        cal_date: &str,
    ) -> Result<Value> {
        self.call(
            "InputCalibration",
            &mut [
                Value::index(channel),
                Value::Float(sensitivity),
                Value::from(serial_number),
                Value::from(cal_date),
            ],
        )
    }

    /// Apply an input configuration (`.vic`) file to all channels.
    pub fn set_input_configuration_file(&self, path: &str) -> Result<()> {
        debug!(path, "Loading input configuration file");
        self.put("InputConfigurationFile", &[], Value::from(path))
    }

    /// TEDS of the given channels (0-based), or of every input when `None`.
    ///
    /// A channel whose read fails is reported as an error entry; the remaining
    /// channels are still read. Only a failure to count the inputs (when `channels`
    /// is `None`) or a dead session is returned as `Err`.
    pub fn teds(&self, channels: Option<&[usize]>) -> Result<Vec<ChannelTeds>> {
        let indices: Vec<usize> = match channels {
            Some(list) => list.to_vec(),
            None => (0..self.hardware_input_channels()?).collect(),
        };
        // Fail fast on a dead session rather than reporting one error per channel.
        self.endpoint()?;

        Ok(indices
            .into_iter()
            .map(|index| match self.teds_channel(index) {
                Ok(entries) => ChannelTeds::entries(index + 1, entries),
                Err(e) => {
                    let info = ErrorInfo::from(&e);
                    debug!(channel = index + 1, error = %info, "TEDS read failed");
                    ChannelTeds::error(index + 1, info)
                }
            })
            .collect())
    }

    fn teds_channel(&self, channel: usize) -> Result<Vec<TedsEntry>> {
        let buffer = vec![vec![String::new(); TEDS_BUFFER_COLUMNS]; TEDS_BUFFER_ROWS];
        let mut args = [Value::index(channel), Value::StrMatrix(buffer)];
        let rows = match self.call("Teds", &mut args)? {
            Value::StrMatrix(rows) => rows,
            _ => std::mem::take(&mut args[1]).into_str_matrix("Teds")?,
        };
        Ok(TedsEntry::from_rows(rows))
    }

    // =========================================================================
    // Live readings
    // =========================================================================

    /// One reading per input channel.
    pub fn channel(&self) -> Result<Vec<f64>> {
        let len = self.hardware_input_channels()?;
        self.fill_array("Channel", len)
    }

    /// Demand per output channel.
    pub fn demand(&self) -> Result<Vec<f64>> {
        let len = self.hardware_output_channels()?;
        self.fill_array("Demand", len)
    }

    /// Control per output channel.
    pub fn control(&self) -> Result<Vec<f64>> {
        let len = self.hardware_output_channels()?;
        self.fill_array("Control", len)
    }

    /// Drive output per output channel.
    pub fn output(&self) -> Result<Vec<f64>> {
        let len = self.hardware_output_channels()?;
        self.fill_array("Output", len)
    }

    /// Rear input readings.
    pub fn rear_input(&self) -> Result<Vec<f64>> {
        self.fill_array("RearInput", REAR_INPUT_CHANNELS)
    }

    /// Engineering unit of control loop `loop_index`.
    pub fn control_unit(&self, loop_index: usize) -> Result<String> {
        self.channel_call("ControlUnit", loop_index)?
            .into_string("ControlUnit")
    }

    /// Label of control loop `loop_index`.
    pub fn control_label(&self, loop_index: usize) -> Result<String> {
        self.channel_call("ControlLabel", loop_index)?
            .into_string("ControlLabel")
    }

    /// Engineering unit of rear input `channel`.
    pub fn rear_input_unit(&self, channel: usize) -> Result<String> {
        self.channel_call("RearInputUnit", channel)?
            .into_string("RearInputUnit")
    }

    /// Label of rear input `channel`.
    pub fn rear_input_label(&self, channel: usize) -> Result<String> {
        self.channel_call("RearInputLabel", channel)?
            .into_string("RearInputLabel")
    }

    // =========================================================================
    // Vectors
    // =========================================================================

    /// Raw data vector `id` as `VectorLength(id)` rows of `columns` values.
    ///
    /// A failure of the `Vector` call itself is logged and yields the zero-filled
    /// matrix; a failure of `VectorLength` is returned.
    pub fn vector(&self, id: VectorId, columns: usize) -> Result<Vec<Vec<f64>>> {
        let rows = self.vector_length(id)?;
        let zeros = vec![vec![0.0; columns]; rows];
        let mut args = [Value::FloatMatrix(zeros.clone()), Value::Int(id.code())];

        let result = self.call("Vector", &mut args).and_then(|returned| match returned {
            Value::FloatMatrix(matrix) => Ok(matrix),
            _ => std::mem::take(&mut args[0]).into_float_matrix("Vector"),
        });
        match result {
            Ok(matrix) => Ok(matrix),
            Err(VvError::NotConnected) => Err(VvError::NotConnected),
            Err(e) => {
                warn!(vector = %id, error = %ErrorInfo::from(&e), "Error retrieving data for vector");
                Ok(zeros)
            }
        }
    }

    /// Number of rows vector `id` currently holds.
    pub fn vector_length(&self, id: VectorId) -> Result<usize> {
        let raw = self
            .call("VectorLength", &mut [Value::Int(id.code())])?
            .into_i32("VectorLength")?;
        usize::try_from(raw).map_err(|_| VvError::UnexpectedValue {
            member: "VectorLength",
            expected: "non-negative length",
            found: raw.to_string(),
        })
    }

    /// Engineering unit of vector `id`.
    pub fn vector_unit(&self, id: VectorId) -> Result<String> {
        self.call("VectorUnit", &mut [Value::Int(id.code())])?
            .into_string("VectorUnit")
    }

    /// Label of vector `id`.
    pub fn vector_label(&self, id: VectorId) -> Result<String> {
        self.call("VectorLabel", &mut [Value::Int(id.code())])?
            .into_string("VectorLabel")
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Start (or continue) recording.
    pub fn record_start(&self) -> Result<Value> {
        self.call("RecordStart", &mut [])
    }

    /// Pause recording.
    pub fn record_pause(&self) -> Result<Value> {
        self.call("RecordPause", &mut [])
    }

    /// Stop recording.
    pub fn record_stop(&self) -> Result<Value> {
        self.call("RecordStop", &mut [])
    }

    /// File name of the last recording.
    pub fn record_get_filename(&self) -> Result<String> {
        self.get("RecordGetFilename", &[])?
            .into_string("RecordGetFilename")
    }

    // =========================================================================
    // Window control
    // =========================================================================

    /// Minimize the host window.
    pub fn minimize(&self) -> Result<Value> {
        self.call("Minimize", &mut [])
    }

    /// Maximize the host window.
    pub fn maximize(&self) -> Result<Value> {
        self.call("Maximize", &mut [])
    }

    /// Restore the host window.
    pub fn restore(&self) -> Result<Value> {
        self.call("Restore", &mut [])
    }

    /// Bring the host window to the foreground.
    pub fn activate(&self) -> Result<Value> {
        self.call("Activate", &mut [])
    }

    /// Execute menu command `id`.
    pub fn menu_command(&self, id: i32) -> Result<Value> {
        self.call("MenuCommand", &mut [Value::Int(id)])
    }

    // =========================================================================
    // Sine
    // =========================================================================

    /// Current sine frequency in Hz.
    pub fn sine_frequency(&self) -> Result<f64> {
        self.get_f64("SineFrequency")
    }

    /// Set the sine frequency. Returns the value written; not re-read.
    pub fn set_sine_frequency(&self, hz: f64) -> Result<f64> {
        self.put("SineFrequency", &[], Value::Float(hz))?;
        Ok(hz)
    }

    /// Sweep rate multiplier.
    pub fn sweep_multiplier(&self) -> Result<f64> {
        self.get_f64("SweepMultiplier")
    }

    /// Set the sweep rate multiplier. Returns the value written; not re-read.
    pub fn set_sweep_multiplier(&self, value: f64) -> Result<f64> {
        self.put("SweepMultiplier", &[], Value::Float(value))?;
        Ok(value)
    }

    /// Demand multiplier in dB.
    pub fn demand_multiplier(&self) -> Result<f64> {
        self.get_f64("DemandMultipler")
    }

    /// Set the demand multiplier in dB. Returns the value written; not re-read.
    pub fn set_demand_multiplier(&self, db: f64) -> Result<f64> {
        self.put("DemandMultipler", &[], Value::Float(db))?;
        Ok(db)
    }

    /// Sweep up.
    pub fn sweep_up(&self) -> Result<Value> {
        self.call("SweepUp", &mut [])
    }

    /// Sweep down.
    pub fn sweep_down(&self) -> Result<Value> {
        self.call("SweepDown", &mut [])
    }

    /// Step to the next whole frequency up.
    pub fn sweep_step_up(&self) -> Result<Value> {
        self.call("SweepStepUp", &mut [])
    }

    /// Step to the next whole frequency down.
    pub fn sweep_step_down(&self) -> Result<Value> {
        self.call("SweepStepDown", &mut [])
    }

    /// Hold the sweep at the current frequency.
    pub fn sweep_hold(&self) -> Result<Value> {
        self.call("SweepHold", &mut [])
    }

    /// Hold the sweep on the tracked resonance.
    pub fn sweep_resonance_hold(&self) -> Result<Value> {
        self.call("SweepResonanceHold", &mut [])
    }

    // =========================================================================
    // System check
    // =========================================================================

    /// System check frequency in Hz.
    pub fn system_check_frequency(&self) -> Result<f64> {
        self.get_f64("SystemCheckFrequency")
    }

    /// Set the system check frequency. Returns the value written; not re-read.
    pub fn set_system_check_frequency(&self, hz: f64) -> Result<f64> {
        self.put("SystemCheckFrequency", &[], Value::Float(hz))?;
        Ok(hz)
    }

    /// System check output voltage.
    pub fn system_check_output_voltage(&self) -> Result<f64> {
        self.get_f64("SystemCheckOutputVoltage")
    }

    /// Set the system check output voltage. Returns the value written; not re-read.
    pub fn set_system_check_output_voltage(&self, volts: f64) -> Result<f64> {
        self.put("SystemCheckOutputVoltage", &[], Value::Float(volts))?;
        Ok(volts)
    }
}
