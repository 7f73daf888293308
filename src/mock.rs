//! Simulated VibrationVIEW instance for testing
//!
//! [`MockConnector`] and [`MockEndpoint`] implement the endpoint traits without a
//! running host application. The simulation is deliberately shallow: it tracks
//! the state the automation interface exposes (loaded test, run state, channel
//! configuration, recording) and answers with the shapes the real server uses.
//! It provides:
//! - A readiness handshake that succeeds after a configurable number of checks
//! - A run state that passes through "starting" for a few status polls
//! - Per-channel input configuration, TEDS sheets and loadable `.vic` files
//! - Controllable failure injection per member
//! - Call logging for test verification

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::endpoint::{Connector, Endpoint, Value};
use crate::enums::{TestType, VectorId, VectorKind};
use crate::error::{RemoteError, RemoteResult};

/// Source component reported by simulated failures.
pub const MOCK_SOURCE: &str = "VibrationVIEW";

/// Generic exception raised by a member.
pub const DISP_E_EXCEPTION: i32 = 0x8002_0009_u32 as i32;
/// Unknown member name.
pub const DISP_E_MEMBERNOTFOUND: i32 = 0x8002_0003_u32 as i32;
/// Index out of range.
pub const DISP_E_BADINDEX: i32 = 0x8002_000B_u32 as i32;
/// Argument of the wrong shape or value.
pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
/// Transport could not be initialized.
pub const CO_E_NOTINITIALIZED: i32 = 0x8004_01F0_u32 as i32;
/// ProgID not registered.
pub const REGDB_E_CLASSNOTREG: i32 = 0x8004_0154_u32 as i32;

/// Number of rear input channels on every front end.
pub const REAR_INPUT_CHANNELS: usize = 8;

/// Static shape of the simulated system.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// `IsReady` reads true from this check onward (1 = immediately)
    pub ready_after_checks: u32,
    /// Hardware input channel count
    pub input_channels: usize,
    /// Hardware output (loop) count
    pub output_channels: usize,
    /// Hardware serial number (0xFFFFFF in demo mode)
    pub hardware_serial_number: i32,
    /// Software version string
    pub software_version: String,
    /// Status polls spent in "starting" before a test reports running
    pub settle_polls: u32,
    /// Rows reported by `VectorLength` once a test has produced data
    pub vector_rows: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            ready_after_checks: 1,
            input_channels: 16,
            output_channels: 1,
            hardware_serial_number: 0x00FF_FFFF,
            software_version: "2024.2.0".to_string(),
            settle_polls: 2,
            vector_rows: 256,
        }
    }
}

/// Input configuration of one simulated channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MockChannel {
    /// Channel label
    pub label: String,
    /// Engineering unit
    pub unit: String,
    /// Sensitivity in mV per engineering unit
    pub sensitivity: f64,
    /// Engineering scale factor
    pub engineering_scale: f64,
    /// AC (capacitor) coupling enabled
    pub capacitor_coupled: bool,
    /// Accelerometer (IEPE) power enabled
    pub accel_power_source: bool,
    /// Differential input enabled
    pub differential: bool,
    /// Sensor serial number
    pub serial_number: String,
    /// Sensor calibration date
    pub cal_date: String,
    /// TEDS sheet, empty for non-TEDS sensors
    pub teds: Vec<(String, String)>,
    /// Hardware can AC couple this input
    pub supports_capacitor_coupled: bool,
    /// Hardware can power an accelerometer on this input
    pub supports_accel_power_source: bool,
    /// Hardware can run this input differentially
    pub supports_differential: bool,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self {
            label: "Acceleration".to_string(),
            unit: "g".to_string(),
            sensitivity: 10.0,
            engineering_scale: 1.0,
            capacitor_coupled: false,
            accel_power_source: false,
            differential: false,
            serial_number: String::new(),
            cal_date: String::new(),
            teds: Vec::new(),
            supports_capacitor_coupled: true,
            supports_accel_power_source: true,
            supports_differential: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Starting { remaining: u32 },
    Running,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    Idle,
    Recording,
    Paused,
}

/// Window state driven by the window-control members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Restored
    Normal,
    /// Minimized to the task bar
    Minimized,
    /// Maximized
    Maximized,
}

#[derive(Debug)]
struct MockState {
    config: MockConfig,
    ready_checks: u32,
    transport_inits: u32,
    transport_uninits: u32,
    fail_transport_init: bool,
    fail_dispatch: bool,
    failing: HashSet<String>,
    call_log: Vec<String>,

    channels: Vec<MockChannel>,
    input_configs: HashMap<String, Vec<MockChannel>>,

    loaded_test: Option<String>,
    test_type: TestType,
    edit_open: bool,
    run: RunState,
    has_run: bool,
    hold: bool,
    stop_code: i32,
    stop_code_index: i32,

    sine_frequency: f64,
    sweep_multiplier: f64,
    demand_multiplier: f64,
    system_check_frequency: f64,
    system_check_output_voltage: f64,

    record: RecordState,
    record_count: u32,
    record_filename: String,
    saved_data: Vec<String>,

    window: WindowState,
    menu_commands: Vec<i32>,
}

impl MockState {
    fn new(config: MockConfig) -> Self {
        let channels = vec![MockChannel::default(); config.input_channels];
        Self {
            config,
            ready_checks: 0,
            transport_inits: 0,
            transport_uninits: 0,
            fail_transport_init: false,
            fail_dispatch: false,
            failing: HashSet::new(),
            call_log: Vec::new(),
            channels,
            input_configs: HashMap::new(),
            loaded_test: None,
            test_type: TestType::SystemCheck,
            edit_open: false,
            run: RunState::Stopped,
            has_run: false,
            hold: false,
            stop_code: 0,
            stop_code_index: 0,
            sine_frequency: 20.0,
            sweep_multiplier: 1.0,
            demand_multiplier: 0.0,
            system_check_frequency: 100.0,
            system_check_output_voltage: 0.1,
            record: RecordState::Idle,
            record_count: 0,
            record_filename: String::new(),
            saved_data: Vec::new(),
            window: WindowState::Normal,
            menu_commands: Vec::new(),
        }
    }

    /// Advance the start-up countdown by one status poll.
    fn poll_run_state(&mut self) {
        if let RunState::Starting { remaining } = self.run {
            self.run = if remaining <= 1 {
                RunState::Running
            } else {
                RunState::Starting {
                    remaining: remaining - 1,
                }
            };
        }
    }

    fn is_running(&self) -> bool {
        self.run == RunState::Running
    }

    fn channel(&self, args: &[Value], position: usize) -> RemoteResult<usize> {
        let index = int_arg(args, position)?;
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.channels.len())
            .ok_or_else(|| bad_index(format!("Invalid input channel {index}")))
    }

    fn output_loop(&self, args: &[Value]) -> RemoteResult<usize> {
        let index = int_arg(args, 0)?;
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.config.output_channels)
            .ok_or_else(|| bad_index(format!("Invalid loop {index}")))
    }

    fn start(&mut self) -> RemoteResult<()> {
        if self.loaded_test.is_none() {
            return Err(exception("No test is loaded"));
        }
        self.run = if self.config.settle_polls == 0 {
            RunState::Running
        } else {
            RunState::Starting {
                remaining: self.config.settle_polls,
            }
        };
        self.has_run = true;
        self.hold = false;
        self.stop_code = 0;
        self.stop_code_index = 0;
        Ok(())
    }

    fn open(&mut self, path: &str) -> RemoteResult<()> {
        let test_type = test_type_for_path(path)
            .ok_or_else(|| exception(format!("Unable to open test '{path}'")))?;
        self.run = RunState::Stopped;
        self.loaded_test = Some(path.to_string());
        self.test_type = test_type;
        self.has_run = false;
        self.hold = false;
        Ok(())
    }

    fn require_sine_running(&self) -> RemoteResult<()> {
        if self.test_type != TestType::Sine || !self.is_running() {
            return Err(exception("Command requires a running sine test"));
        }
        Ok(())
    }

    fn vector_rows(&self, code: i32) -> RemoteResult<usize> {
        VectorId::from_code(code)
            .ok_or_else(|| bad_index(format!("Unknown vector {code}")))?;
        Ok(if self.has_run { self.config.vector_rows } else { 0 })
    }

    fn vector_unit_label(&self, code: i32) -> RemoteResult<(String, String)> {
        let id = VectorId::from_code(code).ok_or_else(|| bad_index(format!("Unknown vector {code}")))?;
        if id.column == 0 {
            let pair = match id.kind {
                VectorKind::Waveform => ("s", "Time"),
                VectorKind::Frequency => ("Hz", "Frequency"),
                VectorKind::TimeHistory => ("s", "Elapsed Time"),
            };
            return Ok((pair.0.to_string(), pair.1.to_string()));
        }
        let channel = self
            .channels
            .get(usize::from(id.column) - 1)
            .ok_or_else(|| bad_index(format!("Vector {id} has no channel")))?;
        Ok((channel.unit.clone(), channel.label.clone()))
    }

    fn live_value(&self, index: usize) -> f64 {
        if self.is_running() {
            0.1 * (index as f64 + 1.0)
        } else {
            0.0
        }
    }

    fn fill_vector(&self, code: i32, matrix: &mut [Vec<f64>]) -> RemoteResult<()> {
        let expected = self.vector_rows(code)?;
        if matrix.len() != expected {
            return Err(invalid_arg(format!(
                "Array has {} rows, vector {code} requires {expected}",
                matrix.len()
            )));
        }
        let kind = VectorId::from_code(code).map(|id| id.kind);
        for (row, values) in matrix.iter_mut().enumerate() {
            for (col, cell) in values.iter_mut().enumerate() {
                *cell = if col == 0 {
                    match kind {
                        Some(VectorKind::Frequency) => row as f64 * 10.0,
                        _ => row as f64 / 1024.0,
                    }
                } else {
                    self.live_value(col - 1) * (1.0 + row as f64 / 1000.0)
                };
            }
        }
        Ok(())
    }

    fn read(&mut self, member: &str, args: &[Value]) -> RemoteResult<Value> {
        let value = match member {
            "IsReady" => {
                self.ready_checks += 1;
                Value::Bool(self.ready_checks >= self.config.ready_after_checks)
            }
            "Running" => {
                self.poll_run_state();
                Value::Bool(self.is_running())
            }
            "Starting" => {
                let starting = matches!(self.run, RunState::Starting { .. });
                self.poll_run_state();
                Value::Bool(starting)
            }
            "ChangingLevel" => Value::Bool(false),
            "HoldLevel" => Value::Bool(self.is_running() && self.hold),
            "OpenLoop" => Value::Bool(self.test_type == TestType::SystemCheck && self.is_running()),
            "Aborted" => Value::Bool(self.run == RunState::Aborted),
            "CanResumeTest" => Value::Bool(matches!(self.run, RunState::Stopped | RunState::Aborted) && self.has_run),
            "HardwareInputChannels" => Value::index(self.channels.len()),
            "HardwareOutputChannels" => Value::index(self.config.output_channels),
            "HardwareSerialNumber" => Value::Int(self.config.hardware_serial_number),
            "SoftwareVersion" => Value::Str(self.config.software_version.clone()),
            "TestType" => Value::Int(self.test_type.code()),
            "SineFrequency" => Value::Float(self.sine_frequency),
            "SweepMultiplier" => Value::Float(self.sweep_multiplier),
            "DemandMultipler" => Value::Float(self.demand_multiplier),
            "SystemCheckFrequency" => Value::Float(self.system_check_frequency),
            "SystemCheckOutputVoltage" => Value::Float(self.system_check_output_voltage),
            "RecordGetFilename" => Value::Str(self.record_filename.clone()),
            "InputCapacitorCoupled" => Value::Bool(self.channels[self.channel(args, 0)?].capacitor_coupled),
            "InputAccelPowerSource" => Value::Bool(self.channels[self.channel(args, 0)?].accel_power_source),
            "InputDifferential" => Value::Bool(self.channels[self.channel(args, 0)?].differential),
            _ => return Err(member_not_found(member)),
        };
        Ok(value)
    }

    fn write(&mut self, member: &str, args: &[Value], value: Value) -> RemoteResult<()> {
        match member {
            "TestType" => {
                let code = int_value(&value)?;
                self.test_type = TestType::from_code(code)
                    .ok_or_else(|| invalid_arg(format!("Unknown test type {code}")))?;
            }
            "SineFrequency" => self.sine_frequency = float_value(&value)?,
            "SweepMultiplier" => self.sweep_multiplier = float_value(&value)?,
            "DemandMultipler" => self.demand_multiplier = float_value(&value)?,
            "SystemCheckFrequency" => self.system_check_frequency = float_value(&value)?,
            "SystemCheckOutputVoltage" => self.system_check_output_voltage = float_value(&value)?,
            "InputCapacitorCoupled" => {
                let ch = self.channel(args, 0)?;
                let on = bool_value(&value)?;
                require_capability(on, self.channels[ch].supports_capacitor_coupled, "capacitor coupling")?;
                self.channels[ch].capacitor_coupled = on;
            }
            "InputAccelPowerSource" => {
                let ch = self.channel(args, 0)?;
                let on = bool_value(&value)?;
                require_capability(on, self.channels[ch].supports_accel_power_source, "accelerometer power")?;
                self.channels[ch].accel_power_source = on;
            }
            "InputDifferential" => {
                let ch = self.channel(args, 0)?;
                let on = bool_value(&value)?;
                require_capability(on, self.channels[ch].supports_differential, "differential input")?;
                self.channels[ch].differential = on;
            }
            "InputConfigurationFile" => {
                let path = str_value(&value)?;
                let config = self
                    .input_configs
                    .get(path)
                    .cloned()
                    .ok_or_else(|| exception(format!("Unable to open input configuration '{path}'")))?;
                let count = self.channels.len();
                self.channels = config
                    .into_iter()
                    .chain(std::iter::repeat(MockChannel::default()))
                    .take(count)
                    .collect();
            }
            _ => return Err(member_not_found(member)),
        }
        Ok(())
    }

    fn invoke(&mut self, member: &str, args: &mut [Value]) -> RemoteResult<Value> {
        let value = match member {
            "RunTest" => {
                let path = str_arg(args, 0)?.to_string();
                self.open(&path)?;
                self.start()?;
                Value::Empty
            }
            "OpenTest" => {
                let path = str_arg(args, 0)?.to_string();
                self.open(&path)?;
                Value::Empty
            }
            "EditTest" => {
                let path = str_arg(args, 0)?.to_string();
                self.open(&path)?;
                self.edit_open = true;
                Value::Empty
            }
            "AbortEdit" => {
                self.edit_open = false;
                Value::Empty
            }
            "StartTest" => {
                self.start()?;
                Value::Empty
            }
            "StopTest" => {
                if self.run != RunState::Stopped {
                    self.stop_code = 1;
                    self.stop_code_index = 0;
                }
                self.run = RunState::Stopped;
                Value::Empty
            }
            "ResumeTest" => {
                if !self.has_run || matches!(self.run, RunState::Running | RunState::Starting { .. }) {
                    return Err(exception("Test cannot be resumed"));
                }
                self.start()?;
                Value::Empty
            }
            "SaveData" => {
                let path = str_arg(args, 0)?.to_string();
                if !self.has_run {
                    return Err(exception("No data to save"));
                }
                self.saved_data.push(path);
                Value::Empty
            }
            "Minimize" => {
                self.window = WindowState::Minimized;
                Value::Empty
            }
            "Maximize" => {
                self.window = WindowState::Maximized;
                Value::Empty
            }
            "Restore" => {
                self.window = WindowState::Normal;
                Value::Empty
            }
            "Activate" => Value::Empty,
            "MenuCommand" => {
                let id = int_arg(args, 0)?;
                self.menu_commands.push(id);
                Value::Empty
            }
            "Status" => {
                if args.len() < 2 {
                    return Err(invalid_arg("Status requires two output arguments"));
                }
                args[0] = Value::Int(self.stop_code);
                args[1] = Value::Int(self.stop_code_index);
                Value::Empty
            }
            "Demand" | "Channel" => {
                let mut arr = float_array_arg(args, 0)?;
                for (i, v) in arr.iter_mut().enumerate() {
                    *v = self.live_value(i);
                }
                Value::FloatArray(arr)
            }
            "Control" | "Output" | "RearInput" => {
                let mut arr = float_array_arg(args, 0)?;
                for (i, v) in arr.iter_mut().enumerate() {
                    *v = self.live_value(i) * 0.5;
                }
                args[0] = Value::FloatArray(arr);
                Value::Empty
            }
            "Vector" => {
                let code = int_arg(args, 1)?;
                let Some(Value::FloatMatrix(matrix)) = args.get_mut(0) else {
                    return Err(invalid_arg("Vector requires a float matrix"));
                };
                self.fill_vector(code, matrix)?;
                args[0].clone()
            }
            "VectorLength" => Value::index(self.vector_rows(int_arg(args, 0)?)?),
            "VectorUnit" => Value::Str(self.vector_unit_label(int_arg(args, 0)?)?.0),
            "VectorLabel" => Value::Str(self.vector_unit_label(int_arg(args, 0)?)?.1),
            "ControlUnit" => {
                self.output_loop(args)?;
                Value::Str(self.channels.first().map(|c| c.unit.clone()).unwrap_or_default())
            }
            "ControlLabel" => {
                let lp = self.output_loop(args)?;
                Value::Str(format!("Control {}", lp + 1))
            }
            "ChannelUnit" => Value::Str(self.channels[self.channel(args, 0)?].unit.clone()),
            "ChannelLabel" => Value::Str(self.channels[self.channel(args, 0)?].label.clone()),
            "RearInputUnit" | "RearInputLabel" => {
                let ch = int_arg(args, 0)?;
                if !(0..REAR_INPUT_CHANNELS as i32).contains(&ch) {
                    return Err(bad_index(format!("Invalid rear input {ch}")));
                }
                Value::Str(if member == "RearInputUnit" {
                    "V".to_string()
                } else {
                    format!("Rear Input {}", ch + 1)
                })
            }
            "ReportField" => {
                let field = str_arg(args, 0)?;
                match field {
                    "TestName" => Value::Str(self.loaded_test.clone().unwrap_or_default()),
                    "TestType" => Value::Str(self.test_type.label().to_string()),
                    "SoftwareVersion" => Value::Str(self.config.software_version.clone()),
                    _ => return Err(exception(format!("Unknown report field '{field}'"))),
                }
            }
            "InputCalDate" => Value::Str(self.channels[self.channel(args, 0)?].cal_date.clone()),
            "InputSerialNumber" => Value::Str(self.channels[self.channel(args, 0)?].serial_number.clone()),
            "InputSensitivity" => Value::Float(self.channels[self.channel(args, 0)?].sensitivity),
            "InputEngineeringScale" => Value::Float(self.channels[self.channel(args, 0)?].engineering_scale),
            "HardwareSupportsCapacitorCoupled" => {
                Value::Bool(self.channels[self.channel(args, 0)?].supports_capacitor_coupled)
            }
            "HardwareSupportsAccelPowerSource" => {
                Value::Bool(self.channels[self.channel(args, 0)?].supports_accel_power_source)
            }
            "HardwareSupportsDifferential" => {
                Value::Bool(self.channels[self.channel(args, 0)?].supports_differential)
            }
            "InputMode" => {
                let ch = self.channel(args, 0)?;
                let power = bool_value(arg(args, 1)?)?;
                let cap = bool_value(arg(args, 2)?)?;
                let diff = bool_value(arg(args, 3)?)?;
                let channel = &self.channels[ch];
                require_capability(power, channel.supports_accel_power_source, "accelerometer power")?;
                require_capability(cap, channel.supports_capacitor_coupled, "capacitor coupling")?;
                require_capability(diff, channel.supports_differential, "differential input")?;
                let channel = &mut self.channels[ch];
                channel.accel_power_source = power;
                channel.capacitor_coupled = cap;
                channel.differential = diff;
                Value::Empty
            }
            "InputCalibration" => {
                let ch = self.channel(args, 0)?;
                let sensitivity = float_value(arg(args, 1)?)?;
                let serial = str_arg(args, 2)?.to_string();
                let date = str_arg(args, 3)?.to_string();
                let channel = &mut self.channels[ch];
                channel.sensitivity = sensitivity;
                channel.serial_number = serial;
                channel.cal_date = date;
                Value::Empty
            }
            "Teds" => {
                let ch = self.channel(args, 0)?;
                let entries = self.channels[ch].teds.clone();
                let Some(Value::StrMatrix(buffer)) = args.get_mut(1) else {
                    return Err(invalid_arg("Teds requires a string matrix"));
                };
                for (row, (key, value)) in buffer.iter_mut().zip(entries) {
                    if row.len() < 2 {
                        return Err(invalid_arg("Teds rows require two columns"));
                    }
                    row[0] = key;
                    row[1] = value;
                }
                args[1].clone()
            }
            "SweepUp" | "SweepDown" | "SweepResonanceHold" => {
                self.require_sine_running()?;
                self.hold = member == "SweepResonanceHold";
                Value::Empty
            }
            "SweepStepUp" => {
                self.require_sine_running()?;
                self.sine_frequency = self.sine_frequency.floor() + 1.0;
                Value::Empty
            }
            "SweepStepDown" => {
                self.require_sine_running()?;
                self.sine_frequency = (self.sine_frequency.ceil() - 1.0).max(1.0);
                Value::Empty
            }
            "SweepHold" => {
                self.require_sine_running()?;
                self.hold = true;
                Value::Empty
            }
            "RecordStart" => {
                if self.record == RecordState::Idle {
                    self.record_count += 1;
                    self.record_filename =
                        format!("C:\\VibrationVIEW\\Data\\Recording{:03}.vfw", self.record_count);
                }
                self.record = RecordState::Recording;
                Value::Empty
            }
            "RecordPause" => {
                if self.record == RecordState::Idle {
                    return Err(exception("Not recording"));
                }
                self.record = RecordState::Paused;
                Value::Empty
            }
            "RecordStop" => {
                self.record = RecordState::Idle;
                Value::Empty
            }
            _ => self.read(member, args)?,
        };
        Ok(value)
    }
}

/// Transport handing out [`MockEndpoint`]s that share one simulated instance.
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Create a simulated instance with the given shape.
    pub fn new(config: MockConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new(config))),
        }
    }

    /// Replace the live configuration of one channel.
    pub fn set_channel(&self, index: usize, channel: MockChannel) {
        let mut state = self.state.lock();
        if let Some(slot) = state.channels.get_mut(index) {
            *slot = channel;
        }
    }

    /// Live configuration of one channel.
    pub fn channel(&self, index: usize) -> Option<MockChannel> {
        self.state.lock().channels.get(index).cloned()
    }

    /// Register an input configuration file. Channels beyond `channels` fall back
    /// to the default configuration when the file is applied.
    pub fn add_input_configuration(&self, path: impl Into<String>, channels: Vec<MockChannel>) {
        self.state.lock().input_configs.insert(path.into(), channels);
    }

    /// Make every subsequent access to `member` raise.
    pub fn fail_member(&self, member: &str) {
        self.state.lock().failing.insert(member.to_string());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Make per-thread transport initialization fail.
    pub fn fail_transport_init(&self, fail: bool) {
        self.state.lock().fail_transport_init = fail;
    }

    /// Make `dispatch` fail as if the server were not registered.
    pub fn fail_dispatch(&self, fail: bool) {
        self.state.lock().fail_dispatch = fail;
    }

    /// Simulate the controller aborting the running test.
    pub fn abort_test(&self, stop_code: i32, stop_code_index: i32) {
        let mut state = self.state.lock();
        state.run = RunState::Aborted;
        state.stop_code = stop_code;
        state.stop_code_index = stop_code_index;
    }

    /// Number of `IsReady` reads so far.
    pub fn ready_checks(&self) -> u32 {
        self.state.lock().ready_checks
    }

    /// Number of per-thread transport initializations.
    pub fn transport_inits(&self) -> u32 {
        self.state.lock().transport_inits
    }

    /// Number of per-thread transport teardowns.
    pub fn transport_uninits(&self) -> u32 {
        self.state.lock().transport_uninits
    }

    /// Current window state.
    pub fn window_state(&self) -> WindowState {
        self.state.lock().window
    }

    /// Menu command ids received so far.
    pub fn menu_commands(&self) -> Vec<i32> {
        self.state.lock().menu_commands.clone()
    }

    /// Paths passed to `SaveData`.
    pub fn saved_data(&self) -> Vec<String> {
        self.state.lock().saved_data.clone()
    }

    /// Whether an edit session is open.
    pub fn edit_open(&self) -> bool {
        self.state.lock().edit_open
    }

    /// Get a copy of the call log for verification
    pub fn call_log(&self) -> Vec<String> {
        self.state.lock().call_log.clone()
    }

    /// Clear the call log
    pub fn clear_call_log(&self) {
        self.state.lock().call_log.clear();
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl Connector for MockConnector {
    fn initialize_thread(&self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        if state.fail_transport_init {
            return Err(RemoteError::new(
                CO_E_NOTINITIALIZED,
                "transport",
                "Transport initialization failed",
            ));
        }
        state.transport_inits += 1;
        Ok(())
    }

    fn uninitialize_thread(&self) {
        self.state.lock().transport_uninits += 1;
    }

    fn dispatch(&self, prog_id: &str) -> RemoteResult<Box<dyn Endpoint>> {
        if self.state.lock().fail_dispatch {
            return Err(RemoteError::new(
                REGDB_E_CLASSNOTREG,
                "transport",
                format!("Class not registered: {prog_id}"),
            ));
        }
        debug!(prog_id, "Mock endpoint dispatched");
        Ok(Box::new(MockEndpoint {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Handle on the simulated instance.
#[derive(Debug)]
pub struct MockEndpoint {
    state: Arc<Mutex<MockState>>,
}

impl MockEndpoint {
    fn enter(&self, member: &str) -> RemoteResult<parking_lot::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock();
        state.call_log.push(member.to_string());
        if state.failing.contains(member) {
            return Err(exception(format!("Injected failure in {member}")));
        }
        Ok(state)
    }
}

impl Endpoint for MockEndpoint {
    fn get(&self, member: &str, args: &[Value]) -> RemoteResult<Value> {
        self.enter(member)?.read(member, args)
    }

    fn put(&self, member: &str, args: &[Value], value: Value) -> RemoteResult<()> {
        self.enter(member)?.write(member, args, value)
    }

    fn call(&self, member: &str, args: &mut [Value]) -> RemoteResult<Value> {
        self.enter(member)?.invoke(member, args)
    }
}

fn test_type_for_path(path: &str) -> Option<TestType> {
    let ext = std::path::Path::new(path)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "vsp" => Some(TestType::Sine),
        "vrp" => Some(TestType::Random),
        "vkp" => Some(TestType::Shock),
        "vtp" => Some(TestType::Transient),
        "vcp" => Some(TestType::SystemCheck),
        _ => None,
    }
}

fn require_capability(requested: bool, supported: bool, what: &str) -> RemoteResult<()> {
    if requested && !supported {
        return Err(invalid_arg(format!("Hardware does not support {what}")));
    }
    Ok(())
}

fn exception(description: impl Into<String>) -> RemoteError {
    RemoteError::new(DISP_E_EXCEPTION, MOCK_SOURCE, description)
}

fn bad_index(description: impl Into<String>) -> RemoteError {
    RemoteError::new(DISP_E_BADINDEX, MOCK_SOURCE, description)
}

fn invalid_arg(description: impl Into<String>) -> RemoteError {
    RemoteError::new(E_INVALIDARG, MOCK_SOURCE, description)
}

fn member_not_found(member: &str) -> RemoteError {
    RemoteError::new(DISP_E_MEMBERNOTFOUND, MOCK_SOURCE, format!("Unknown name: {member}"))
}

fn arg(args: &[Value], position: usize) -> RemoteResult<&Value> {
    args.get(position)
        .ok_or_else(|| invalid_arg(format!("Missing argument {position}")))
}

fn int_arg(args: &[Value], position: usize) -> RemoteResult<i32> {
    int_value(arg(args, position)?)
}

fn str_arg(args: &[Value], position: usize) -> RemoteResult<&str> {
    str_value(arg(args, position)?)
}

fn float_array_arg(args: &[Value], position: usize) -> RemoteResult<Vec<f64>> {
    match arg(args, position)? {
        Value::FloatArray(v) => Ok(v.clone()),
        other => Err(invalid_arg(format!("Expected float array, got {}", other.kind()))),
    }
}

fn int_value(value: &Value) -> RemoteResult<i32> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(invalid_arg(format!("Expected int, got {}", other.kind()))),
    }
}

fn float_value(value: &Value) -> RemoteResult<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(f64::from(*i)),
        other => Err(invalid_arg(format!("Expected float, got {}", other.kind()))),
    }
}

fn bool_value(value: &Value) -> RemoteResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(i) => Ok(*i != 0),
        other => Err(invalid_arg(format!("Expected bool, got {}", other.kind()))),
    }
}

fn str_value(value: &Value) -> RemoteResult<&str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(invalid_arg(format!("Expected string, got {}", other.kind()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(connector: &MockConnector) -> Box<dyn Endpoint> {
        connector.dispatch("VibrationVIEW.TestControl").unwrap()
    }

    #[test]
    fn test_ready_after_configured_checks() {
        let connector = MockConnector::new(MockConfig {
            ready_after_checks: 3,
            ..MockConfig::default()
        });
        let ep = endpoint(&connector);
        assert_eq!(ep.get("IsReady", &[]).unwrap(), Value::Bool(false));
        assert_eq!(ep.get("IsReady", &[]).unwrap(), Value::Bool(false));
        assert_eq!(ep.get("IsReady", &[]).unwrap(), Value::Bool(true));
        assert_eq!(connector.ready_checks(), 3);
    }

    #[test]
    fn test_start_passes_through_starting() {
        let connector = MockConnector::default();
        let ep = endpoint(&connector);
        ep.call("OpenTest", &mut [Value::from("Sine.vsp")]).unwrap();
        ep.call("StartTest", &mut []).unwrap();

        assert_eq!(ep.get("Starting", &[]).unwrap(), Value::Bool(true));
        assert_eq!(ep.get("Running", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_start_without_test_fails() {
        let connector = MockConnector::default();
        let err = endpoint(&connector).call("StartTest", &mut []).unwrap_err();
        assert_eq!(err.code, DISP_E_EXCEPTION);
    }

    #[test]
    fn test_status_fills_output_arguments() {
        let connector = MockConnector::default();
        connector.abort_test(12, 3);
        let mut args = [Value::Int(0), Value::Int(0)];
        endpoint(&connector).call("Status", &mut args).unwrap();
        assert_eq!(args, [Value::Int(12), Value::Int(3)]);
    }

    #[test]
    fn test_invalid_channel_is_bad_index() {
        let connector = MockConnector::default();
        let err = endpoint(&connector)
            .call("ChannelLabel", &mut [Value::Int(16)])
            .unwrap_err();
        assert_eq!(err.code, DISP_E_BADINDEX);
    }

    #[test]
    fn test_injected_failure_and_call_log() {
        let connector = MockConnector::default();
        connector.fail_member("SoftwareVersion");
        let ep = endpoint(&connector);
        assert!(ep.get("SoftwareVersion", &[]).is_err());
        connector.clear_failures();
        assert!(ep.get("SoftwareVersion", &[]).is_ok());
        assert_eq!(connector.call_log(), vec!["SoftwareVersion", "SoftwareVersion"]);

        connector.clear_call_log();
        assert!(connector.call_log().is_empty());
    }

    #[test]
    fn test_input_configuration_file_applies_and_pads() {
        let connector = MockConnector::default();
        connector.add_input_configuration(
            "one.vic",
            vec![MockChannel {
                sensitivity: 100.0,
                ..MockChannel::default()
            }],
        );
        connector.set_channel(
            5,
            MockChannel {
                label: "Force".into(),
                ..MockChannel::default()
            },
        );

        endpoint(&connector)
            .put("InputConfigurationFile", &[], Value::from("one.vic"))
            .unwrap();

        assert_eq!(connector.channel(0).unwrap().sensitivity, 100.0);
        assert_eq!(connector.channel(5).unwrap(), MockChannel::default());
        assert!(endpoint(&connector)
            .put("InputConfigurationFile", &[], Value::from("missing.vic"))
            .is_err());
    }

    #[test]
    fn test_unsupported_capability_rejected() {
        let connector = MockConnector::default();
        connector.set_channel(
            2,
            MockChannel {
                supports_differential: false,
                ..MockChannel::default()
            },
        );
        let ep = endpoint(&connector);
        assert!(ep.put("InputDifferential", &[Value::Int(2)], Value::Bool(true)).is_err());
        assert!(ep.put("InputDifferential", &[Value::Int(2)], Value::Bool(false)).is_ok());
    }
}
