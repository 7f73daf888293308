//! The remote automation endpoint, as an injected interface.
//!
//! VibrationVIEW is driven through late-bound automation: every operation is a
//! named member that is either read (`get`), written (`put`) or invoked (`call`).
//! Modelling the endpoint with these three signatures keeps the typed call
//! surface independent of the transport, so the same client runs against the
//! live COM server ([`crate::com`]) and the simulated instance ([`crate::mock`]).
//!
//! # Output arrays
//!
//! Several members report their result through the *length* of an array
//! argument: the caller allocates the array at its final size and the endpoint
//! fills it. `call` therefore takes its arguments as `&mut [Value]`; an endpoint
//! may mutate them in place, return a fresh value, or both.

use crate::error::{RemoteResult, VvError};

/// A dynamically typed automation value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value (a member without a return value)
    #[default]
    Empty,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// Double precision float
    Float(f64),
    /// String
    Str(String),
    /// One-dimensional array of doubles
    FloatArray(Vec<f64>),
    /// Row-major two-dimensional array of doubles
    FloatMatrix(Vec<Vec<f64>>),
    /// Row-major two-dimensional array of strings
    StrMatrix(Vec<Vec<String>>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::FloatArray(_) => "float array",
            Value::FloatMatrix(_) => "float matrix",
            Value::StrMatrix(_) => "string matrix",
        }
    }

    fn unexpected(&self, member: &'static str, expected: &'static str) -> VvError {
        VvError::UnexpectedValue {
            member,
            expected,
            found: self.kind().to_string(),
        }
    }

    /// Interpret as a boolean. Automation booleans frequently arrive as integers.
    pub fn into_bool(self, member: &'static str) -> Result<bool, VvError> {
        match self {
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            other => Err(other.unexpected(member, "bool")),
        }
    }

    /// Interpret as an integer.
    pub fn into_i32(self, member: &'static str) -> Result<i32, VvError> {
        match self {
            Value::Int(i) => Ok(i),
            Value::Bool(b) => Ok(i32::from(b)),
            Value::Float(f) if f.fract() == 0.0 && f.abs() <= f64::from(i32::MAX) => Ok(f as i32),
            other => Err(other.unexpected(member, "int")),
        }
    }

    /// Interpret as a float.
    pub fn into_f64(self, member: &'static str) -> Result<f64, VvError> {
        match self {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(f64::from(i)),
            other => Err(other.unexpected(member, "float")),
        }
    }

    /// Interpret as a string. `Empty` reads as the empty string.
    pub fn into_string(self, member: &'static str) -> Result<String, VvError> {
        match self {
            Value::Str(s) => Ok(s),
            Value::Empty => Ok(String::new()),
            other => Err(other.unexpected(member, "string")),
        }
    }

    /// Interpret as a float array.
    pub fn into_float_array(self, member: &'static str) -> Result<Vec<f64>, VvError> {
        match self {
            Value::FloatArray(v) => Ok(v),
            other => Err(other.unexpected(member, "float array")),
        }
    }

    /// Interpret as a float matrix.
    pub fn into_float_matrix(self, member: &'static str) -> Result<Vec<Vec<f64>>, VvError> {
        match self {
            Value::FloatMatrix(m) => Ok(m),
            other => Err(other.unexpected(member, "float matrix")),
        }
    }

    /// Interpret as a string matrix.
    pub fn into_str_matrix(self, member: &'static str) -> Result<Vec<Vec<String>>, VvError> {
        match self {
            Value::StrMatrix(m) => Ok(m),
            other => Err(other.unexpected(member, "string matrix")),
        }
    }

    /// Channel/loop index argument.
    pub fn index(index: usize) -> Self {
        Value::Int(i32::try_from(index).unwrap_or(i32::MAX))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// A live handle on the remote application.
///
/// Implementations are thread-affine: a handle is used on the thread that
/// created it. No `Send` bound is imposed.
pub trait Endpoint {
    /// Read a property. Indexed properties (per channel) take their index in `args`.
    fn get(&self, member: &str, args: &[Value]) -> RemoteResult<Value>;

    /// Write a property.
    fn put(&self, member: &str, args: &[Value], value: Value) -> RemoteResult<()>;

    /// Invoke a method. Arguments are passed by reference and may be mutated.
    fn call(&self, member: &str, args: &mut [Value]) -> RemoteResult<Value>;
}

/// The transport that hands out endpoints.
///
/// The transport needs one-time initialization per thread before any endpoint
/// can be created on that thread; [`crate::session::ThreadRegistry`] decides when
/// to call `initialize_thread`/`uninitialize_thread`.
pub trait Connector: Send + Sync {
    /// Initialize the transport for the calling thread.
    fn initialize_thread(&self) -> RemoteResult<()>;

    /// Release the transport for the calling thread.
    fn uninitialize_thread(&self);

    /// Create a handle on the application registered under `prog_id`.
    fn dispatch(&self, prog_id: &str) -> RemoteResult<Box<dyn Endpoint>>;
}
