// src/module.rs
//
// Host-facing adapter: turns host calls into the fixed native entry points.

use std::fmt;

use log::debug;

use crate::native::NativeEngine;

/// Rejection code used when the native engine refuses to start.
pub const START_FAILED: &str = "JUNO_START_FAILED";

/// Rejection message paired with `START_FAILED`.
pub const START_FAILED_MESSAGE: &str = "Failed to start Juno audio engine";

/// A coded rejection, as delivered to a host promise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ModuleError {
    pub code: &'static str,
    pub message: &'static str,
}

impl ModuleError {
    pub fn start_failed() -> Self {
        Self {
            code: START_FAILED,
            message: START_FAILED_MESSAGE,
        }
    }
}

/// A one-shot completion handle for asynchronous host calls.
pub trait Promise {
    fn settle(self, result: Result<bool, ModuleError>);

    fn resolve(self, value: bool)
    where
        Self: Sized,
    {
        self.settle(Ok(value));
    }

    fn reject(self, error: ModuleError)
    where
        Self: Sized,
    {
        self.settle(Err(error));
    }
}

impl<F> Promise for F
where
    F: FnOnce(Result<bool, ModuleError>),
{
    fn settle(self, result: Result<bool, ModuleError>) {
        self(result)
    }
}

/// Bridge adapter exposing the Juno engine to a host runtime.
///
/// Holds no state of its own; every call goes straight to the engine.
pub struct JunoEngineModule<E: NativeEngine> {
    engine: E,
}

impl<E: NativeEngine> JunoEngineModule<E> {
    pub const NAME: &'static str = "JunoEngineModule";

    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Start the engine and settle `promise` with the outcome.
    pub fn start(&self, sample_rate: i32, block_size: i32, promise: impl Promise) {
        promise.settle(self.try_start(sample_rate, block_size));
    }

    pub fn try_start(&self, sample_rate: i32, block_size: i32) -> Result<bool, ModuleError> {
        if self.engine.native_start(sample_rate, block_size) {
            Ok(true)
        } else {
            Err(ModuleError::start_failed())
        }
    }

    pub fn stop(&self) {
        self.engine.native_stop();
    }

    pub fn note_on(&self, note: i32, velocity: f64) {
        self.engine.native_note_on(note, velocity as f32);
    }

    pub fn note_off(&self, note: i32) {
        self.engine.native_note_off(note);
    }

    pub fn set_parameter(&self, parameter_id: &str, value: f64) {
        self.engine.native_set_param(parameter_id, value as f32);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Dynamic Dispatch
// ═══════════════════════════════════════════════════════════════════

/// A dynamically typed argument or return value from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl HostValue {
    fn kind(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Host `int` coercion: truncate toward zero, saturate, NaN is 0.
    fn as_i32(&self) -> Option<i32> {
        self.as_f64().map(|n| n as i32)
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Number(n) => write!(f, "{n}"),
            HostValue::String(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("`{method}` takes {expected} arguments, got {actual}")]
    ArgumentCount {
        method: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("`{method}` argument {index} must be a {expected}, got {actual}")]
    ArgumentType {
        method: &'static str,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Rejected(#[from] ModuleError),
}

/// A module callable by method name.
pub trait NativeModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Method names the host may call.
    fn methods(&self) -> &'static [&'static str];

    fn invoke(&self, method: &str, args: &[HostValue]) -> Result<Option<HostValue>, InvokeError>;
}

const METHODS: [&str; 5] = ["start", "stop", "noteOn", "noteOff", "setParameter"];

struct Args<'a> {
    method: &'static str,
    values: &'a [HostValue],
}

impl<'a> Args<'a> {
    fn new(
        method: &'static str,
        values: &'a [HostValue],
        expected: usize,
    ) -> Result<Self, InvokeError> {
        if values.len() != expected {
            return Err(InvokeError::ArgumentCount {
                method,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { method, values })
    }

    fn get<T>(
        &self,
        index: usize,
        expected: &'static str,
        convert: impl FnOnce(&'a HostValue) -> Option<T>,
    ) -> Result<T, InvokeError> {
        let value: &'a HostValue = &self.values[index];
        convert(value).ok_or(InvokeError::ArgumentType {
            method: self.method,
            index,
            expected,
            actual: value.kind(),
        })
    }

    fn int(&self, index: usize) -> Result<i32, InvokeError> {
        self.get(index, "number", HostValue::as_i32)
    }

    fn number(&self, index: usize) -> Result<f64, InvokeError> {
        self.get(index, "number", HostValue::as_f64)
    }

    fn string(&self, index: usize) -> Result<&'a str, InvokeError> {
        self.get(index, "string", HostValue::as_str)
    }
}

impl<E: NativeEngine> NativeModule for JunoEngineModule<E> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        &METHODS
    }

    fn invoke(&self, method: &str, args: &[HostValue]) -> Result<Option<HostValue>, InvokeError> {
        debug!("invoke {method} with {} args", args.len());

        match method {
            "start" => {
                let args = Args::new("start", args, 2)?;
                let (sample_rate, block_size) = (args.int(0)?, args.int(1)?);
                let started = self.try_start(sample_rate, block_size)?;
                Ok(Some(HostValue::Bool(started)))
            }
            "stop" => {
                Args::new("stop", args, 0)?;
                self.stop();
                Ok(None)
            }
            "noteOn" => {
                let args = Args::new("noteOn", args, 2)?;
                let (note, velocity) = (args.int(0)?, args.number(1)?);
                self.note_on(note, velocity);
                Ok(None)
            }
            "noteOff" => {
                let args = Args::new("noteOff", args, 1)?;
                self.note_off(args.int(0)?);
                Ok(None)
            }
            "setParameter" => {
                let args = Args::new("setParameter", args, 2)?;
                let (id, value) = (args.string(0)?, args.number(1)?);
                self.set_parameter(id, value);
                Ok(None)
            }
            other => Err(InvokeError::UnknownMethod(other.to_owned())),
        }
    }
}
