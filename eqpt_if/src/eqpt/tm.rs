//! # Telemetry interface

use std::fmt;

/// A telemetry value, either numeric or free text.
#[derive(Debug, Clone, PartialEq)]
pub enum TmValue {
    Num(f64),
    Text(String),
}

/// Fire-and-forget telemetry sink.
///
/// Implementations must never fail the caller, any write problem is theirs
/// to report.
pub trait Telemetry {
    fn record(&mut self, time_s: f64, field: &str, value: TmValue);
}

impl fmt::Display for TmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TmValue::Num(n) => write!(f, "{}", n),
            TmValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for TmValue {
    fn from(v: f64) -> Self {
        TmValue::Num(v)
    }
}

impl From<u32> for TmValue {
    fn from(v: u32) -> Self {
        TmValue::Num(v as f64)
    }
}

impl From<&str> for TmValue {
    fn from(v: &str) -> Self {
        TmValue::Text(v.to_string())
    }
}

impl From<String> for TmValue {
    fn from(v: String) -> Self {
        TmValue::Text(v)
    }
}
