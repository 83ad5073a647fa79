//! Utility library for the CanSat rover software
//!
//! Session directories, logging, parameter loading, the CSV telemetry archive
//! and the small amount of maths shared between crates.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod archive;
pub mod host;
pub mod logger;
pub mod maths;
pub mod params;
pub mod session;
pub mod time;

// ---------------------------------------------------------------------------
// MACROS
// ---------------------------------------------------------------------------

/// Log an unrecoverable error and panic.
///
/// Only for programming errors. Flight faults degrade instead, and any
/// `eqpt_if::Eqpt` on the unwinding stack stops the motors and drops the
/// lines from its drop guard.
#[macro_export]
macro_rules! raise_error {
    ($($arg:tt)+) => ({
        let msg = std::format!($($arg)+);
        log::error!("Unrecoverable: {}", msg);
        std::panic!("{}", msg);
    });
}
