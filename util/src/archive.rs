//! CSV archiving functionality
//!
//! Mission telemetry is written as `{time_s, field, value}` rows so that any
//! number of fields can share a single file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::WriterBuilder;
pub use csv::Writer;
use eqpt_if::eqpt::tm::{Telemetry, TmValue};
use log::warn;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>
}

/// Telemetry sink writing every record into an archive file.
pub struct TelemetryArchive {
    arch: Archiver,

    /// Number of records that could not be written
    pub num_failed: u64,
}

#[derive(Serialize)]
struct TmRecord<'a> {
    time_s: f64,
    field: &'a str,
    value: String
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot open the archive file: {0}")]
    FileError(std::io::Error),

    #[error("Cannot write record: {0}")]
    WriteError(csv::Error),

    #[error("The archiver has no initialised writer")]
    NotInitialised,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        Self::from_file_path(session.arch_root.join(path))
    }

    /// Create a new archiver writing to the given file, truncating it.
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        // Create the file if it does not exist
        File::create(path.as_ref()).map_err(ArchiveError::FileError)?;

        // Open the file in append mode
        let file = OpenOptions::new()
            .append(true)
            .open(path.as_ref())
            .map_err(ArchiveError::FileError)?;

        let w = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            writer: Some(w)
        })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        match self.writer {
            Some(ref mut w) => {
                w.serialize(record).map_err(ArchiveError::WriteError)?;
                w.flush().map_err(|e| ArchiveError::WriteError(e.into()))?;
            },
            None => return Err(ArchiveError::NotInitialised)
        }

        Ok(())
    }
}

impl TelemetryArchive {
    /// Open `telemetry.csv` in the session's archive directory.
    pub fn new(session: &Session) -> Result<Self, ArchiveError> {
        Ok(Self {
            arch: Archiver::from_path(session, "telemetry.csv")?,
            num_failed: 0
        })
    }

    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        Ok(Self {
            arch: Archiver::from_file_path(path)?,
            num_failed: 0
        })
    }
}

impl Telemetry for TelemetryArchive {
    fn record(&mut self, time_s: f64, field: &str, value: TmValue) {
        let rec = TmRecord {
            time_s,
            field,
            value: value.to_string()
        };

        // Telemetry loss must never stop the mission
        if let Err(e) = self.arch.serialise(rec) {
            self.num_failed += 1;
            warn!("Could not archive telemetry field {}: {}", field, e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_telemetry_archive() {
        let path = std::env::temp_dir()
            .join(format!("cansat_tm_{}.csv", std::process::id()));

        {
            let mut tm = TelemetryArchive::from_file_path(&path).unwrap();
            tm.record(0.5, "phase", TmValue::from(1.0));
            tm.record(1.0, "camera_order", TmValue::from("go to the goal"));
            assert_eq!(tm.num_failed, 0);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines[0], "time_s,field,value");
        assert_eq!(lines[1], "0.5,phase,1");
        assert_eq!(lines[2], "1.0,camera_order,go to the goal");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_uninitialised_archiver() {
        let mut arch = Archiver::default();
        assert!(matches!(
            arch.serialise(TmRecord { time_s: 0.0, field: "x", value: String::new() }),
            Err(ArchiveError::NotInitialised)
        ));
    }
}
