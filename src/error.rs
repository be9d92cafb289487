//! Error types for capture playback.
//!
//! All errors implement the `std::error::Error` trait and carry enough structured
//! context to tell the operator which capture file or which request went wrong.
//!
//! ## Error Categories
//!
//! - **File Errors**: a capture artifact is missing or unreadable
//! - **Allocation Errors**: a header, event blob, operation list or sample buffer
//!   could not be reserved
//! - **Format Errors**: the header record or an event record does not describe the data
//! - **Consistency Errors**: the timing script needs more sample bytes than the capture holds
//! - **Protocol Errors**: connection setup, transport failures and rejected writes
//!
//! ## Fatal vs. per-request errors
//!
//! Transport failures and rejected writes are reported per request and playback carries
//! on, unless the run is strict:
//!
//! ```rust
//! use ftplayback::{Command, PlaybackError};
//!
//! let rejected = PlaybackError::rejected(Command::PutDat, 0x0105);
//! assert!(!rejected.is_fatal());
//!
//! let short = PlaybackError::InsufficientSampleData { required: 800, available: 400 };
//! assert!(short.is_fatal());
//! for suggestion in short.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::Command;

/// Result type alias for playback operations.
pub type Result<T, E = PlaybackError> = std::result::Result<T, E>;

/// Main error type for playback operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("Can not read file {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot allocate {bytes} bytes for {context}")]
    OutOfMemory { context: String, bytes: usize },

    #[error("Invalid capture header: {details}")]
    Header { details: String },

    #[error(
        "Timing line {line} asks for {requested} event(s) but the events file ends \
         after {walked} at byte {offset}"
    )]
    EventOverrun { line: usize, requested: u32, walked: u32, offset: usize },

    #[error(
        "'samples' file too small for given 'timing' definition: \
         need {required} bytes, have {available}"
    )]
    InsufficientSampleData { required: u64, available: u64 },

    #[error("Failed to connect to buffer at {address}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport failure during {command:?} request: {details}")]
    Transport {
        command: Command,
        details: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Buffer rejected {command:?} request (response code {status:#06x})")]
    Rejected { command: Command, status: u16 },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },
}

impl PlaybackError {
    /// Returns whether this error ends the run when it occurs.
    ///
    /// Per-request failures are only fatal when playback runs in strict mode; the
    /// scheduler makes that decision, not the error.
    pub fn is_fatal(&self) -> bool {
        match self {
            PlaybackError::Transport { .. } => false,
            PlaybackError::Rejected { .. } => false,
            PlaybackError::File { .. }
            | PlaybackError::OutOfMemory { .. }
            | PlaybackError::Header { .. }
            | PlaybackError::EventOverrun { .. }
            | PlaybackError::InsufficientSampleData { .. }
            | PlaybackError::Connection { .. }
            | PlaybackError::Config { .. }
            | PlaybackError::Parse { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PlaybackError::File { .. } => vec![
                "Check the capture directory contains header, samples, events and timing",
                "Check file permissions",
            ],
            PlaybackError::OutOfMemory { .. } => vec![
                "Free memory or replay a shorter capture",
                "Split very large sample blocks in the timing file",
            ],
            PlaybackError::Header { .. } => vec![
                "Verify the header file was written by a buffer recorder",
                "Check the data type code is a known buffer data type",
            ],
            PlaybackError::EventOverrun { .. } => vec![
                "Check the event counts in the timing file",
                "Verify the events file was not truncated",
            ],
            PlaybackError::InsufficientSampleData { .. } => vec![
                "Verify the samples file was not truncated",
                "Check the sample counts in the timing file",
            ],
            PlaybackError::Connection { .. } => vec![
                "Ensure the buffer server is running",
                "Check hostname and port",
            ],
            PlaybackError::Transport { .. } => vec![
                "Check the buffer server is still reachable",
                "Restart the buffer server",
            ],
            PlaybackError::Rejected { .. } => vec![
                "Check the buffer accepts the replayed header",
                "Flush the buffer before replaying",
            ],
            PlaybackError::Config { .. } => vec!["Check the configuration file and flags"],
            PlaybackError::Parse { .. } => vec!["Verify source data integrity"],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        PlaybackError::File { path, source }
    }

    /// Helper constructor for allocation failures.
    pub fn out_of_memory(context: impl Into<String>, bytes: usize) -> Self {
        PlaybackError::OutOfMemory { context: context.into(), bytes }
    }

    /// Helper constructor for header errors.
    pub fn header(details: impl Into<String>) -> Self {
        PlaybackError::Header { details: details.into() }
    }

    /// Helper constructor for transport failures caused by an I/O error.
    pub fn transport(command: Command, source: std::io::Error) -> Self {
        PlaybackError::Transport { command, details: source.to_string(), source: Some(source) }
    }

    /// Helper constructor for transport failures without an underlying I/O error.
    pub fn transport_protocol(command: Command, details: impl Into<String>) -> Self {
        PlaybackError::Transport { command, details: details.into(), source: None }
    }

    /// Helper constructor for rejected requests.
    pub fn rejected(command: Command, status: u16) -> Self {
        PlaybackError::Rejected { command, status }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        PlaybackError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for PlaybackError {
    fn from(err: std::io::Error) -> Self {
        PlaybackError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
