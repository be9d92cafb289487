//! Replay captured real-time acquisition sessions onto a FieldTrip-style buffer.
//!
//! A capture directory holds what a recorder drained from a live buffer:
//!
//! - `header`: the header record as sent by the acquisition source
//! - `samples`: raw interleaved sample bytes
//! - `events`: concatenated event records
//! - `timing`: one `<S|E> <count> <seconds>` line per write, timed relative to the header
//!
//! Playback turns that back into a live feed: the header is written, and every sample
//! block and event batch follows at (never before) its recorded offset.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ftplayback::{PlaybackConfig, PlaybackSession, Preflight, TcpBufferClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> ftplayback::Result<()> {
//!     let config = PlaybackConfig::default();
//!     let mut session = PlaybackSession::load("/path/to/capture")?;
//!
//!     if session.preflight()? == Preflight::NothingToPlay {
//!         return Ok(());
//!     }
//!
//!     let mut client = TcpBufferClient::connect(&config.host, config.port).await?;
//!     let report = session.play(&mut client, &config).await?;
//!     println!("{} operations sent", report.operations);
//!     client.close().await
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(test)]
mod test_utils;
pub mod types;

// Capture access and parsing
pub mod capture;
pub mod config;
pub mod timing;

// Playback
pub mod protocol;
pub mod scheduler;
pub mod session;

// Core exports
pub use error::*;
pub use types::*;

pub use capture::{CaptureHeader, EventBlob, SampleFile};
pub use config::{DispatchOrder, PlaybackConfig};
pub use protocol::{BufferClient, Command, Response, TcpBufferClient};
pub use scheduler::{PlaybackReport, PlaybackState, Scheduler, SchedulerOptions};
pub use session::{PlaybackSession, Preflight};
pub use timing::{MalformedLine, MalformedReason, TimingScript};
