//! Capture directory access
//!
//! Provides the on-disk record layouts ([`format`]) and the loaders for the four capture
//! artifacts ([`reader`]).

pub mod format;
pub mod reader;

pub use format::{DataDef, EventDef, HeaderDef};
pub use reader::{CaptureHeader, EventBlob, SampleFile, read_timing};
