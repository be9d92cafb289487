//! Core playback data types.
//!
//! - [`DataType`] maps the buffer's data type codes to their sizes, which together with
//!   the channel count gives the sample stride
//! - [`WriteOperation`] is one scheduled write: a sample block or an event batch with the
//!   time (relative to the header transmission) before which it must not be sent
//!
//! ```rust
//! use ftplayback::types::{DataType, OperationKind, Payload, WriteOperation};
//!
//! let op = WriteOperation {
//!     scheduled_time: 0.5,
//!     payload: Payload::SampleBlock { sample_count: 100, byte_offset: 0, byte_size: 800 },
//!     line: 1,
//! };
//! assert_eq!(op.kind(), OperationKind::SampleBlock);
//! assert_eq!(op.event_count(), 0);
//! assert_eq!(op.byte_size(), 100 * 4 * DataType::Int16.size());
//! ```

mod data_type;
mod operation;

pub use data_type::DataType;
pub use operation::{OperationKind, Payload, WriteOperation};
