//! Write operations produced by the timing parser

/// Kind of payload a write operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    SampleBlock,
    EventBatch,
}

/// Payload of a write operation.
///
/// Offsets are absolute byte positions: into the `samples` file for sample blocks,
/// into the resident event blob for event batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    SampleBlock { sample_count: u32, byte_offset: u64, byte_size: usize },
    EventBatch { event_count: u32, byte_offset: usize, byte_size: usize },
}

/// One scheduled unit of playback work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteOperation {
    /// Seconds after T0 (the header transmission) before which this must not be sent
    pub scheduled_time: f64,

    /// What gets sent
    pub payload: Payload,

    /// 1-based line of the timing script this came from
    pub line: usize,
}

impl WriteOperation {
    pub fn kind(&self) -> OperationKind {
        match self.payload {
            Payload::SampleBlock { .. } => OperationKind::SampleBlock,
            Payload::EventBatch { .. } => OperationKind::EventBatch,
        }
    }

    pub fn is_sample_block(&self) -> bool {
        matches!(self.payload, Payload::SampleBlock { .. })
    }

    /// Number of samples, zero for event batches.
    pub fn sample_count(&self) -> u32 {
        match self.payload {
            Payload::SampleBlock { sample_count, .. } => sample_count,
            Payload::EventBatch { .. } => 0,
        }
    }

    /// Number of events, zero for sample blocks.
    pub fn event_count(&self) -> u32 {
        match self.payload {
            Payload::SampleBlock { .. } => 0,
            Payload::EventBatch { event_count, .. } => event_count,
        }
    }

    /// Exact number of payload bytes transmitted for this operation.
    pub fn byte_size(&self) -> usize {
        match self.payload {
            Payload::SampleBlock { byte_size, .. } | Payload::EventBatch { byte_size, .. } => {
                byte_size
            }
        }
    }
}
