//! Real-time dispatch of write operations
//!
//! The scheduler reads the first sample block, sends the capture header, takes that
//! instant as T0, and then walks the operations in the order it was given. An operation
//! is never sent before `T0 + scheduled_time / speed`; if the loop is already late it
//! sends immediately and keeps going, there is no upper bound and nothing is dropped.
//!
//! Sample blocks go through one reusable buffer. Right after a block is sent, the next
//! sample block (skipping event batches) is read into it, so disk reads happen while the
//! loop would otherwise be waiting for the next due time.

use std::io::{Read, Seek};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::capture::format::{DATA_DEF_SIZE, DataDef};
use crate::capture::{CaptureHeader, EventBlob, SampleFile};
use crate::config::PlaybackConfig;
use crate::protocol::{BufferClient, Command};
use crate::types::{Payload, WriteOperation};
use crate::{PlaybackError, Result};

/// Behaviour switches for a playback run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerOptions {
    /// Fail on the first failed or rejected request
    pub strict: bool,
    /// Playback speed multiplier, must be positive
    pub speed: f64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self { strict: false, speed: 1.0 }
    }
}

impl From<&PlaybackConfig> for SchedulerOptions {
    fn from(config: &PlaybackConfig) -> Self {
        Self { strict: config.strict, speed: config.speed }
    }
}

/// Where the scheduler is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    HeaderSent,
    /// Index of the operation being dispatched
    Dispatching(usize),
    Done,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    /// Operations dispatched, excluding the header
    pub operations: usize,
    pub samples_sent: u64,
    pub events_sent: u64,
    /// Requests that failed in transport or were not acknowledged, header included
    pub failed_requests: usize,
    /// Largest delay of a dispatch behind its due time
    pub max_lag: Duration,
}

/// Reusable payload buffer for data requests: data record followed by sample bytes.
struct SampleBuffer {
    buf: Vec<u8>,
    loaded: Option<usize>,
}

impl SampleBuffer {
    fn allocate(max_sample_bytes: Option<usize>) -> Result<Self> {
        let mut buf = Vec::new();
        if let Some(max) = max_sample_bytes {
            let bytes = DATA_DEF_SIZE + max;
            buf.try_reserve_exact(bytes)
                .map_err(|_| PlaybackError::out_of_memory("the sample buffer", bytes))?;
            debug!("Allocated sample buffer of {} bytes", bytes);
        }
        Ok(Self { buf, loaded: None })
    }

    fn load<R: Read + Seek>(
        &mut self,
        index: usize,
        op: &WriteOperation,
        header: &CaptureHeader,
        samples: &mut SampleFile<R>,
    ) -> Result<()> {
        let Payload::SampleBlock { sample_count, byte_offset, byte_size } = op.payload else {
            return Ok(());
        };
        let bufsize = u32::try_from(byte_size).map_err(|_| PlaybackError::Parse {
            context: format!("sample block on timing line {}", op.line),
            details: format!("{} bytes do not fit a data request", byte_size),
        })?;

        let def = DataDef {
            nchans: header.nchans(),
            nsamples: sample_count,
            data_type: header.data_type()?.code(),
            bufsize,
        };
        self.buf.clear();
        self.buf.extend_from_slice(&def.to_le_bytes());
        self.buf.resize(DATA_DEF_SIZE + byte_size, 0);
        samples.read_block(byte_offset, &mut self.buf[DATA_DEF_SIZE..])?;

        trace!("Pre-loaded {} samples for operation {}", sample_count, index);
        self.loaded = Some(index);
        Ok(())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Dispatch loop over one set of operations.
pub struct Scheduler<'a, R> {
    operations: &'a [WriteOperation],
    header: &'a CaptureHeader,
    samples: &'a mut SampleFile<R>,
    events: &'a EventBlob,
    options: SchedulerOptions,
    state: PlaybackState,
}

impl<'a, R: Read + Seek> Scheduler<'a, R> {
    /// `operations` are dispatched in slice order.
    pub fn new(
        operations: &'a [WriteOperation],
        header: &'a CaptureHeader,
        samples: &'a mut SampleFile<R>,
        events: &'a EventBlob,
        options: SchedulerOptions,
    ) -> Self {
        Self { operations, header, samples, events, options, state: PlaybackState::Idle }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Send the header and every operation through `client`.
    ///
    /// Per-request failures are logged and counted unless the options are strict. Sample
    /// read failures and allocation failures always end the run.
    pub async fn run<C>(&mut self, client: &mut C) -> Result<PlaybackReport>
    where
        C: BufferClient + ?Sized,
    {
        if !self.options.speed.is_finite() || self.options.speed <= 0.0 {
            return Err(PlaybackError::config(format!(
                "speed must be a positive number, got {}",
                self.options.speed
            )));
        }

        let operations = self.operations;
        let events = self.events;
        let mut report = PlaybackReport::default();

        let max_sample_bytes = operations
            .iter()
            .filter(|op| op.is_sample_block())
            .map(|op| op.byte_size())
            .max();
        let mut buffer = SampleBuffer::allocate(max_sample_bytes)?;

        if let Some(first) = next_sample_block(operations, 0) {
            buffer.load(first, &operations[first], self.header, self.samples)?;
        }

        let t0 = Instant::now();
        info!("Writing header...");
        self.exchange(client, Command::PutHdr, self.header.as_bytes(), &mut report).await?;
        self.state = PlaybackState::HeaderSent;

        for (index, op) in operations.iter().enumerate() {
            self.state = PlaybackState::Dispatching(index);

            let offset = self.due_offset(op);
            let due = t0.checked_add(offset).ok_or_else(|| {
                PlaybackError::config(format!(
                    "timing line {} is scheduled too far in the future",
                    op.line
                ))
            })?;
            if Instant::now() < due {
                sleep_until(due).await;
            }
            let elapsed = t0.elapsed();
            report.max_lag = report.max_lag.max(elapsed.saturating_sub(offset));

            match op.payload {
                Payload::SampleBlock { sample_count, .. } => {
                    if buffer.loaded != Some(index) {
                        buffer.load(index, op, self.header, self.samples)?;
                    }
                    info!("{:.3}: Writing {} samples", elapsed.as_secs_f64(), sample_count);
                    self.exchange(client, Command::PutDat, buffer.as_bytes(), &mut report).await?;
                    report.samples_sent += u64::from(sample_count);

                    if let Some(next) = next_sample_block(operations, index + 1) {
                        buffer.load(next, &operations[next], self.header, self.samples)?;
                    }
                }
                Payload::EventBatch { event_count, byte_offset, byte_size } => {
                    let payload = events.slice(byte_offset, byte_size).ok_or(
                        PlaybackError::EventOverrun {
                            line: op.line,
                            requested: event_count,
                            walked: 0,
                            offset: byte_offset,
                        },
                    )?;
                    info!("{:.3}: Writing {} event(s)", elapsed.as_secs_f64(), event_count);
                    self.exchange(client, Command::PutEvt, payload, &mut report).await?;
                    report.events_sent += u64::from(event_count);
                }
            }
            report.operations += 1;
        }

        self.state = PlaybackState::Done;
        info!("Done!");
        Ok(report)
    }

    fn due_offset(&self, op: &WriteOperation) -> Duration {
        Duration::try_from_secs_f64(op.scheduled_time / self.options.speed)
            .unwrap_or(Duration::MAX)
    }

    async fn exchange<C>(
        &self,
        client: &mut C,
        command: Command,
        payload: &[u8],
        report: &mut PlaybackReport,
    ) -> Result<()>
    where
        C: BufferClient + ?Sized,
    {
        let failure = match client.request(command, payload).await {
            Ok(response) if response.acknowledges(command) => return Ok(()),
            Ok(response) => PlaybackError::rejected(command, response.status),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        report.failed_requests += 1;
        if self.options.strict {
            return Err(failure);
        }
        warn!("Error in buffer request: {}", failure);
        Ok(())
    }
}

fn next_sample_block(operations: &[WriteOperation], from: usize) -> Option<usize> {
    operations
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, op)| op.is_sample_block())
        .map(|(index, _)| index)
}
