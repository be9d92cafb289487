//! Playback session: one capture directory, loaded and checked, ready to play.
//!
//! A session owns everything a run needs: the header, the open sample file, the event
//! blob and the parsed timing script. Nothing is process-wide, so several sessions can
//! coexist (tests do exactly that).
//!
//! ```rust,no_run
//! use ftplayback::{PlaybackConfig, PlaybackSession, Preflight, TcpBufferClient};
//!
//! # async fn replay() -> ftplayback::Result<()> {
//! let config = PlaybackConfig::default();
//! let mut session = PlaybackSession::load("/data/capture")?;
//! if let Preflight::Ready { .. } = session.preflight()? {
//!     let mut client = TcpBufferClient::connect(&config.host, config.port).await?;
//!     session.play(&mut client, &config).await?;
//!     client.close().await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{info, warn};

use crate::capture::{CaptureHeader, EventBlob, SampleFile, read_timing};
use crate::config::{DispatchOrder, PlaybackConfig};
use crate::protocol::BufferClient;
use crate::scheduler::{PlaybackReport, Scheduler, SchedulerOptions};
use crate::timing::TimingScript;
use crate::types::WriteOperation;
use crate::{PlaybackError, Result};

/// Outcome of the pre-flight consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    /// The timing script defines neither samples nor events
    NothingToPlay,
    /// Playback can start; `surplus_bytes` sample bytes will never be sent
    Ready { surplus_bytes: u64 },
}

/// Loaded capture plus its parsed timing script.
pub struct PlaybackSession<R = File> {
    header: CaptureHeader,
    samples: SampleFile<R>,
    events: EventBlob,
    script: TimingScript,
}

impl PlaybackSession<File> {
    /// Load and parse a capture directory.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Loading capture from {}", dir.display());

        let header = CaptureHeader::load(dir)?;
        let samples = SampleFile::open(dir)?;
        let events = EventBlob::load(dir)?;
        let timing = read_timing(dir)?;

        Self::from_parts(header, samples, events, &timing)
    }
}

impl<R: Read + Seek> PlaybackSession<R> {
    /// Build a session from already loaded artifacts.
    pub fn from_parts(
        header: CaptureHeader,
        samples: SampleFile<R>,
        events: EventBlob,
        timing: &str,
    ) -> Result<Self> {
        // Checked in preflight, and only when sample blocks are defined
        let stride = header.sample_stride().unwrap_or(0);
        let script = TimingScript::parse(timing, events.as_bytes(), stride)?;
        Ok(Self { header, samples, events, script })
    }

    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    pub fn script(&self) -> &TimingScript {
        &self.script
    }

    pub fn events(&self) -> &EventBlob {
        &self.events
    }

    /// Check the timing script against the sample file.
    ///
    /// Fails with [`PlaybackError::InsufficientSampleData`] when the script needs more
    /// sample bytes than the file holds. A larger file only produces a warning.
    pub fn preflight(&self) -> Result<Preflight> {
        let total_samples = self.script.total_samples();
        let total_events = self.script.total_events();
        if total_samples == 0 && total_events == 0 {
            info!("No samples or events defined");
            return Ok(Preflight::NothingToPlay);
        }

        info!("Total samples: {}  events: {}", total_samples, total_events);
        self.check_sample_layout()?;

        let required = self.script.sample_bytes();
        let available = self.samples.len();
        if required > available {
            return Err(PlaybackError::InsufficientSampleData { required, available });
        }
        if required < available {
            warn!(
                "'samples' file contains {} bytes, but 'timing' definition specifies {} bytes",
                available, required
            );
        }
        Ok(Preflight::Ready { surplus_bytes: available - required })
    }

    /// Play the session through `client`.
    pub async fn play<C>(
        &mut self,
        client: &mut C,
        config: &PlaybackConfig,
    ) -> Result<PlaybackReport>
    where
        C: BufferClient + ?Sized,
    {
        config.validate()?;
        self.check_sample_layout()?;

        if config.order == DispatchOrder::Script {
            if let Some(op) = self.script.first_out_of_order() {
                warn!(
                    "Timing line {} is scheduled before the line preceding it; \
                     operations are sent in script order",
                    op.line
                );
            }
        }

        let plan = dispatch_plan(&self.script, config.order);
        let mut scheduler = Scheduler::new(
            &plan,
            &self.header,
            &mut self.samples,
            &self.events,
            SchedulerOptions::from(config),
        );
        let report = scheduler.run(client).await?;

        info!(
            "Sent {} operations ({} samples, {} events), {} failed requests, max lag {:?}",
            report.operations,
            report.samples_sent,
            report.events_sent,
            report.failed_requests,
            report.max_lag
        );
        Ok(report)
    }

    /// Sample blocks need a header that describes their layout, event-only captures don't.
    fn check_sample_layout(&self) -> Result<()> {
        if self.script.total_samples() > 0 {
            self.header.sample_stride()?;
        }
        Ok(())
    }
}

/// Operations in the order they will be dispatched.
pub fn dispatch_plan(script: &TimingScript, order: DispatchOrder) -> Cow<'_, [WriteOperation]> {
    match order {
        DispatchOrder::Script => Cow::Borrowed(script.operations()),
        DispatchOrder::Time => {
            let mut plan = script.operations().to_vec();
            plan.sort_by(|a, b| a.scheduled_time.total_cmp(&b.scheduled_time));
            Cow::Owned(plan)
        }
    }
}
