//! Test utilities: capture directory fixtures and in-memory protocol doubles

#![cfg(test)]

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tempfile::TempDir;
use tokio::time::Instant;

use crate::capture::format::{EventDef, HeaderDef};
use crate::capture::reader::{EVENTS_FILE, HEADER_FILE, SAMPLES_FILE, TIMING_FILE};
use crate::protocol::{BufferClient, Command, Response};
use crate::{DataType, PlaybackError, Result};

/// Header blob with the given channel layout and a 250Hz sample rate.
pub fn header_blob(nchans: u32, data_type: DataType) -> Vec<u8> {
    let def = HeaderDef {
        nchans,
        nsamples: 0,
        nevents: 0,
        fsample: 250.0,
        data_type: data_type.code(),
        bufsize: 0,
    };
    let mut bytes = Vec::new();
    let fields = [
        def.nchans,
        def.nsamples,
        def.nevents,
        def.fsample.to_bits(),
        def.data_type,
        def.bufsize,
    ];
    for field in fields {
        bytes.extend_from_slice(&field.to_le_bytes());
    }
    bytes
}

/// Concatenated char-typed event records, one per `(type, value)` pair.
pub fn event_blob(records: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut blob = Vec::new();
    for (kind, value) in records {
        let def = EventDef {
            type_type: DataType::Char.code(),
            type_numel: kind.len() as u32,
            value_type: DataType::Char.code(),
            value_numel: value.len() as u32,
            sample: 0,
            offset: 0,
            duration: 0,
            bufsize: (kind.len() + value.len()) as u32,
        };
        blob.extend_from_slice(&def.to_le_bytes());
        blob.extend_from_slice(kind);
        blob.extend_from_slice(value);
    }
    blob
}

/// Builder for a capture directory on disk.
pub struct CaptureFixture {
    header: Vec<u8>,
    samples: Vec<u8>,
    events: Vec<(Vec<u8>, Vec<u8>)>,
    timing: String,
    dir: Option<TempDir>,
}

impl CaptureFixture {
    pub fn new(nchans: u32, data_type: DataType) -> Self {
        Self {
            header: header_blob(nchans, data_type),
            samples: Vec::new(),
            events: Vec::new(),
            timing: String::new(),
            dir: None,
        }
    }

    pub fn samples(mut self, samples: Vec<u8>) -> Self {
        self.samples = samples;
        self
    }

    pub fn event(mut self, kind: &[u8], value: &[u8]) -> Self {
        self.events.push((kind.to_vec(), value.to_vec()));
        self
    }

    pub fn timing(mut self, timing: &str) -> Self {
        self.timing = timing.to_string();
        self
    }

    pub fn write(mut self) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let records: Vec<(&[u8], &[u8])> =
            self.events.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect();

        std::fs::write(dir.path().join(HEADER_FILE), &self.header)?;
        std::fs::write(dir.path().join(SAMPLES_FILE), &self.samples)?;
        std::fs::write(dir.path().join(EVENTS_FILE), event_blob(&records))?;
        std::fs::write(dir.path().join(TIMING_FILE), &self.timing)?;

        self.dir = Some(dir);
        Ok(self)
    }

    /// Directory of a written fixture.
    pub fn path(&self) -> &Path {
        self.dir.as_ref().map(|d| d.path()).expect("fixture not written")
    }
}

/// One request seen by [`RecordingClient`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub at: Instant,
    pub command: Command,
    pub payload: Vec<u8>,
}

enum Reply {
    Accept,
    Reject,
    FailOn(Command),
}

/// In-memory buffer that records every request with its (tokio) timestamp.
pub struct RecordingClient {
    pub requests: Vec<RecordedRequest>,
    reply: Reply,
}

impl RecordingClient {
    /// Acknowledges every request.
    pub fn accepting() -> Self {
        Self { requests: Vec::new(), reply: Reply::Accept }
    }

    /// Answers every request with `PUT_ERR`.
    pub fn rejecting() -> Self {
        Self { requests: Vec::new(), reply: Reply::Reject }
    }

    /// Transport failure for `command`, acknowledgements otherwise.
    pub fn failing_on(command: Command) -> Self {
        Self { requests: Vec::new(), reply: Reply::FailOn(command) }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.requests.iter().map(|r| r.command).collect()
    }
}

#[async_trait::async_trait]
impl BufferClient for RecordingClient {
    async fn request(&mut self, command: Command, payload: &[u8]) -> Result<Response> {
        self.requests.push(RecordedRequest {
            at: Instant::now(),
            command,
            payload: payload.to_vec(),
        });
        let status = match self.reply {
            Reply::Accept => Command::PutOk,
            Reply::Reject => Command::PutErr,
            Reply::FailOn(failing) if failing == command => {
                return Err(PlaybackError::transport_protocol(command, "connection reset"));
            }
            Reply::FailOn(_) => Command::PutOk,
        };
        Ok(Response { status: status.code(), payload: Vec::new() })
    }
}

/// Reader that notes when and where every block read starts.
pub struct RecordingReader {
    inner: io::Cursor<Vec<u8>>,
    pub reads: Vec<(Instant, u64)>,
}

impl RecordingReader {
    pub fn new(inner: io::Cursor<Vec<u8>>) -> Self {
        Self { inner, reads: Vec::new() }
    }
}

impl Read for RecordingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for RecordingReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = self.inner.seek(pos)?;
        self.reads.push((Instant::now(), position));
        Ok(position)
    }
}
