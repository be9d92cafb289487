//! Capture directory reader
//!
//! Loads the four artifacts of a capture directory:
//!
//! - `header`: read whole, forwarded opaquely, only the header record is interpreted
//! - `samples`: kept open, read block by block during playback
//! - `events`: read whole into memory, sliced by offset during playback
//! - `timing`: read whole as text for the timing parser
//!
//! Whole-file reads reserve their buffer up front so an oversized capture surfaces as
//! [`PlaybackError::OutOfMemory`] instead of aborting the process.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::format::HeaderDef;
use crate::{DataType, PlaybackError, Result};

pub const HEADER_FILE: &str = "header";
pub const SAMPLES_FILE: &str = "samples";
pub const EVENTS_FILE: &str = "events";
pub const TIMING_FILE: &str = "timing";

/// Header blob plus the fields playback interprets.
///
/// Loading only requires the fixed header record. Whether the header describes a usable
/// sample layout is asked later, and only when the timing script defines sample blocks.
#[derive(Debug, Clone)]
pub struct CaptureHeader {
    raw: Vec<u8>,
    def: HeaderDef,
}

impl CaptureHeader {
    /// Load `<dir>/header`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let raw = read_whole_file(&dir.as_ref().join(HEADER_FILE), "reading the header")?;
        Self::from_bytes(raw)
    }

    /// Interpret an in-memory header blob.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self> {
        let def = HeaderDef::parse(&raw)?;
        debug!(
            "Header: {} channels, data type {}, {} bytes total",
            def.nchans,
            def.data_type,
            raw.len()
        );
        Ok(Self { raw, def })
    }

    /// The header exactly as captured.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn nchans(&self) -> u32 {
        self.def.nchans
    }

    pub fn data_type(&self) -> Result<DataType> {
        self.def.data_type()
    }

    pub fn bytes_per_sample(&self) -> Result<usize> {
        self.def.bytes_per_sample()
    }

    /// Stride for reading sample blocks, see [`HeaderDef::sample_stride`].
    pub fn sample_stride(&self) -> Result<usize> {
        self.def.sample_stride()
    }
}

/// Positioned handle into the raw sample bytes.
#[derive(Debug)]
pub struct SampleFile<R = File> {
    reader: R,
    len: u64,
    path: PathBuf,
}

impl SampleFile<File> {
    /// Open `<dir>/samples` and determine its length.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(SAMPLES_FILE);
        let file =
            File::open(&path).map_err(|e| PlaybackError::file_error(path.clone(), e))?;
        let len = file.metadata().map_err(|e| PlaybackError::file_error(path.clone(), e))?.len();
        debug!("Opened {} ({} bytes)", path.display(), len);
        Ok(Self { reader: file, len, path })
    }
}

impl<R: Read + Seek> SampleFile<R> {
    /// Wrap an arbitrary reader holding `len` sample bytes.
    pub fn from_reader(reader: R, len: u64) -> Self {
        Self { reader, len, path: PathBuf::from("<memory>") }
    }

    /// Total number of bytes available.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill `buf` with the bytes starting at `offset`.
    pub fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        trace!("Reading {} sample bytes @ {}", buf.len(), offset);
        self.reader
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.reader.read_exact(buf))
            .map_err(|e| PlaybackError::file_error(self.path.clone(), e))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Concatenated event records, fully resident.
#[derive(Debug, Clone, Default)]
pub struct EventBlob {
    data: Vec<u8>,
}

impl EventBlob {
    /// Load `<dir>/events`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let data = read_whole_file(&dir.as_ref().join(EVENTS_FILE), "reading events")?;
        debug!("Loaded {} bytes of events", data.len());
        Ok(Self { data })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes of an event batch, `None` if the range is outside the blob.
    pub fn slice(&self, offset: usize, size: usize) -> Option<&[u8]> {
        self.data.get(offset..offset.checked_add(size)?)
    }
}

/// Read `<dir>/timing` as text. Invalid UTF-8 is replaced and ends up as malformed lines.
pub fn read_timing<P: AsRef<Path>>(dir: P) -> Result<String> {
    let path = dir.as_ref().join(TIMING_FILE);
    let bytes = read_whole_file(&path, "reading the timing definition")?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn read_whole_file(path: &Path, context: &str) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| PlaybackError::file_error(path.to_path_buf(), e))?;
    let len = file
        .metadata()
        .map_err(|e| PlaybackError::file_error(path.to_path_buf(), e))?
        .len() as usize;

    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|_| PlaybackError::out_of_memory(context, len))?;
    file.read_to_end(&mut data).map_err(|e| PlaybackError::file_error(path.to_path_buf(), e))?;
    Ok(data)
}
