//! Binary record layouts of the capture format
//!
//! A capture directory stores buffer records exactly as the buffer protocol carries them.
//! Only a handful of fields are ever interpreted during playback:
//!
//! 1. **Header record** (24 bytes) - `nchans` and `data_type` give the sample stride,
//!    anything after the record (chunks) stays opaque
//! 2. **Event record** (32 bytes + trailing payload) - `bufsize` says how many payload
//!    bytes follow the fixed part, which is what makes the events file walkable
//! 3. **Data record** (16 bytes) - written by playback in front of every sample block
//!
//! All records are little-endian with no padding.

use crate::{DataType, PlaybackError, Result};
use tracing::trace;

pub const HEADER_DEF_SIZE: usize = 24;
pub const DATA_DEF_SIZE: usize = 16;
pub const EVENT_DEF_SIZE: usize = 32;

/// Fixed part of the `header` file.
///
/// ```text
/// struct headerdef {
///   uint32 nchans;     // offset 0
///   uint32 nsamples;   // offset 4
///   uint32 nevents;    // offset 8
///   float  fsample;    // offset 12
///   uint32 data_type;  // offset 16
///   uint32 bufsize;    // offset 20, size of the chunks that follow
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderDef {
    pub nchans: u32,
    pub nsamples: u32,
    pub nevents: u32,
    pub fsample: f32,
    pub data_type: u32,
    pub bufsize: u32,
}

impl HeaderDef {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_DEF_SIZE {
            return Err(PlaybackError::header(format!(
                "need {} bytes for the header record, file has {}",
                HEADER_DEF_SIZE,
                data.len()
            )));
        }

        let def = Self {
            nchans: parse_u32_le(data, 0)?,
            nsamples: parse_u32_le(data, 4)?,
            nevents: parse_u32_le(data, 8)?,
            fsample: f32::from_bits(parse_u32_le(data, 12)?),
            data_type: parse_u32_le(data, 16)?,
            bufsize: parse_u32_le(data, 20)?,
        };
        trace!(
            "Parsed header record: nchans={}, data_type={}, fsample={}",
            def.nchans, def.data_type, def.fsample
        );
        Ok(def)
    }

    /// Resolve the data type code.
    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_code(self.data_type).ok_or_else(|| {
            PlaybackError::header(format!("unknown data type code {}", self.data_type))
        })
    }

    /// Bytes occupied by one multi-channel sample, 0 for a header without channels.
    pub fn bytes_per_sample(&self) -> Result<usize> {
        let data_type = self.data_type()?;
        (self.nchans as usize)
            .checked_mul(data_type.size())
            .ok_or_else(|| PlaybackError::header("sample stride overflows"))
    }

    /// Stride of the sample file. Unlike [`bytes_per_sample`](Self::bytes_per_sample) this
    /// fails for a header without channels, which cannot describe any sample block.
    pub fn sample_stride(&self) -> Result<usize> {
        if self.nchans == 0 {
            return Err(PlaybackError::header("header declares zero channels"));
        }
        self.bytes_per_sample()
    }
}

/// Record sent in front of the sample bytes of every data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDef {
    pub nchans: u32,
    pub nsamples: u32,
    pub data_type: u32,
    pub bufsize: u32,
}

impl DataDef {
    pub fn to_le_bytes(&self) -> [u8; DATA_DEF_SIZE] {
        let mut out = [0u8; DATA_DEF_SIZE];
        out[0..4].copy_from_slice(&self.nchans.to_le_bytes());
        out[4..8].copy_from_slice(&self.nsamples.to_le_bytes());
        out[8..12].copy_from_slice(&self.data_type.to_le_bytes());
        out[12..16].copy_from_slice(&self.bufsize.to_le_bytes());
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            nchans: parse_u32_le(data, 0)?,
            nsamples: parse_u32_le(data, 4)?,
            data_type: parse_u32_le(data, 8)?,
            bufsize: parse_u32_le(data, 12)?,
        })
    }
}

/// Fixed part of one event record.
///
/// ```text
/// struct eventdef {
///   uint32 type_type;    // offset 0
///   uint32 type_numel;   // offset 4
///   uint32 value_type;   // offset 8
///   uint32 value_numel;  // offset 12
///   int32  sample;       // offset 16
///   int32  offset;       // offset 20
///   int32  duration;     // offset 24
///   uint32 bufsize;      // offset 28, trailing type + value bytes
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDef {
    pub type_type: u32,
    pub type_numel: u32,
    pub value_type: u32,
    pub value_numel: u32,
    pub sample: i32,
    pub offset: i32,
    pub duration: i32,
    pub bufsize: u32,
}

impl EventDef {
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            type_type: parse_u32_le(data, 0)?,
            type_numel: parse_u32_le(data, 4)?,
            value_type: parse_u32_le(data, 8)?,
            value_numel: parse_u32_le(data, 12)?,
            sample: parse_u32_le(data, 16)? as i32,
            offset: parse_u32_le(data, 20)? as i32,
            duration: parse_u32_le(data, 24)? as i32,
            bufsize: parse_u32_le(data, 28)?,
        })
    }

    /// Size of the whole record, fixed part plus trailing payload.
    pub fn record_size(&self) -> usize {
        EVENT_DEF_SIZE + self.bufsize as usize
    }

    /// Encode the fixed part.
    pub fn to_le_bytes(&self) -> [u8; EVENT_DEF_SIZE] {
        let fields = [
            self.type_type,
            self.type_numel,
            self.value_type,
            self.value_numel,
            self.sample as u32,
            self.offset as u32,
            self.duration as u32,
            self.bufsize,
        ];
        let mut out = [0u8; EVENT_DEF_SIZE];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }
}

/// Size of the event record starting at `offset`, if the whole record lies inside `blob`.
pub fn event_record_size_at(blob: &[u8], offset: usize) -> Option<usize> {
    let fixed = blob.get(offset..offset.checked_add(EVENT_DEF_SIZE)?)?;
    let size = EventDef::parse(fixed).ok()?.record_size();
    let end = offset.checked_add(size)?;
    (end <= blob.len()).then_some(size)
}

fn parse_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    match data.get(offset..offset + 4) {
        Some(bytes) => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        None => Err(PlaybackError::Parse {
            context: "Integer parsing".to_string(),
            details: format!(
                "Insufficient data for u32 at offset {} (need 4 bytes, have {})",
                offset,
                data.len().saturating_sub(offset)
            ),
        }),
    }
}
