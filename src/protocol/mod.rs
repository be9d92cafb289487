//! Buffer protocol boundary
//!
//! Playback only ever submits one request at a time and waits for its response. Every
//! message on the wire is an 8-byte [`MessageDef`] followed by `bufsize` payload bytes.
//!
//! [`BufferClient`] is the seam between the scheduler and the network: the scheduler is
//! generic over it, [`TcpBufferClient`] is the real implementation.

mod tcp;

pub use tcp::TcpBufferClient;

use crate::Result;

/// Protocol version carried by every message.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default buffer port.
pub const DEFAULT_PORT: u16 = 1972;

pub const MESSAGE_DEF_SIZE: usize = 8;

/// Request and response codes of the buffer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PutHdr,
    PutDat,
    PutEvt,
    PutOk,
    PutErr,
    GetHdr,
    GetDat,
    GetEvt,
    GetOk,
    GetErr,
    FlushHdr,
    FlushDat,
    FlushEvt,
    FlushOk,
    FlushErr,
    WaitDat,
    WaitOk,
    WaitErr,
}

impl Command {
    pub const fn code(&self) -> u16 {
        match self {
            Command::PutHdr => 0x0101,
            Command::PutDat => 0x0102,
            Command::PutEvt => 0x0103,
            Command::PutOk => 0x0104,
            Command::PutErr => 0x0105,
            Command::GetHdr => 0x0201,
            Command::GetDat => 0x0202,
            Command::GetEvt => 0x0203,
            Command::GetOk => 0x0204,
            Command::GetErr => 0x0205,
            Command::FlushHdr => 0x0301,
            Command::FlushDat => 0x0302,
            Command::FlushEvt => 0x0303,
            Command::FlushOk => 0x0304,
            Command::FlushErr => 0x0305,
            Command::WaitDat => 0x0402,
            Command::WaitOk => 0x0404,
            Command::WaitErr => 0x0405,
        }
    }

    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0x0101 => Command::PutHdr,
            0x0102 => Command::PutDat,
            0x0103 => Command::PutEvt,
            0x0104 => Command::PutOk,
            0x0105 => Command::PutErr,
            0x0201 => Command::GetHdr,
            0x0202 => Command::GetDat,
            0x0203 => Command::GetEvt,
            0x0204 => Command::GetOk,
            0x0205 => Command::GetErr,
            0x0301 => Command::FlushHdr,
            0x0302 => Command::FlushDat,
            0x0303 => Command::FlushEvt,
            0x0304 => Command::FlushOk,
            0x0305 => Command::FlushErr,
            0x0402 => Command::WaitDat,
            0x0404 => Command::WaitOk,
            0x0405 => Command::WaitErr,
            _ => return None,
        })
    }

    /// Response code signalling success for this request.
    pub const fn success(&self) -> Option<Command> {
        match self {
            Command::PutHdr | Command::PutDat | Command::PutEvt => Some(Command::PutOk),
            Command::GetHdr | Command::GetDat | Command::GetEvt => Some(Command::GetOk),
            Command::FlushHdr | Command::FlushDat | Command::FlushEvt => Some(Command::FlushOk),
            Command::WaitDat => Some(Command::WaitOk),
            _ => None,
        }
    }
}

/// Fixed message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDef {
    pub version: u16,
    pub command: u16,
    pub bufsize: u32,
}

impl MessageDef {
    pub fn request(command: Command, bufsize: u32) -> Self {
        Self { version: PROTOCOL_VERSION, command: command.code(), bufsize }
    }

    pub fn to_le_bytes(&self) -> [u8; MESSAGE_DEF_SIZE] {
        let mut out = [0u8; MESSAGE_DEF_SIZE];
        out[0..2].copy_from_slice(&self.version.to_le_bytes());
        out[2..4].copy_from_slice(&self.command.to_le_bytes());
        out[4..8].copy_from_slice(&self.bufsize.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: [u8; MESSAGE_DEF_SIZE]) -> Self {
        Self {
            version: u16::from_le_bytes([bytes[0], bytes[1]]),
            command: u16::from_le_bytes([bytes[2], bytes[3]]),
            bufsize: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Response to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Raw response code
    pub status: u16,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.status)
    }

    /// Whether this response acknowledges `request`.
    pub fn acknowledges(&self, request: Command) -> bool {
        request.success().is_some_and(|ok| ok.code() == self.status)
    }
}

/// Synchronous request/response exchange with a buffer.
///
/// A transport failure is an `Err`; a response with an error code is an `Ok` the caller
/// inspects with [`Response::acknowledges`].
#[async_trait::async_trait]
pub trait BufferClient: Send {
    async fn request(&mut self, command: Command, payload: &[u8]) -> Result<Response>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_round_trip() {
        use Command::*;
        for command in [PutHdr, PutDat, PutEvt, FlushOk, WaitErr] {
            assert_eq!(Command::from_code(command.code()), Some(command));
        }
        assert_eq!(Command::from_code(0x0106), None);
    }

    #[test]
    fn put_requests_expect_put_ok() {
        let ok = Response { status: Command::PutOk.code(), payload: Vec::new() };
        let err = Response { status: Command::PutErr.code(), payload: Vec::new() };

        assert!(ok.acknowledges(Command::PutDat));
        assert!(!err.acknowledges(Command::PutDat));
        assert!(!ok.acknowledges(Command::GetHdr));
        assert_eq!(err.command(), Some(Command::PutErr));
    }

    #[test]
    fn message_def_layout() {
        let def = MessageDef::request(Command::PutEvt, 0x01020304);
        let bytes = def.to_le_bytes();
        assert_eq!(bytes, [0x01, 0x00, 0x03, 0x01, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(MessageDef::from_le_bytes(bytes), def);
    }
}
