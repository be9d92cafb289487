//! TCP transport for the buffer protocol

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

use super::{BufferClient, Command, MESSAGE_DEF_SIZE, MessageDef, PROTOCOL_VERSION, Response};
use crate::{PlaybackError, Result};

/// Connection to a buffer server.
pub struct TcpBufferClient {
    stream: TcpStream,
    address: String,
}

impl TcpBufferClient {
    /// Connect to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let address = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| PlaybackError::Connection { address: address.clone(), source: e })?;
        stream
            .set_nodelay(true)
            .map_err(|e| PlaybackError::Connection { address: address.clone(), source: e })?;

        info!("Connected to buffer at {}", address);
        Ok(Self { stream, address })
    }

    /// Shut the connection down.
    pub async fn close(mut self) -> Result<()> {
        debug!("Closing connection to {}", self.address);
        self.stream.shutdown().await.map_err(|e| PlaybackError::Connection {
            address: self.address.clone(),
            source: e,
        })
    }
}

#[async_trait::async_trait]
impl BufferClient for TcpBufferClient {
    async fn request(&mut self, command: Command, payload: &[u8]) -> Result<Response> {
        let bufsize = u32::try_from(payload.len()).map_err(|_| {
            PlaybackError::transport_protocol(
                command,
                format!("payload of {} bytes does not fit a message", payload.len()),
            )
        })?;

        let def = MessageDef::request(command, bufsize);
        trace!("-> {:?} ({} bytes)", command, bufsize);
        self.stream
            .write_all(&def.to_le_bytes())
            .await
            .map_err(|e| PlaybackError::transport(command, e))?;
        self.stream.write_all(payload).await.map_err(|e| PlaybackError::transport(command, e))?;

        let mut prefix = [0u8; MESSAGE_DEF_SIZE];
        self.stream
            .read_exact(&mut prefix)
            .await
            .map_err(|e| PlaybackError::transport(command, e))?;
        let reply = MessageDef::from_le_bytes(prefix);
        if reply.version != PROTOCOL_VERSION {
            return Err(PlaybackError::transport_protocol(
                command,
                format!("response has protocol version {}", reply.version),
            ));
        }

        let size = reply.bufsize as usize;
        let mut body = Vec::new();
        body.try_reserve_exact(size).map_err(|_| {
            PlaybackError::transport_protocol(
                command,
                format!("cannot allocate {} bytes for the response body", size),
            )
        })?;
        (&mut self.stream)
            .take(u64::from(reply.bufsize))
            .read_to_end(&mut body)
            .await
            .map_err(|e| PlaybackError::transport(command, e))?;
        if body.len() != size {
            return Err(PlaybackError::transport_protocol(
                command,
                format!("response body ended after {} of {} bytes", body.len(), size),
            ));
        }
        trace!("<- {:#06x} ({} bytes)", reply.command, reply.bufsize);

        Ok(Response { status: reply.command, payload: body })
    }
}
