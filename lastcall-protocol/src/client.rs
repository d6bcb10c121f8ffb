use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::Instant,
};
use tracing::debug;

use crate::{
    errors::{ClientError, ProtocolError},
    protocol::{
        ClientboundPacket, Handshake, MAX_FRAME_SIZE, MAX_VARINT_LEN, PONG_PACKET_ID,
        STATUS_RESPONSE_PACKET_ID, ServerStatus, decode_clientbound, encode_handshake,
        encode_ping, encode_status_request, parse_status, read_varint,
    },
};

pub type Result<T> = std::result::Result<T, ClientError>;

/// Default bound on a whole status or ping exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read one VarInt length-prefixed frame and return its body
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; MAX_VARINT_LEN];
    let mut frame_len = None;

    for i in 0..MAX_VARINT_LEN {
        header[i] = reader.read_u8().await.map_err(ClientError::Receive)?;
        if header[i] & 0x80 == 0 {
            let (len, _) = read_varint(&header[..=i])?;
            frame_len = Some(len);
            break;
        }
    }

    let len = frame_len.ok_or(ProtocolError::VarIntTooLong)?;
    if len < 0 {
        return Err(ProtocolError::NegativeLength(len).into());
    }
    let len = len as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len).into());
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(ClientError::Receive)?;
    Ok(body)
}

/// Status and ping queries against one game server.
///
/// Every call opens a fresh connection: servers close the socket after
/// answering a ping, and status sessions are single-use.
#[derive(Debug, Clone)]
pub struct StatusClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl StatusClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Query the server status document
    pub async fn status(&self) -> Result<ServerStatus> {
        self.with_deadline(async {
            let mut stream = self.open_status_session().await?;
            stream
                .write_all(&encode_status_request()?)
                .await
                .map_err(ClientError::Send)?;

            let frame = read_frame(&mut stream).await?;
            match decode_clientbound(&frame)? {
                ClientboundPacket::StatusResponse(json) => Ok(parse_status(&json)?),
                ClientboundPacket::Pong(_) => {
                    Err(ProtocolError::UnexpectedPacket(PONG_PACKET_ID).into())
                }
            }
        })
        .await
    }

    /// Round-trip a ping and return the observed latency
    pub async fn ping(&self) -> Result<Duration> {
        self.with_deadline(async {
            let mut stream = self.open_status_session().await?;
            let sent = ping_payload();
            let started = Instant::now();

            stream
                .write_all(&encode_ping(sent)?)
                .await
                .map_err(ClientError::Send)?;

            let frame = read_frame(&mut stream).await?;
            match decode_clientbound(&frame)? {
                ClientboundPacket::Pong(received) if received == sent => Ok(started.elapsed()),
                ClientboundPacket::Pong(received) => {
                    Err(ClientError::PongMismatch { sent, received })
                }
                ClientboundPacket::StatusResponse(_) => {
                    Err(ProtocolError::UnexpectedPacket(STATUS_RESPONSE_PACKET_ID).into())
                }
            }
        })
        .await
    }

    async fn open_status_session(&self) -> Result<TcpStream> {
        let address = self.address();
        let mut stream =
            TcpStream::connect(&address)
                .await
                .map_err(|source| ClientError::Connect {
                    address: address.clone(),
                    source,
                })?;

        let handshake = encode_handshake(&Handshake::status(self.host.clone(), self.port))?;
        stream
            .write_all(&handshake)
            .await
            .map_err(ClientError::Send)?;

        debug!("Opened status session with {}", address);
        Ok(stream)
    }

    async fn with_deadline<T>(&self, exchange: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }
}

fn ping_payload() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests;
