use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("VarInt is longer than 5 bytes")]
    VarIntTooLong,

    #[error("unexpected end of packet")]
    UnexpectedEof,

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("string of {len} characters exceeds limit of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("frame of {0} bytes exceeds maximum size")]
    FrameTooLarge(usize),

    #[error("unexpected packet id {0:#04x}")]
    UnexpectedPacket(i32),

    #[error("failed to decode status JSON: {0}")]
    StatusJson(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send request: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to receive response: {0}")]
    Receive(#[source] std::io::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("pong payload {received} does not match ping payload {sent}")]
    PongMismatch { sent: i64, received: i64 },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
