use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// Maximum accepted frame size (2 MiB)
pub const MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// A VarInt never spans more than 5 bytes.
pub const MAX_VARINT_LEN: usize = 5;

/// Maximum server address length in a handshake, in characters.
pub const MAX_HOST_LEN: usize = 255;

/// Maximum length of the status JSON string, in characters.
pub const MAX_STATUS_JSON_LEN: usize = 32767;

/// Protocol version sent when the client does not care which version the
/// server speaks. Status queries are answered regardless.
pub const PROTOCOL_VERSION_ANY: i32 = -1;

pub const HANDSHAKE_PACKET_ID: i32 = 0x00;
pub const STATUS_REQUEST_PACKET_ID: i32 = 0x00;
pub const STATUS_RESPONSE_PACKET_ID: i32 = 0x00;
pub const PING_PACKET_ID: i32 = 0x01;
pub const PONG_PACKET_ID: i32 = 0x01;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// State the connection switches to after the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
}

impl NextState {
    pub fn as_varint(&self) -> i32 {
        match self {
            NextState::Status => 1,
            NextState::Login => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub host: String,
    pub port: u16,
    pub next_state: NextState,
}

impl Handshake {
    /// Handshake that opens a status session with `host:port`.
    pub fn status(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION_ANY,
            host: host.into(),
            port,
            next_state: NextState::Status,
        }
    }
}

/// Packets a server sends while in the status state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundPacket {
    /// Raw status JSON
    StatusResponse(String),
    Pong(i64),
}

// ============================================================================
// Server status document
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionInfo>,
    #[serde(default)]
    pub players: PlayerCounts,
    /// Message of the day; either a plain string or a chat component.
    #[serde(default)]
    pub description: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCounts {
    pub max: u32,
    pub online: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample: Vec<PlayerSample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSample {
    pub name: String,
    pub id: String,
}

/// Parse the JSON carried by a status response
pub fn parse_status(json: &str) -> Result<ServerStatus> {
    serde_json::from_str(json).map_err(ProtocolError::StatusJson)
}

// ============================================================================
// Primitive encoding
// ============================================================================

/// Append `value` as a VarInt (7 bits per byte, little-endian groups)
pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

/// Number of bytes `value` occupies as a VarInt
pub fn varint_len(value: i32) -> usize {
    let mut value = value as u32;
    let mut len = 1;
    while value & !0x7F != 0 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Read a VarInt from the front of `bytes`, returning the value and the
/// number of bytes consumed
pub fn read_varint(bytes: &[u8]) -> Result<(i32, usize)> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value as i32, i + 1));
        }
    }

    if bytes.len() >= MAX_VARINT_LEN {
        Err(ProtocolError::VarIntTooLong)
    } else {
        Err(ProtocolError::UnexpectedEof)
    }
}

/// Append a length-prefixed UTF-8 string
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

/// Read a length-prefixed UTF-8 string of at most `max_chars` characters
pub fn read_string(bytes: &[u8], max_chars: usize) -> Result<(String, usize)> {
    let (len, header) = read_varint(bytes)?;
    if len < 0 {
        return Err(ProtocolError::NegativeLength(len));
    }
    let len = len as usize;

    // A character is at most 4 bytes in UTF-8
    if len > max_chars.saturating_mul(4) {
        return Err(ProtocolError::StringTooLong { len, max: max_chars });
    }

    let end = header + len;
    let raw = bytes.get(header..end).ok_or(ProtocolError::UnexpectedEof)?;
    let s = std::str::from_utf8(raw)?;

    let chars = s.chars().count();
    if chars > max_chars {
        return Err(ProtocolError::StringTooLong { len: chars, max: max_chars });
    }

    Ok((s.to_string(), end))
}

// ============================================================================
// Framing
// ============================================================================

/// Wrap a packet id and payload into a length-prefixed frame
pub fn encode_frame(packet_id: i32, payload: &[u8]) -> Result<Vec<u8>> {
    let body_len = varint_len(packet_id) + payload.len();
    if body_len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(body_len));
    }

    let mut frame = Vec::with_capacity(varint_len(body_len as i32) + body_len);
    write_varint(&mut frame, body_len as i32);
    write_varint(&mut frame, packet_id);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Split a frame body (length prefix already stripped) into packet id and payload
pub fn split_packet(frame: &[u8]) -> Result<(i32, &[u8])> {
    let (packet_id, consumed) = read_varint(frame)?;
    Ok((packet_id, &frame[consumed..]))
}

fn read_i64(bytes: &[u8]) -> Result<i64> {
    let raw = bytes.get(..8).ok_or(ProtocolError::UnexpectedEof)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(raw);
    Ok(i64::from_be_bytes(arr))
}

// ============================================================================
// Serverbound packets
// ============================================================================

pub fn encode_handshake(handshake: &Handshake) -> Result<Vec<u8>> {
    let host_chars = handshake.host.chars().count();
    if host_chars > MAX_HOST_LEN {
        return Err(ProtocolError::StringTooLong {
            len: host_chars,
            max: MAX_HOST_LEN,
        });
    }

    let mut payload = Vec::with_capacity(handshake.host.len() + 8);
    write_varint(&mut payload, handshake.protocol_version);
    write_string(&mut payload, &handshake.host);
    payload.extend_from_slice(&handshake.port.to_be_bytes());
    write_varint(&mut payload, handshake.next_state.as_varint());
    encode_frame(HANDSHAKE_PACKET_ID, &payload)
}

pub fn encode_status_request() -> Result<Vec<u8>> {
    encode_frame(STATUS_REQUEST_PACKET_ID, &[])
}

pub fn encode_ping(payload: i64) -> Result<Vec<u8>> {
    encode_frame(PING_PACKET_ID, &payload.to_be_bytes())
}

/// Decode a handshake frame body. Used by servers and test fixtures.
pub fn decode_handshake(frame: &[u8]) -> Result<Handshake> {
    let (packet_id, payload) = split_packet(frame)?;
    if packet_id != HANDSHAKE_PACKET_ID {
        return Err(ProtocolError::UnexpectedPacket(packet_id));
    }

    let (protocol_version, mut offset) = read_varint(payload)?;
    let (host, consumed) = read_string(&payload[offset..], MAX_HOST_LEN)?;
    offset += consumed;

    let port_bytes = payload
        .get(offset..offset + 2)
        .ok_or(ProtocolError::UnexpectedEof)?;
    let port = u16::from_be_bytes([port_bytes[0], port_bytes[1]]);
    offset += 2;

    let (state, _) = read_varint(&payload[offset..])?;
    let next_state = match state {
        1 => NextState::Status,
        2 => NextState::Login,
        other => return Err(ProtocolError::UnexpectedPacket(other)),
    };

    Ok(Handshake {
        protocol_version,
        host,
        port,
        next_state,
    })
}

// ============================================================================
// Clientbound packets
// ============================================================================

pub fn encode_status_response(json: &str) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(json.len() + MAX_VARINT_LEN);
    write_string(&mut payload, json);
    encode_frame(STATUS_RESPONSE_PACKET_ID, &payload)
}

pub fn encode_pong(payload: i64) -> Result<Vec<u8>> {
    encode_frame(PONG_PACKET_ID, &payload.to_be_bytes())
}

/// Decode a status-state packet sent by the server (framing already stripped)
pub fn decode_clientbound(frame: &[u8]) -> Result<ClientboundPacket> {
    let (packet_id, payload) = split_packet(frame)?;
    match packet_id {
        STATUS_RESPONSE_PACKET_ID => {
            let (json, _) = read_string(payload, MAX_STATUS_JSON_LEN)?;
            Ok(ClientboundPacket::StatusResponse(json))
        }
        PONG_PACKET_ID => Ok(ClientboundPacket::Pong(read_i64(payload)?)),
        other => Err(ProtocolError::UnexpectedPacket(other)),
    }
}
