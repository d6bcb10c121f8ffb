//! Server List Ping support for lastcall
//!
//! This crate provides:
//! - `protocol` - VarInt framing and the handshake / status / ping packets
//! - `client` - `StatusClient`, an async TCP client for status and ping queries

pub mod client;
pub mod errors;
pub mod protocol;
