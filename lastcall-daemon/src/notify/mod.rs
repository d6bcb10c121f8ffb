//! Status notifications
//!
//! One status message represents the current lifecycle phase:
//! - `Notifier` - replace / edit protocol consumed by the orchestrator
//! - `StatusBoard` - the single-outstanding-message implementation over a transport
//! - `MessageTransport` - raw post / patch / delete of one message
//! - `WebhookTransport` - Discord-style webhook transport
//! - `StatusMessage` - rendered content for each phase

mod board;
mod status;
mod webhook;

pub use board::StatusBoard;
pub use status::{Embed, EmbedField, EmbedFooter, ServerDetails, StatusMessage, relative_timestamp};
pub use webhook::WebhookTransport;

use std::future::Future;
use thiserror::Error;

/// Opaque identifier of a posted message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef(String);

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no outstanding notification to edit")]
    NothingToEdit,

    #[error("status message {0} no longer exists")]
    Gone(MessageRef),

    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("notification endpoint did not return a message id")]
    MissingId,

    #[error("notification transport error: {0}")]
    Transport(String),
}

/// Keeps zero or one addressable status message.
///
/// `replace` retires the current message (best effort) and posts a new one;
/// `edit` patches the current message and fails with
/// [`NotifyError::NothingToEdit`] when there is none. An edit that finds the
/// message deleted fails with [`NotifyError::Gone`] and forgets the reference.
pub trait Notifier {
    fn replace(
        &mut self,
        message: &StatusMessage,
    ) -> impl Future<Output = Result<MessageRef, NotifyError>> + Send;

    fn edit(&mut self, message: &StatusMessage) -> impl Future<Output = Result<(), NotifyError>> + Send;

    fn outstanding(&self) -> Option<&MessageRef>;
}

/// Moves a single message to and from the notification endpoint
pub trait MessageTransport {
    fn post(&self, message: &StatusMessage) -> impl Future<Output = Result<MessageRef, NotifyError>> + Send;

    fn patch(
        &self,
        id: &MessageRef,
        message: &StatusMessage,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    fn delete(&self, id: &MessageRef) -> impl Future<Output = Result<(), NotifyError>> + Send;
}
