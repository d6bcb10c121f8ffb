use tracing::{debug, warn};

use super::{MessageRef, MessageTransport, Notifier, NotifyError, StatusMessage};

/// Single-outstanding-message status board.
///
/// Holds the reference of the one live message. A replace clears the
/// reference before posting, so a failed post leaves no reference behind
/// rather than a stale one.
pub struct StatusBoard<T> {
    transport: T,
    outstanding: Option<MessageRef>,
}

impl<T> StatusBoard<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            outstanding: None,
        }
    }

}

impl<T: MessageTransport + Send + Sync> Notifier for StatusBoard<T> {
    async fn replace(&mut self, message: &StatusMessage) -> Result<MessageRef, NotifyError> {
        if let Some(previous) = self.outstanding.take() {
            match self.transport.delete(&previous).await {
                Ok(()) => debug!(message_id = %previous, "Retired previous status message"),
                Err(e) => warn!(
                    message_id = %previous,
                    "Failed to delete previous status message: {}", e
                ),
            }
        }

        let id = self.transport.post(message).await?;
        debug!(message_id = %id, "Posted status message");
        self.outstanding = Some(id.clone());
        Ok(id)
    }

    async fn edit(&mut self, message: &StatusMessage) -> Result<(), NotifyError> {
        let Some(id) = self.outstanding.as_ref() else {
            return Err(NotifyError::NothingToEdit);
        };

        let result = self.transport.patch(id, message).await;
        if let Err(NotifyError::Gone(gone)) = &result {
            warn!(message_id = %gone, "Status message was deleted, dropping reference");
            self.outstanding = None;
        }
        result
    }

    fn outstanding(&self) -> Option<&MessageRef> {
        self.outstanding.as_ref()
    }
}
