use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::channel::envelope::OutboundMessage;
use crate::channel::registry::PendingExtractions;
use crate::form::form_model::FormSnapshot;

// ============================================================================
// Channel handle — outbound gate + request/response overlay
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("no active connection to the extraction collaborator")]
    NotConnected,
    #[error("extraction request timed out after {0:?}")]
    ExtractionTimeout(Duration),
    #[error("connection lost while waiting for extraction")]
    Disconnected,
}

/// Something that can produce a fresh snapshot on demand. Implemented by
/// `ExtensionChannel`; tests substitute scripted sources.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn request_snapshot(&self, timeout: Duration) -> Result<FormSnapshot, ChannelError>;
}

/// Handle to one live connection. Cheap to clone; every clone shares the
/// outbound queue and the pending-request registry.
///
/// All writes go through one mpsc queue drained by a single writer task, so
/// two logically concurrent senders (a progress frame and an extraction
/// request, say) can never interleave partial writes.
#[derive(Clone)]
pub struct ExtensionChannel {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    pending: Arc<PendingExtractions>,
}

impl ExtensionChannel {
    pub fn new(
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        pending: Arc<PendingExtractions>,
    ) -> ExtensionChannel {
        ExtensionChannel { outbound, pending }
    }

    /// Queue one frame for transmission as a single atomic unit.
    pub fn send(&self, message: OutboundMessage) -> Result<(), ChannelError> {
        self.outbound
            .send(message)
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Deliver an inbound extraction response to whoever is waiting on its
    /// correlation id. A snapshot violating the model invariants is dropped
    /// like an unmatched response; late and unknown ids are dropped silently.
    pub fn resolve_extraction(&self, request_id: &str, snapshot: FormSnapshot) {
        if let Err(e) = snapshot.validate() {
            warn!(request_id, error = %e, "invalid extraction snapshot dropped");
            return;
        }
        if !self.pending.resolve(request_id, snapshot) {
            warn!(request_id, "unmatched extraction response");
        }
    }

    pub fn pending(&self) -> &PendingExtractions {
        &self.pending
    }
}

#[async_trait]
impl SnapshotSource for ExtensionChannel {
    /// Ask the collaborator for a fresh snapshot and wait for the correlated
    /// response. The response is paired by id, not by order — unrelated
    /// inbound traffic may arrive in between.
    async fn request_snapshot(&self, timeout: Duration) -> Result<FormSnapshot, ChannelError> {
        let request_id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
        let rx = self.pending.register(&request_id, timeout);

        if let Err(e) = self.send(OutboundMessage::RequestExtraction {
            request_id: request_id.clone(),
        }) {
            self.pending.abandon(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            // Sender dropped: the registry was cleared by a disconnect.
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.pending.abandon(&request_id);
                warn!(request_id, ?timeout, "extraction request timed out");
                Err(ChannelError::ExtractionTimeout(timeout))
            }
        }
    }
}
