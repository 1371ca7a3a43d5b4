//! Fanout dispatcher: best-effort delivery of just-persisted records to
//! their recipients.
//!
//! The persisted store is always the record of truth. A push to a live
//! connection (or the email fallback for offline notification recipients)
//! is attempted exactly once; failures are logged and swallowed and never
//! fail the originating write.

use std::sync::Arc;

use crate::mail::Mailer;
use crate::presence::PresenceRegistry;
use crate::ws::events::Event;

/// Email fallback for a notification whose recipient opted in. Built by
/// the handler (which has the recipient's address at hand) and consumed
/// only when the recipient turns out to be offline.
#[derive(Debug, Clone)]
pub struct EmailFallback {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// How a delivery attempt resolved. Informational only — all outcomes are
/// success from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Recipient was online; the event was handed to their connection.
    Pushed,
    /// Recipient offline and opted in; one email send was attempted.
    Emailed,
    /// Recipient offline; the persisted record is the only trace.
    Stored,
}

pub struct FanoutDispatcher {
    presence: Arc<PresenceRegistry>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl FanoutDispatcher {
    pub fn new(presence: Arc<PresenceRegistry>, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self { presence, mailer }
    }

    /// Push an event to a recipient if they are online right now.
    /// Returns whether the event reached a live connection.
    pub fn deliver(&self, recipient_id: &str, event: &Event) -> bool {
        match self.presence.lookup(recipient_id) {
            Some(handle) => {
                if handle.sender.send(event.to_message()).is_err() {
                    // Connection is tearing down; the record stays in the
                    // store for the client's next fetch.
                    tracing::warn!(
                        recipient = %recipient_id,
                        event = %event.event,
                        "push to closed connection dropped"
                    );
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Deliver a notification: push if online, otherwise a single
    /// best-effort email when the recipient opted in. No retry, no
    /// confirmation.
    pub fn deliver_notification(
        &self,
        recipient_id: &str,
        event: &Event,
        email: Option<EmailFallback>,
    ) -> Delivery {
        if self.deliver(recipient_id, event) {
            return Delivery::Pushed;
        }

        if let (Some(mailer), Some(email)) = (&self.mailer, email) {
            mailer.send(&email.to, &email.subject, &email.body);
            tracing::debug!(recipient = %recipient_id, "offline recipient, email fallback sent");
            return Delivery::Emailed;
        }

        Delivery::Stored
    }

    /// Emit an event to every live connection.
    pub fn broadcast(&self, event: &Event) {
        let message = event.to_message();
        for handle in self.presence.handles() {
            let _ = handle.sender.send(message.clone());
        }
    }
}
