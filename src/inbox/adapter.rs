//! Glue between the SMTP protocol layer and the inbox core

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::inbox::dispatch::{DispatchOutcome, dispatch};
use crate::inbox::error::InboxError;
use crate::inbox::message::{Envelope, SessionInfo};
use crate::inbox::normalize::normalize;
use crate::inbox::registry::HandlerRegistry;
use crate::smtp::response::SmtpResponse;

/// Receives recipient and end-of-data events for transactions and answers
/// them with SMTP replies.
#[derive(Debug, Clone)]
pub struct SessionAdapter {
    registry: Arc<HandlerRegistry>,
}

impl SessionAdapter {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Record an accepted recipient. Always answers `250 OK`; rejecting
    /// recipients is the protocol layer's job.
    pub fn on_rcpt(&self, envelope: &mut Envelope, address: String) -> SmtpResponse {
        envelope.recipients.push(address);
        SmtpResponse::ok()
    }

    /// Normalize and dispatch a completed transaction.
    ///
    /// Failures are logged and answered with a generic transient failure so
    /// no internal detail reaches the client.
    pub fn on_data(&self, envelope: &Envelope, session: &SessionInfo) -> SmtpResponse {
        match self.process(envelope, session) {
            Ok(outcome) => {
                info!(
                    sender = %envelope.sender,
                    recipients = envelope.recipients.len(),
                    handlers = outcome.invoked.len(),
                    elapsed_ms = elapsed_ms(envelope),
                    "message accepted"
                );
                SmtpResponse::accepted()
            }
            Err(e) => {
                error!(
                    error = %e,
                    source = ?std::error::Error::source(&e),
                    sender = %envelope.sender,
                    recipients = ?envelope.recipients,
                    size = envelope.content_size(),
                    elapsed_ms = elapsed_ms(envelope),
                    "failed to process message"
                );
                SmtpResponse::transient_failure()
            }
        }
    }

    /// Normalize `envelope` and run it through a snapshot of the registry.
    pub fn process(
        &self,
        envelope: &Envelope,
        session: &SessionInfo,
    ) -> Result<DispatchOutcome, InboxError> {
        let message = normalize(envelope, session)?;
        debug!(subject = %message.subject(), "message normalized");

        let registrations = self.registry.all();
        Ok(dispatch(&message, &registrations)?)
    }
}

// Time since MAIL FROM opened the transaction; zero if the clock went backwards.
fn elapsed_ms(envelope: &Envelope) -> u64 {
    envelope
        .received_at
        .elapsed()
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
