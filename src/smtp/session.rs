//! SMTP session state management

use std::net::SocketAddr;

use crate::inbox::adapter::SessionAdapter;
use crate::inbox::message::{Envelope, SessionInfo};
use crate::smtp::error::{Field, SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;

/// Where a session is in the SMTP dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Connected, waiting for HELO
    Initial,
    /// HELO received, no transaction open
    Greeted,
    /// MAIL FROM received, waiting for the first RCPT
    AwaitingRecipients,
    /// At least one RCPT accepted; more RCPT or DATA may follow
    AccumulatingRecipients,
    /// DATA accepted, collecting payload lines
    AwaitingData,
    /// Payload received and handed over; a new MAIL may start
    Completed,
}

/// State and transaction data for one client connection
#[derive(Debug)]
pub struct SmtpSession {
    /// Current state of the session
    pub state: SmtpState,
    /// Client domain from HELO/EHLO
    pub client_domain: Option<String>,
    /// Remote address of the connection
    pub peer: Option<SocketAddr>,
    /// The open transaction, if any
    pub envelope: Option<Envelope>,
    /// Bytes of payload collected so far, CRLFs included
    pub data_size: usize,
    /// First limit violation seen while collecting the payload
    data_error: Option<SmtpError>,
}

impl SmtpSession {
    /// Create a new SMTP session
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            state: SmtpState::Initial,
            client_domain: None,
            peer,
            envelope: None,
            data_size: 0,
            data_error: None,
        }
    }

    /// Drop the open transaction and return to the post-HELO state
    pub fn reset(&mut self) {
        self.state = SmtpState::Greeted;
        self.envelope = None;
        self.data_size = 0;
        self.data_error = None;
    }

    /// Set the client domain from HELO/EHLO. Any open transaction is dropped.
    pub fn set_client_domain(&mut self, domain: String) -> Result<(), SmtpError> {
        if domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
            return Err(SmtpError::TooLong {
                field: Field::Domain,
                max: SmtpLimits::DOMAIN_MAX_LENGTH,
            });
        }

        self.client_domain = Some(domain);
        self.reset();
        Ok(())
    }

    /// Open a transaction. An empty sender is the null reverse path.
    pub fn set_sender(&mut self, sender: String) -> Result<(), SmtpError> {
        if sender.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::TooLong {
                field: Field::Path,
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        self.envelope = Some(Envelope::new(sender));
        self.data_size = 0;
        self.data_error = None;
        self.state = SmtpState::AwaitingRecipients;
        Ok(())
    }

    /// Check limits for a new recipient and hand it to the adapter
    pub fn add_recipient(
        &mut self,
        recipient: String,
        adapter: &SessionAdapter,
    ) -> Result<SmtpResponse, SmtpError> {
        if recipient.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::TooLong {
                field: Field::Path,
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        let envelope = self
            .envelope
            .as_mut()
            .ok_or_else(|| SmtpError::InvalidState("RCPT command requires MAIL first".to_string()))?;

        if envelope.recipients.len() >= SmtpLimits::MAX_RECIPIENTS {
            return Err(SmtpError::TooManyRecipients {
                max: SmtpLimits::MAX_RECIPIENTS,
            });
        }

        let response = adapter.on_rcpt(envelope, recipient);
        self.state = SmtpState::AccumulatingRecipients;
        Ok(response)
    }

    /// Start collecting the payload
    pub fn start_data_mode(&mut self) -> Result<(), SmtpError> {
        if self.state != SmtpState::AccumulatingRecipients {
            return Err(SmtpError::InvalidState(
                "DATA command requires RCPT first".to_string(),
            ));
        }

        self.data_size = 0;
        self.data_error = None;
        self.state = SmtpState::AwaitingData;
        Ok(())
    }

    pub fn in_data_mode(&self) -> bool {
        self.state == SmtpState::AwaitingData
    }

    /// Append one payload line, without its line ending and without the
    /// terminating `.` line. A leading dot is removed (RFC 5321 4.5.2).
    ///
    /// Once a limit is exceeded the rest of the payload is discarded and the
    /// error is returned by [`SmtpSession::finish_data_collection`], so the
    /// client stays in sync until its final dot.
    pub fn add_data_line(&mut self, line: &[u8]) {
        if self.data_error.is_some() {
            return;
        }

        let line = line.strip_prefix(b".").unwrap_or(line);
        let line_size = line.len() + 2; // +2 for CRLF

        if line_size > SmtpLimits::TEXT_LINE_MAX_LENGTH {
            self.reject_data_line();
            return;
        }

        if self.data_size + line_size > SmtpLimits::MAX_DATA_SIZE {
            self.data_error = Some(SmtpError::TooMuchData {
                max: SmtpLimits::MAX_DATA_SIZE,
            });
            return;
        }

        if let Some(envelope) = self.envelope.as_mut() {
            envelope.content.extend_from_slice(line);
            envelope.content.extend_from_slice(b"\r\n");
            self.data_size += line_size;
        }
    }

    /// Record a DATA line that was too long to be read in full. The
    /// transaction fails at the final dot like any other oversized line.
    pub fn reject_data_line(&mut self) {
        if self.data_error.is_none() {
            self.data_error = Some(SmtpError::TooLong {
                field: Field::Line,
                max: SmtpLimits::TEXT_LINE_MAX_LENGTH,
            });
        }
    }

    /// Close the payload and take the finished transaction
    pub fn finish_data_collection(&mut self) -> Result<Envelope, SmtpError> {
        if !self.in_data_mode() {
            return Err(SmtpError::InvalidState(
                "Not in data collection mode".to_string(),
            ));
        }

        if let Some(error) = self.data_error.take() {
            self.reset();
            return Err(error);
        }

        let envelope = self
            .envelope
            .take()
            .ok_or_else(|| SmtpError::InvalidState("No sender specified".to_string()))?;

        self.data_size = 0;
        self.state = SmtpState::Completed;
        Ok(envelope)
    }

    /// Connection facts for the normalizer. Falls back to `server_hostname`
    /// when the client never identified itself.
    pub fn session_info(&self, server_hostname: &str) -> SessionInfo {
        let host_name = self.client_domain.as_deref().unwrap_or(server_hostname);
        SessionInfo::new(host_name, self.peer)
    }

    /// Check if the session is ready for a specific command
    pub fn can_execute_command(&self, command: &str) -> bool {
        match command.to_uppercase().as_str() {
            #[cfg(feature = "ehlo")]
            "EHLO" => true,
            "HELO" => true,
            "MAIL" => matches!(self.state, SmtpState::Greeted | SmtpState::Completed),
            "RCPT" => matches!(
                self.state,
                SmtpState::AwaitingRecipients | SmtpState::AccumulatingRecipients
            ),
            "DATA" => self.state == SmtpState::AccumulatingRecipients,
            "RSET" => self.state != SmtpState::Initial,
            "NOOP" => true,
            "QUIT" => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::registry::HandlerRegistry;
    use std::sync::Arc;

    fn adapter() -> SessionAdapter {
        SessionAdapter::new(Arc::new(HandlerRegistry::new()))
    }

    fn session_with_recipient() -> SmtpSession {
        let mut session = SmtpSession::new(None);
        session
            .set_client_domain("client.local".to_string())
            .unwrap();
        session
            .set_sender("sender@example.com".to_string())
            .unwrap();
        session
            .add_recipient("recipient@example.com".to_string(), &adapter())
            .unwrap();
        session
    }

    #[test]
    fn test_new_session() {
        let session = SmtpSession::new(None);
        assert_eq!(session.state, SmtpState::Initial);
        assert!(session.envelope.is_none());
        assert!(session.client_domain.is_none());
    }

    #[test]
    fn test_domain_too_long() {
        let mut session = SmtpSession::new(None);
        let long_domain = "a".repeat(SmtpLimits::DOMAIN_MAX_LENGTH + 1);

        let result = session.set_client_domain(long_domain);
        assert!(matches!(result, Err(SmtpError::TooLong { field: Field::Domain, .. })));
    }

    #[test]
    fn test_state_transitions() {
        let mut session = SmtpSession::new(None);
        session
            .set_client_domain("client.local".to_string())
            .unwrap();
        assert_eq!(session.state, SmtpState::Greeted);

        session
            .set_sender("sender@example.com".to_string())
            .unwrap();
        assert_eq!(session.state, SmtpState::AwaitingRecipients);

        session
            .add_recipient("a@example.com".to_string(), &adapter())
            .unwrap();
        assert_eq!(session.state, SmtpState::AccumulatingRecipients);

        session.start_data_mode().unwrap();
        assert_eq!(session.state, SmtpState::AwaitingData);

        session.add_data_line(b"Subject: x");
        session.finish_data_collection().unwrap();
        assert_eq!(session.state, SmtpState::Completed);
        assert!(session.can_execute_command("MAIL"));
    }

    #[test]
    fn test_recipients_keep_order_and_duplicates() {
        let mut session = SmtpSession::new(None);
        let adapter = adapter();
        session
            .set_client_domain("client.local".to_string())
            .unwrap();
        session
            .set_sender("sender@example.com".to_string())
            .unwrap();

        for recipient in ["a@example.com", "b@example.com", "a@example.com"] {
            let response = session
                .add_recipient(recipient.to_string(), &adapter)
                .unwrap();
            assert_eq!(response.code, "250");
        }

        let envelope = session.envelope.as_ref().unwrap();
        assert_eq!(
            envelope.recipients,
            ["a@example.com", "b@example.com", "a@example.com"]
        );
    }

    #[test]
    fn test_too_many_recipients() {
        let mut session = session_with_recipient();
        let adapter = adapter();

        for i in 1..SmtpLimits::MAX_RECIPIENTS {
            session
                .add_recipient(format!("user{i}@example.com"), &adapter)
                .unwrap();
        }

        let result = session.add_recipient("extra@example.com".to_string(), &adapter);
        assert!(matches!(result, Err(SmtpError::TooManyRecipients { .. })));
    }

    #[test]
    fn test_data_collection_preserves_blank_lines_and_unstuffs() {
        let mut session = session_with_recipient();
        session.start_data_mode().unwrap();

        session.add_data_line(b"Subject: Test");
        session.add_data_line(b"");
        session.add_data_line(b"..leading dot");
        session.add_data_line(b"  indented");

        let envelope = session.finish_data_collection().unwrap();
        assert_eq!(envelope.sender, "sender@example.com");
        assert_eq!(envelope.recipients, ["recipient@example.com"]);
        assert_eq!(
            envelope.content,
            b"Subject: Test\r\n\r\n.leading dot\r\n  indented\r\n"
        );
        assert!(!session.in_data_mode());
    }

    #[test]
    fn test_line_too_long_is_reported_at_end_of_data() {
        let mut session = session_with_recipient();
        session.start_data_mode().unwrap();

        let long_line = vec![b'a'; SmtpLimits::TEXT_LINE_MAX_LENGTH + 1];
        session.add_data_line(&long_line);
        session.add_data_line(b"more");

        let result = session.finish_data_collection();
        assert!(matches!(result, Err(SmtpError::TooLong { field: Field::Line, .. })));
        assert_eq!(session.state, SmtpState::Greeted);
        assert!(session.envelope.is_none());
    }

    #[test]
    fn test_rejected_line_fails_transaction_at_final_dot() {
        let mut session = session_with_recipient();
        session.start_data_mode().unwrap();

        session.add_data_line(b"Subject: x");
        session.reject_data_line();
        session.add_data_line(b"");
        session.add_data_line(b"body");

        let result = session.finish_data_collection();
        assert!(matches!(
            result,
            Err(SmtpError::TooLong {
                field: Field::Line,
                max: SmtpLimits::TEXT_LINE_MAX_LENGTH
            })
        ));
        assert_eq!(session.state, SmtpState::Greeted);
    }

    #[test]
    fn test_can_execute_command() {
        let mut session = SmtpSession::new(None);

        assert!(session.can_execute_command("HELO"));
        assert!(session.can_execute_command("NOOP"));
        assert!(session.can_execute_command("QUIT"));
        assert!(!session.can_execute_command("MAIL"));
        assert!(!session.can_execute_command("RCPT"));
        assert!(!session.can_execute_command("DATA"));
        assert!(!session.can_execute_command("RSET"));

        session
            .set_client_domain("client.local".to_string())
            .unwrap();
        assert!(session.can_execute_command("MAIL"));
        assert!(session.can_execute_command("RSET"));
        assert!(!session.can_execute_command("RCPT"));

        session
            .set_sender("sender@example.com".to_string())
            .unwrap();
        assert!(session.can_execute_command("RCPT"));
        assert!(!session.can_execute_command("DATA"));

        session
            .add_recipient("recipient@example.com".to_string(), &adapter())
            .unwrap();
        assert!(session.can_execute_command("DATA"));
        assert!(session.can_execute_command("RCPT"));
    }

    #[test]
    fn test_reset_keeps_client_domain() {
        let mut session = session_with_recipient();

        session.reset();

        assert_eq!(session.state, SmtpState::Greeted);
        assert!(session.envelope.is_none());
        assert_eq!(session.client_domain, Some("client.local".to_string()));
    }

    #[test]
    fn test_session_info_prefers_client_domain() {
        let peer: SocketAddr = "10.0.0.1:2000".parse().unwrap();
        let mut session = SmtpSession::new(Some(peer));
        assert_eq!(session.session_info("server.local").host_name, "server.local");

        session
            .set_client_domain("client.local".to_string())
            .unwrap();
        let info = session.session_info("server.local");
        assert_eq!(info.host_name, "client.local");
        assert_eq!(info.peer, Some(peer));
    }
}
