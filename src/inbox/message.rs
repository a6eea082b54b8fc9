//! Transaction and message data structures

use std::net::SocketAddr;
use std::time::SystemTime;

/// The envelope and payload of one SMTP transaction, as collected by the
/// protocol layer.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Reverse path from MAIL FROM; empty for the null path `<>`
    pub sender: String,

    /// Forward paths from RCPT TO, in the order they were accepted
    pub recipients: Vec<String>,

    /// Message content after dot-unstuffing, lines joined with CRLF
    pub content: Vec<u8>,

    /// When the transaction was started
    pub received_at: SystemTime,
}

impl Envelope {
    /// Start a new transaction for the given reverse path
    pub fn new(sender: String) -> Self {
        Self {
            sender,
            recipients: Vec::new(),
            content: Vec::new(),
            received_at: SystemTime::now(),
        }
    }

    /// Size of the payload in bytes
    pub fn content_size(&self) -> usize {
        self.content.len()
    }
}

/// Connection-level facts about the client that submitted a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Name the client announced with HELO/EHLO
    pub host_name: String,

    /// Remote address of the connection, when known
    pub peer: Option<SocketAddr>,
}

impl SessionInfo {
    pub fn new(host_name: impl Into<String>, peer: Option<SocketAddr>) -> Self {
        Self {
            host_name: host_name.into(),
            peer,
        }
    }
}

/// A received message, normalized once per completed transaction and handed
/// to every handler that fires for it.
///
/// The record is immutable: fields are only readable through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub(crate) recipients: Vec<String>,
    pub(crate) sender: String,
    pub(crate) subject: String,
    pub(crate) body: String,
    pub(crate) raw: String,
    pub(crate) real_sender: String,
}

impl InboundMessage {
    /// Recipients in acceptance order, duplicates included
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Envelope sender, empty for the null reverse path
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Decoded `Subject` header, empty when absent
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// First plain-text part, empty when the message has none
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Full message source
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `"<host> (http://<ip>:<port>)"` describing where the message came from.
    /// Diagnostic only: the host part is whatever the client announced.
    pub fn real_sender(&self) -> &str {
        &self.real_sender
    }
}
