//! # Inboxium
//!
//! Inboxium is an embedded SMTP inbox.
//!
//! It accepts mail over SMTP, turns every completed transaction into an
//! [`InboundMessage`] and runs it through the handlers registered on the
//! server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inboxium::{HandlerError, InboundMessage, Registration, SmtpServer};
//!
//! let server = SmtpServer::new("inbox.local");
//!
//! // Fires for mail from alerts@example.com, then stops the chain
//! server.register(
//!     Registration::new(|message: &InboundMessage| -> Result<(), HandlerError> {
//!         println!("alert: {}", message.subject());
//!         Ok(())
//!     })
//!     .sender("alerts@example.com"),
//! );
//!
//! // Catch-all for everything else
//! server.register(Registration::new(
//!     |message: &InboundMessage| -> Result<(), HandlerError> {
//!         println!("mail for {:?}", message.recipients());
//!         Ok(())
//!     },
//! ));
//!
//! server.serve("127.0.0.1", 2525).unwrap();
//! ```
//!
//! ## Handler matching
//!
//! Registrations are evaluated in the order they were registered:
//!
//! - A registration without constraints always fires.
//! - A registration with constraints fires when **any** of them matches
//!   exactly (`by` against the whole recipient list, `sender`, `subject`,
//!   `text` against the plain-text body). Constraints are not combined with AND.
//! - A registration that fires and is blocking (the default) ends the chain.
//! - A handler error or panic ends the chain and the client gets a `451`
//!   reply, so it may retry later.
//!
//! ## Supported SMTP commands
//!
//! - `HELO` - Identify the sender
//! - `MAIL FROM` - Specify the sender's address (`<>` is accepted)
//! - `RCPT TO` - Specify the destination (multiple destinations are supported)
//! - `DATA` - Send the email body
//! - `RSET` - Reset the current transaction
//! - `NOOP` - Do nothing
//! - `QUIT` - Close connection
//!
//! `EHLO` is available through the `ehlo` feature, which is on by default so
//! ESMTP clients can connect. Build with `default-features = false` for a
//! HELO-only server.
//!
//! ## Notes
//!
//! - Runs in-memory only. Messages are not stored.
//! - SMTP authentication, SSL/TLS and relaying are not supported.
//! - Size limits follow RFC 821, see [`SmtpLimits`].
//! - Each connection is served on its own thread, so handlers for different
//!   messages may run concurrently.

pub mod config;
mod inbox;
mod smtp;

pub use config::ServerConfig;
pub use inbox::{
    DispatchError, DispatchOutcome, Envelope, HandlerError, HandlerRegistry, InboundMessage,
    InboxError, MessageHandler, NormalizationError, Registration, SessionAdapter, SessionInfo,
    dispatch, normalize,
};
pub use smtp::{Field, SmtpError, SmtpLimits, SmtpResponse, SmtpServer, SmtpSession, SmtpState};
