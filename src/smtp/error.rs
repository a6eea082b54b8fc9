//! Error types for the SMTP protocol layer

use crate::smtp::response::SmtpResponse;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Invalid state for command: {0}")]
    InvalidState(String),

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    /// A line or address component exceeded its length limit
    #[error("{field} too long (max {max})")]
    TooLong { field: Field, max: usize },

    #[error("Too many recipients (max {max})")]
    TooManyRecipients { max: usize },

    #[error("Too much mail data (max {max} bytes)")]
    TooMuchData { max: usize },
}

/// The piece of input a [`SmtpError::TooLong`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Line,
    Path,
    Domain,
    User,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Line => "Line",
            Field::Path => "Path",
            Field::Domain => "Domain name",
            Field::User => "User name",
        })
    }
}

/// Size limits from RFC 821 section 4.5.3, plus a payload cap
pub struct SmtpLimits;

impl SmtpLimits {
    pub const USER_MAX_LENGTH: usize = 64;
    pub const DOMAIN_MAX_LENGTH: usize = 64;
    /// Reverse-path or forward-path, brackets included
    pub const PATH_MAX_LENGTH: usize = 256;
    /// Includes CRLF
    pub const COMMAND_LINE_MAX_LENGTH: usize = 512;
    pub const REPLY_LINE_MAX_LENGTH: usize = 512;
    /// A single DATA line, CRLF included
    pub const TEXT_LINE_MAX_LENGTH: usize = 1000;
    pub const MAX_RECIPIENTS: usize = 100;
    pub const MAX_DATA_SIZE: usize = 10 * 1024 * 1024;
}

impl SmtpError {
    /// The reply sent to the client when this error ends a command.
    ///
    /// IO failures map to `421` and close the exchange; everything else is
    /// a permanent `5xx` the client can act on.
    pub fn reply(&self) -> SmtpResponse {
        let code = match self {
            SmtpError::Io(_) => "421",
            SmtpError::InvalidCommand | SmtpError::TooLong { field: Field::Line, .. } => "500",
            SmtpError::InvalidSyntax(_) | SmtpError::TooLong { .. } => "501",
            SmtpError::InvalidState(_) => "503",
            SmtpError::TooManyRecipients { .. } | SmtpError::TooMuchData { .. } => "552",
        };
        match self {
            SmtpError::Io(_) => SmtpResponse::error(code, "Service not available"),
            SmtpError::InvalidCommand => {
                SmtpResponse::error(code, "Syntax error, command unrecognized")
            }
            SmtpError::InvalidState(detail) => {
                SmtpResponse::error(code, &format!("Bad sequence of commands: {detail}"))
            }
            SmtpError::InvalidSyntax(detail) => {
                SmtpResponse::error(code, &format!("Syntax error: {detail}"))
            }
            other => SmtpResponse::error(code, &other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_errors_map_to_permanent_codes() {
        assert_eq!(SmtpError::TooManyRecipients { max: 1 }.reply().code, "552");
        assert_eq!(SmtpError::TooMuchData { max: 1 }.reply().code, "552");
        let user = SmtpError::TooLong { field: Field::User, max: 1 };
        assert_eq!(user.reply().code, "501");
        let line = SmtpError::TooLong { field: Field::Line, max: 1 };
        assert_eq!(line.reply().code, "500");
    }

    #[test]
    fn test_too_long_names_the_field() {
        let error = SmtpError::TooLong { field: Field::Domain, max: 64 };
        assert_eq!(error.reply().message, "Domain name too long (max 64)");
    }

    #[test]
    fn test_state_error_message_carries_detail() {
        let error = SmtpError::InvalidState("DATA command requires RCPT first".to_string());
        let reply = error.reply();
        assert_eq!(reply.code, "503");
        assert_eq!(
            reply.message,
            "Bad sequence of commands: DATA command requires RCPT first"
        );
    }

    #[test]
    fn test_io_error_is_transient() {
        let reply = SmtpError::from(std::io::Error::other("boom")).reply();
        assert_eq!(reply.code, "421");
        assert_eq!(reply.message, "Service not available");
    }
}
