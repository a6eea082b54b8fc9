//! SMTP replies

/// An SMTP reply sent to a client
#[derive(Debug, Clone)]
pub struct SmtpResponse {
    /// The SMTP reply code (e.g., "250", "354", "451")
    pub code: String,
    /// The human-readable message
    pub message: String,
    /// Extra lines for multiline replies (EHLO capabilities)
    pub multiline: Option<Vec<String>>,
}

impl SmtpResponse {
    /// Create a new SMTP response
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            multiline: None,
        }
    }

    /// Create a new multiline SMTP response
    pub fn new_multiline(code: &str, message: &str, lines: Vec<String>) -> Self {
        Self {
            code: code.to_owned(),
            message: message.to_owned(),
            multiline: Some(lines),
        }
    }

    /// 250 OK
    pub fn ok() -> Self {
        Self::new("250", "OK")
    }

    /// 220 greeting sent when a client connects
    pub fn greeting(hostname: &str) -> Self {
        Self::new("220", &format!("{hostname} ESMTP inboxium ready"))
    }

    /// 250 reply to HELO
    pub fn helo(hostname: &str, client_domain: &str) -> Self {
        Self::new("250", &format!("{hostname} Hello {client_domain}"))
    }

    /// 250 reply to EHLO, listing capabilities
    #[cfg(feature = "ehlo")]
    pub fn ehlo(hostname: &str, client_domain: &str) -> Self {
        use crate::smtp::error::SmtpLimits;

        let capabilities = vec![
            "PIPELINING".to_owned(),
            "8BITMIME".to_owned(),
            format!("SIZE {}", SmtpLimits::MAX_DATA_SIZE),
        ];
        Self::new_multiline(
            "250",
            &format!("{hostname} Hello {client_domain}"),
            capabilities,
        )
    }

    /// 354 reply to DATA
    pub fn data_start() -> Self {
        Self::new("354", "End data with <CR><LF>.<CR><LF>")
    }

    /// 250 reply once a message has been handled
    pub fn accepted() -> Self {
        Self::new("250", "Message accepted for delivery")
    }

    /// 451 reply when a message could not be processed; the client may retry
    pub fn transient_failure() -> Self {
        Self::new("451", "Requested action aborted: local error in processing")
    }

    /// 221 reply to QUIT
    pub fn quit() -> Self {
        Self::new("221", "Bye")
    }

    /// Create an error response
    pub fn error(code: &str, message: &str) -> Self {
        Self::new(code, message)
    }

    /// Format the response for sending over the wire
    pub fn format(&self) -> String {
        if let Some(ref lines) = self.multiline {
            let mut result = format!("{}-{}\r\n", self.code, self.message);
            for (i, line) in lines.iter().enumerate() {
                let separator = if i == lines.len() - 1 { ' ' } else { '-' };
                result.push_str(&format!("{}{separator}{line}\r\n", self.code));
            }
            result
        } else {
            format!("{} {}\r\n", self.code, self.message)
        }
    }

    /// Check if this is a success response (2xx)
    pub fn is_success(&self) -> bool {
        self.code.starts_with('2')
    }

    /// Check if this is an error response (4xx or 5xx)
    pub fn is_error(&self) -> bool {
        self.code.starts_with('4') || self.code.starts_with('5')
    }
}
