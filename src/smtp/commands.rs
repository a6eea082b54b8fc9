//! Implementation of SMTP commands

use tracing::debug;

use crate::inbox::adapter::SessionAdapter;
use crate::smtp::error::{Field, SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

/// Parses command lines and drives the session
#[derive(Debug)]
pub struct SmtpCommandHandler<'a> {
    hostname: &'a str,
    adapter: &'a SessionAdapter,
}

impl<'a> SmtpCommandHandler<'a> {
    /// Create a new command handler
    pub fn new(hostname: &'a str, adapter: &'a SessionAdapter) -> Self {
        Self { hostname, adapter }
    }

    /// Process a command line and return a response
    pub fn process_command(
        &self,
        command_line: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if command_line.len() > SmtpLimits::COMMAND_LINE_MAX_LENGTH {
            return Err(SmtpError::TooLong {
                field: Field::Line,
                max: SmtpLimits::COMMAND_LINE_MAX_LENGTH,
            });
        }

        let parts: Vec<&str> = command_line.split_whitespace().collect();
        if parts.is_empty() {
            return Err(SmtpError::InvalidCommand);
        }

        let cmd = parts[0].to_uppercase();
        debug!(command = %cmd, "processing command");

        match cmd.as_str() {
            "HELO" => self.handle_helo(&parts, session),
            #[cfg(feature = "ehlo")]
            "EHLO" => self.handle_ehlo(&parts, session),
            "MAIL" => self.handle_mail(&parts, session),
            "RCPT" => self.handle_rcpt(&parts, session),
            "DATA" => self.handle_data(&parts, session),
            "RSET" => self.handle_rset(session),
            "NOOP" => Ok(SmtpResponse::ok()),
            "QUIT" => Ok(SmtpResponse::quit()),
            _ => Err(SmtpError::InvalidCommand),
        }
    }

    fn handle_helo(
        &self,
        parts: &[&str],
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        let client_domain = Self::greeting_domain(parts, "HELO")?;
        session.set_client_domain(client_domain.to_string())?;

        Ok(SmtpResponse::helo(self.hostname, client_domain))
    }

    #[cfg(feature = "ehlo")]
    fn handle_ehlo(
        &self,
        parts: &[&str],
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        let client_domain = Self::greeting_domain(parts, "EHLO")?;
        session.set_client_domain(client_domain.to_string())?;

        Ok(SmtpResponse::ehlo(self.hostname, client_domain))
    }

    fn greeting_domain<'p>(parts: &[&'p str], command: &str) -> Result<&'p str, SmtpError> {
        parts
            .get(1)
            .copied()
            .ok_or_else(|| SmtpError::InvalidSyntax(format!("{command} requires domain argument")))
    }

    /// MAIL FROM:<address> [parameters]. `<>` opens a transaction with no sender.
    fn handle_mail(
        &self,
        parts: &[&str],
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("MAIL") {
            return Err(SmtpError::InvalidState(
                "MAIL command requires HELO first".to_string(),
            ));
        }

        let argument = parts[1..].join(" ");
        let addr = Self::parse_path(&argument, "FROM:", "MAIL")?;

        if !addr.is_empty() {
            Self::validate_email_address(addr)?;
        }

        session.set_sender(addr.to_string())?;

        Ok(SmtpResponse::ok())
    }

    /// RCPT TO:<address> [parameters]
    fn handle_rcpt(
        &self,
        parts: &[&str],
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("RCPT") {
            return Err(SmtpError::InvalidState(
                "RCPT command requires MAIL first".to_string(),
            ));
        }

        let argument = parts[1..].join(" ");
        let addr = Self::parse_path(&argument, "TO:", "RCPT")?;

        if addr.is_empty() {
            return Err(SmtpError::InvalidSyntax(
                "TO address cannot be empty".to_string(),
            ));
        }

        Self::validate_email_address(addr)?;

        session.add_recipient(addr.to_string(), self.adapter)
    }

    fn handle_data(
        &self,
        parts: &[&str],
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("DATA") {
            return Err(SmtpError::InvalidState(
                "DATA command requires RCPT first".to_string(),
            ));
        }

        if parts.len() > 1 {
            return Err(SmtpError::InvalidSyntax(
                "DATA command takes no arguments".to_string(),
            ));
        }

        session.start_data_mode()?;

        Ok(SmtpResponse::data_start())
    }

    fn handle_rset(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("RSET") {
            return Err(SmtpError::InvalidState(
                "RSET command requires HELO first".to_string(),
            ));
        }

        session.reset();
        Ok(SmtpResponse::ok())
    }

    /// Extract the address between angle brackets after `keyword`, ignoring
    /// any ESMTP parameters that follow it.
    fn parse_path<'s>(argument: &'s str, keyword: &str, command: &str) -> Result<&'s str, SmtpError> {
        let rest = argument
            .get(..keyword.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(keyword))
            .map(|_| argument[keyword.len()..].trim_start())
            .ok_or_else(|| {
                SmtpError::InvalidSyntax(format!("{command} command must be '{command} {keyword}<address>'"))
            })?;

        let path = rest.strip_prefix('<').and_then(|path| {
            path.find('>').map(|end| &path[..end])
        });

        path.ok_or_else(|| {
            SmtpError::InvalidSyntax("address must be enclosed in angle brackets".to_string())
        })
    }

    /// Validate email address format and size limits
    fn validate_email_address(addr: &str) -> Result<(), SmtpError> {
        let Some((user_part, domain_part)) = addr.split_once('@') else {
            return Err(SmtpError::InvalidSyntax(
                "Email address must contain @ symbol".to_string(),
            ));
        };

        if user_part.len() > SmtpLimits::USER_MAX_LENGTH {
            return Err(SmtpError::TooLong {
                field: Field::User,
                max: SmtpLimits::USER_MAX_LENGTH,
            });
        }

        if domain_part.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
            return Err(SmtpError::TooLong {
                field: Field::Domain,
                max: SmtpLimits::DOMAIN_MAX_LENGTH,
            });
        }

        if user_part.is_empty() || domain_part.is_empty() {
            return Err(SmtpError::InvalidSyntax(
                "Invalid email address format".to_string(),
            ));
        }

        Ok(())
    }
}
