//! SMTP server implementation

use crate::inbox::adapter::SessionAdapter;
use crate::inbox::registry::{HandlerRegistry, Registration};
use crate::smtp::commands::SmtpCommandHandler;
use crate::smtp::error::{Field, SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, info_span, warn};

/// SMTP server that hands every received message to its registered handlers
#[derive(Debug, Clone)]
pub struct SmtpServer {
    /// Server hostname, used in the greeting and HELO replies
    hostname: String,
    registry: Arc<HandlerRegistry>,
}

impl SmtpServer {
    /// Create a new SMTP server with no handlers
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_owned(),
            registry: Arc::new(HandlerRegistry::new()),
        }
    }

    /// Add a handler registration after all existing ones
    pub fn register(&self, registration: Registration) {
        debug!(
            handler = registration.name(),
            block = registration.is_blocking(),
            "handler registered"
        );
        self.registry.register(registration);
    }

    /// The registry shared by every connection of this server
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Listen on `address:port` and serve until the process exits (blocking)
    pub fn serve(&self, address: &str, port: u16) -> Result<(), SmtpError> {
        let listener = TcpListener::bind((address, port))?;
        self.serve_with_listener(listener)
    }

    /// Serve connections from an existing listener (blocking).
    /// Every connection runs on its own thread.
    pub fn serve_with_listener(&self, listener: TcpListener) -> Result<(), SmtpError> {
        info!(
            address = %listener.local_addr()?,
            hostname = %self.hostname,
            handlers = self.registry.len(),
            "SMTP server listening"
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_session(stream),
                Err(e) => {
                    warn!(error = %e, "error accepting connection");
                }
            }
        }

        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream) {
        let server = self.clone();
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();

        let spawned = thread::Builder::new()
            .name("smtp-session".to_string())
            .spawn(move || {
                let span = info_span!("smtp_session", peer = %peer);
                let _entered = span.enter();

                debug!("connection opened");
                if let Err(e) = server.handle_client(stream) {
                    warn!(error = %e, "error handling client");
                }
                debug!("connection closed");
            });

        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn session thread");
        }
    }

    /// Handle a client connection
    fn handle_client(&self, mut stream: TcpStream) -> Result<(), SmtpError> {
        let adapter = SessionAdapter::new(Arc::clone(&self.registry));
        let command_handler = SmtpCommandHandler::new(&self.hostname, &adapter);
        let mut session = SmtpSession::new(stream.peer_addr().ok());
        let mut reader = BufReader::new(stream.try_clone()?);

        self.send_response(&mut stream, &SmtpResponse::greeting(&self.hostname))?;

        let mut line_buffer = Vec::new();
        loop {
            line_buffer.clear();

            // One extra byte in DATA leaves room for a stuffed leading dot
            let limit = if session.in_data_mode() {
                SmtpLimits::TEXT_LINE_MAX_LENGTH + 1
            } else {
                SmtpLimits::COMMAND_LINE_MAX_LENGTH
            };

            match read_line(&mut reader, &mut line_buffer, limit) {
                Ok(LineRead::Closed) => break,
                Ok(LineRead::Line) => {}
                Ok(LineRead::Overlong) if session.in_data_mode() => {
                    debug!(limit, "discarding overlong data line");
                    session.reject_data_line();
                    continue;
                }
                Ok(LineRead::Overlong) => {
                    let error = SmtpError::TooLong {
                        field: Field::Line,
                        max: SmtpLimits::COMMAND_LINE_MAX_LENGTH,
                    };
                    debug!(error = %error, "command rejected");
                    self.send_response(&mut stream, &error.reply())?;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "error reading from client");
                    break;
                }
            }

            let line = strip_line_ending(&line_buffer);

            if session.in_data_mode() {
                if line == b"." {
                    let response = self.complete_transaction(&mut session, &adapter);
                    self.send_response(&mut stream, &response)?;
                } else {
                    session.add_data_line(line);
                }
                continue;
            }

            // Invalid UTF-8 is replaced so the command is rejected as unknown
            let line = String::from_utf8_lossy(line);
            let command = line.trim();
            if command.is_empty() {
                continue;
            }

            match command_handler.process_command(command, &mut session) {
                Ok(response) => {
                    self.send_response(&mut stream, &response)?;
                    if response.code == "221" {
                        break; // QUIT command
                    }
                }
                Err(e) => {
                    debug!(error = %e, "command rejected");
                    self.send_response(&mut stream, &e.reply())?;
                }
            }
        }

        Ok(())
    }

    /// Close the payload and let the adapter answer for it
    fn complete_transaction(
        &self,
        session: &mut SmtpSession,
        adapter: &SessionAdapter,
    ) -> SmtpResponse {
        match session.finish_data_collection() {
            Ok(envelope) => adapter.on_data(&envelope, &session.session_info(&self.hostname)),
            Err(e) => {
                warn!(error = %e, "message rejected");
                e.reply()
            }
        }
    }

    /// Send a response to the client
    fn send_response(
        &self,
        stream: &mut TcpStream,
        response: &SmtpResponse,
    ) -> Result<(), SmtpError> {
        let formatted = response.format();
        if formatted.len() > SmtpLimits::REPLY_LINE_MAX_LENGTH {
            let truncated_response =
                SmtpResponse::new(&response.code, "Response too long (truncated)");
            stream.write_all(truncated_response.format().as_bytes())?;
        } else {
            stream.write_all(formatted.as_bytes())?;
        }
        stream.flush()?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// The peer closed the connection before sending anything
    Closed,
    /// A line, possibly the unterminated tail of the stream
    Line,
    /// No LF within the limit; the rest of the line was consumed and dropped
    Overlong,
}

/// Read one LF-terminated line into `buf`, holding at most `limit` bytes of it
/// in memory.
fn read_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> io::Result<LineRead> {
    let read = reader.by_ref().take(limit as u64).read_until(b'\n', buf)?;
    if read == 0 {
        return Ok(LineRead::Closed);
    }
    if buf.ends_with(b"\n") || read < limit {
        return Ok(LineRead::Line);
    }

    reader.skip_until(b'\n')?;
    Ok(LineRead::Overlong)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
