//! Basic usage example for Inboxium
//!
//! Registers a few handlers, starts a server in the background and talks
//! SMTP to it with a plain TCP client.

use inboxium::{HandlerError, InboundMessage, Registration, SmtpServer};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn main() {
    println!("Inboxium Basic Usage Example");
    println!("============================");

    let (tx, rx) = mpsc::channel();
    let server = SmtpServer::new("example.local");

    // Reports are handled here and nowhere else
    let reports = tx.clone();
    server.register(
        Registration::new(move |message: &InboundMessage| -> Result<(), HandlerError> {
            reports
                .send(format!("[reports] {}", message.subject()))
                .map_err(HandlerError::new)
        })
        .by(["reports@example.com"])
        .named("reports"),
    );

    // Audit every other message, then keep going
    let audit = tx.clone();
    server.register(
        Registration::new(move |message: &InboundMessage| -> Result<(), HandlerError> {
            audit
                .send(format!("[audit] {} from {}", message.subject(), message.real_sender()))
                .map_err(HandlerError::new)
        })
        .block(false)
        .named("audit"),
    );

    // Catch-all
    server.register(
        Registration::new(move |message: &InboundMessage| -> Result<(), HandlerError> {
            tx.send(format!("[inbox] {}", message.body().trim_end()))
                .map_err(HandlerError::new)
        })
        .named("inbox"),
    );

    thread::spawn(move || {
        if let Err(e) = server.serve("127.0.0.1", 2525) {
            eprintln!("Server error: {e}");
        }
    });
    thread::sleep(Duration::from_millis(100));
    println!("Server started on 127.0.0.1:2525");

    for (recipient, subject) in [
        ("reports@example.com", "Weekly report"),
        ("someone@example.com", "Hello there"),
    ] {
        println!("\nSending '{subject}' to {recipient}...");
        if let Err(e) = send_email(recipient, subject) {
            eprintln!("Failed to send email: {e}");
            return;
        }
    }

    println!("\nHandler output:");
    while let Ok(line) = rx.recv_timeout(Duration::from_millis(200)) {
        println!("  {line}");
    }
}

fn send_email(recipient: &str, subject: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect("127.0.0.1:2525")?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut response = String::new();

    let mut expect = |stream: &mut TcpStream, line: Option<&str>| -> std::io::Result<()> {
        if let Some(line) = line {
            write!(stream, "{line}\r\n")?;
        }
        response.clear();
        reader.read_line(&mut response)?;
        print!("S: {response}");
        Ok(())
    };

    expect(&mut stream, None)?;
    expect(&mut stream, Some("HELO client.example.com"))?;
    expect(&mut stream, Some("MAIL FROM:<sender@example.com>"))?;
    expect(&mut stream, Some(format!("RCPT TO:<{recipient}>").as_str()))?;
    expect(&mut stream, Some("DATA"))?;

    write!(stream, "From: sender@example.com\r\n")?;
    write!(stream, "To: {recipient}\r\n")?;
    write!(stream, "Subject: {subject}\r\n\r\n")?;
    write!(stream, "This is a test email sent to demonstrate\r\n")?;
    write!(stream, "the Inboxium handler chain.\r\n")?;
    expect(&mut stream, Some("."))?;
    expect(&mut stream, Some("QUIT"))?;

    Ok(())
}
