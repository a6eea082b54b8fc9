//! Turns a completed SMTP transaction into an [`InboundMessage`]

use std::net::SocketAddr;

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::inbox::error::NormalizationError;
use crate::inbox::message::{Envelope, InboundMessage, SessionInfo};

/// Parse the payload of `envelope` and build the message handed to handlers.
///
/// The subject is decoded from RFC 2047 encoded words. The body is the first
/// `text/plain` part of a multipart message, or the single payload of a
/// non-multipart one, decoded with its declared charset. A message without
/// plain text gets an empty body.
pub fn normalize(
    envelope: &Envelope,
    session: &SessionInfo,
) -> Result<InboundMessage, NormalizationError> {
    if envelope.content.trim_ascii().is_empty() {
        return Err(NormalizationError::EmptyPayload);
    }

    let parsed = MessageParser::default()
        .parse(envelope.content.as_slice())
        .ok_or(NormalizationError::Unparseable {
            size: envelope.content_size(),
        })?;

    Ok(InboundMessage {
        recipients: envelope.recipients.clone(),
        sender: envelope.sender.clone(),
        subject: parsed.subject().unwrap_or_default().to_string(),
        body: extract_body(&parsed),
        raw: String::from_utf8_lossy(&envelope.content).into_owned(),
        real_sender: real_sender(&session.host_name, session.peer),
    })
}

fn extract_body(message: &Message<'_>) -> String {
    match message.parts.first() {
        None => String::new(),
        Some(root) if matches!(root.body, PartType::Multipart(_)) => {
            first_plain_text(message, 0).unwrap_or_default()
        }
        Some(root) => decode_part(root),
    }
}

/// Depth-first search from part `id`, in structural order. Attached
/// `message/rfc822` parts are searched before their later siblings.
fn first_plain_text(message: &Message<'_>, id: usize) -> Option<String> {
    let part = message.parts.get(id)?;
    match &part.body {
        PartType::Multipart(children) => children
            .iter()
            .find_map(|child| first_plain_text(message, *child as usize)),
        PartType::Message(attached) => first_plain_text(attached, 0),
        _ if is_plain_text(part) => Some(decode_part(part)),
        _ => None,
    }
}

// Parts without a Content-Type header default to text/plain.
fn is_plain_text(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        Some(content_type) => {
            content_type.ctype().eq_ignore_ascii_case("text")
                && content_type
                    .subtype()
                    .is_some_and(|subtype| subtype.eq_ignore_ascii_case("plain"))
        }
        None => matches!(part.body, PartType::Text(_)),
    }
}

fn decode_part(part: &MessagePart<'_>) -> String {
    match &part.body {
        // Already converted from the declared charset by the parser
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    }
}

fn real_sender(host_name: &str, peer: Option<SocketAddr>) -> String {
    peer.map(|addr| format!("{host_name} (http://{}:{})", addr.ip(), addr.port()))
        .unwrap_or_default()
}
