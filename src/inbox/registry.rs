//! Handler registrations and the ordered registry that holds them

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::inbox::error::HandlerError;
use crate::inbox::message::InboundMessage;

/// A unit of work run for every message whose registration fires.
///
/// Closures taking `&InboundMessage` and returning `Result<(), HandlerError>`
/// implement this trait directly.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&InboundMessage) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        self(message)
    }
}

/// A handler together with the constraints that decide when it fires.
///
/// # Matching
///
/// A registration fires when it has **no** constraints at all, or when
/// **any one** of its constraints matches. Constraints are OR-ed, not AND-ed:
/// a registration with both `sender("a@x")` and `subject("Hi")` fires for a
/// message from `a@x` with any subject, and for a message titled `Hi` from
/// anyone. Every constraint is an exact comparison; `by` compares against the
/// whole recipient list, in order.
///
/// Registrations block by default: once one fires, later registrations are
/// not evaluated for that message.
///
/// ```
/// use inboxium::{HandlerError, InboundMessage, Registration};
///
/// let registration = Registration::new(|message: &InboundMessage| {
///     println!("{}", message.subject());
///     Ok::<(), HandlerError>(())
/// })
/// .sender("alerts@example.com")
/// .block(false);
///
/// assert!(!registration.is_blocking());
/// assert!(registration.has_constraints());
/// ```
#[derive(Clone)]
pub struct Registration {
    handler: Arc<dyn MessageHandler>,
    name: Option<String>,
    by: Option<Vec<String>>,
    sender: Option<String>,
    subject: Option<String>,
    text: Option<String>,
    block: bool,
}

impl Registration {
    /// Create an unconstrained, blocking registration
    pub fn new<H>(handler: H) -> Self
    where
        H: MessageHandler + 'static,
    {
        Self {
            handler: Arc::new(handler),
            name: None,
            by: None,
            sender: None,
            subject: None,
            text: None,
            block: true,
        }
    }

    /// Name used for this registration in logs and errors
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Match when the recipient list equals `recipients` exactly
    pub fn by<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by = Some(recipients.into_iter().map(Into::into).collect());
        self
    }

    /// Match when the envelope sender equals `sender`
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Match when the decoded subject equals `subject`
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Match when the plain-text body equals `text`
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Whether firing this registration stops evaluation of later ones
    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.block
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }

    pub fn has_constraints(&self) -> bool {
        self.by.is_some() || self.sender.is_some() || self.subject.is_some() || self.text.is_some()
    }

    /// Whether this registration fires for `message`.
    pub fn matches(&self, message: &InboundMessage) -> bool {
        if !self.has_constraints() {
            return true;
        }

        self.by.as_deref() == Some(message.recipients())
            || self.sender.as_deref() == Some(message.sender())
            || self.subject.as_deref() == Some(message.subject())
            || self.text.as_deref() == Some(message.body())
    }

    pub(crate) fn handler(&self) -> &dyn MessageHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("by", &self.by)
            .field("sender", &self.sender)
            .field("subject", &self.subject)
            .field("text", &self.text)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

/// Ordered, append-only list of registrations.
///
/// Insertion order is evaluation order. Readers take a snapshot, so an append
/// racing with a dispatch never disturbs the iteration in progress.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    registrations: RwLock<Vec<Arc<Registration>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration after all existing ones
    pub fn register(&self, registration: Registration) {
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(registration));
    }

    /// Snapshot of all registrations in insertion order
    pub fn all(&self) -> Vec<Arc<Registration>> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
