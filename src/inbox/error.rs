//! Error types for message normalization and handler dispatch

use thiserror::Error;

/// The raw payload of a transaction could not be turned into a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("message payload is empty")]
    EmptyPayload,

    #[error("message payload could not be parsed ({size} bytes)")]
    Unparseable { size: usize },
}

/// Failure reported by a message handler.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(Box<dyn std::error::Error + Send + Sync>),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Wrap any error (or a plain message) as a handler failure.
    ///
    /// ```
    /// use inboxium::HandlerError;
    ///
    /// let error = HandlerError::new("mailbox unavailable");
    /// assert_eq!(error.to_string(), "mailbox unavailable");
    /// ```
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Failed(error.into())
    }
}

/// A handler failed while a message was being dispatched.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("handler #{index} ({name}) failed")]
    Handler {
        index: usize,
        name: String,
        #[source]
        source: HandlerError,
    },
}

/// Any failure while processing a completed transaction.
#[derive(Error, Debug)]
pub enum InboxError {
    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}
