//! Message normalization, handler registry and dispatch

pub mod adapter;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod normalize;
pub mod registry;

pub use adapter::SessionAdapter;
pub use dispatch::{DispatchOutcome, dispatch};
pub use error::{DispatchError, HandlerError, InboxError, NormalizationError};
pub use message::{Envelope, InboundMessage, SessionInfo};
pub use normalize::normalize;
pub use registry::{HandlerRegistry, MessageHandler, Registration};
