//! Routes a normalized message through the registered handlers

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::inbox::error::{DispatchError, HandlerError};
use crate::inbox::message::InboundMessage;
use crate::inbox::registry::Registration;

/// Which registrations ran for a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Indices of the registrations whose handler ran, in order
    pub invoked: Vec<usize>,
    /// Index of the blocking registration that ended the chain, if any
    pub stopped_at: Option<usize>,
}

/// Evaluate `registrations` in order against `message`, running every one
/// that fires (see [`Registration`] for the matching rule).
///
/// Handlers run one after another on the calling thread. A blocking
/// registration that fires ends the chain. A handler that fails or panics
/// aborts the chain and no later handler runs.
pub fn dispatch(
    message: &InboundMessage,
    registrations: &[Arc<Registration>],
) -> Result<DispatchOutcome, DispatchError> {
    let mut outcome = DispatchOutcome::default();

    for (index, registration) in registrations.iter().enumerate() {
        if !registration.matches(message) {
            continue;
        }

        debug!(index, handler = registration.name(), "handler fired");
        invoke(registration, message).map_err(|source| DispatchError::Handler {
            index,
            name: registration.name().to_string(),
            source,
        })?;
        outcome.invoked.push(index);

        if registration.is_blocking() {
            outcome.stopped_at = Some(index);
            break;
        }
    }

    Ok(outcome)
}

fn invoke(registration: &Registration, message: &InboundMessage) -> Result<(), HandlerError> {
    panic::catch_unwind(AssertUnwindSafe(|| registration.handler().handle(message)))
        .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::registry::MessageHandler;
    use std::sync::Mutex;

    /// Records its label into a shared log every time it runs
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl MessageHandler for Recorder {
        fn handle(&self, _message: &InboundMessage) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push(self.label);
            if self.fail {
                Err(HandlerError::new(format!("{} failed", self.label)))
            } else {
                Ok(())
            }
        }
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Recorder {
        Recorder {
            label,
            log: Arc::clone(log),
            fail: false,
        }
    }

    fn failing(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Recorder {
        Recorder {
            fail: true,
            ..recorder(label, log)
        }
    }

    fn message() -> InboundMessage {
        InboundMessage {
            recipients: vec!["rcpt@example.com".to_string()],
            sender: "other@y".to_string(),
            subject: "X".to_string(),
            body: "hello".to_string(),
            raw: String::new(),
            real_sender: String::new(),
        }
    }

    fn chain(registrations: Vec<Registration>) -> Vec<Arc<Registration>> {
        registrations.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn test_blocking_handler_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registrations = chain(vec![
            Registration::new(recorder("h1", &log)),
            Registration::new(recorder("h2", &log)),
        ]);

        let outcome = dispatch(&message(), &registrations).unwrap();
        assert_eq!(*log.lock().unwrap(), ["h1"]);
        assert_eq!(outcome.invoked, [0]);
        assert_eq!(outcome.stopped_at, Some(0));
    }

    #[test]
    fn test_non_blocking_handlers_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registrations = chain(vec![
            Registration::new(recorder("h1", &log)).block(false),
            Registration::new(recorder("h2", &log)).block(false),
            Registration::new(recorder("h3", &log)),
        ]);

        let outcome = dispatch(&message(), &registrations).unwrap();
        assert_eq!(*log.lock().unwrap(), ["h1", "h2", "h3"]);
        assert_eq!(outcome.invoked, [0, 1, 2]);
        assert_eq!(outcome.stopped_at, Some(2));
    }

    #[test]
    fn test_unmatched_blocking_handler_does_not_stop_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registrations = chain(vec![
            Registration::new(recorder("h1", &log)).subject("something else"),
            Registration::new(recorder("h2", &log)),
        ]);

        let outcome = dispatch(&message(), &registrations).unwrap();
        assert_eq!(*log.lock().unwrap(), ["h2"]);
        assert_eq!(outcome.invoked, [1]);
    }

    #[test]
    fn test_or_semantics_fire_on_subject_despite_sender_mismatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registrations = chain(vec![
            Registration::new(recorder("h1", &log))
                .sender("nomatch@x")
                .subject("X"),
        ]);

        dispatch(&message(), &registrations).unwrap();
        assert_eq!(*log.lock().unwrap(), ["h1"]);
    }

    #[test]
    fn test_nothing_fires_when_no_constraint_matches() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registrations = chain(vec![
            Registration::new(recorder("h1", &log))
                .sender("nomatch@x")
                .text("nope"),
        ]);

        let outcome = dispatch(&message(), &registrations).unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(outcome, DispatchOutcome::default());
    }

    #[test]
    fn test_failing_handler_aborts_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registrations = chain(vec![
            Registration::new(recorder("h1", &log)).block(false),
            Registration::new(failing("h2", &log))
                .named("broken")
                .block(false),
            Registration::new(recorder("h3", &log)),
        ]);

        let error = dispatch(&message(), &registrations).unwrap_err();
        assert_eq!(*log.lock().unwrap(), ["h1", "h2"]);

        let DispatchError::Handler {
            index,
            name,
            source,
        } = error;
        assert_eq!(index, 1);
        assert_eq!(name, "broken");
        assert_eq!(source.to_string(), "h2 failed");
    }

    #[test]
    fn test_panicking_handler_is_reported_as_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registrations = chain(vec![
            Registration::new(|_: &InboundMessage| -> Result<(), HandlerError> {
                panic!("handler exploded")
            })
            .block(false),
            Registration::new(recorder("after", &log)),
        ]);

        let error = dispatch(&message(), &registrations).unwrap_err();
        let DispatchError::Handler { source, .. } = error;
        assert!(matches!(source, HandlerError::Panicked(ref msg) if msg == "handler exploded"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_registry_dispatches_nothing() {
        let outcome = dispatch(&message(), &[]).unwrap();
        assert_eq!(outcome, DispatchOutcome::default());
    }
}
