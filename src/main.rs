use inboxium::{HandlerError, InboundMessage, Registration, ServerConfig, SmtpServer};
use std::env;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().with_args(env::args().skip(1));
    let server = SmtpServer::new(&config.hostname);

    server.register(
        Registration::new(|message: &InboundMessage| -> Result<(), HandlerError> {
            tracing::info!(
                from = %message.sender(),
                to = ?message.recipients(),
                subject = %message.subject(),
                origin = %message.real_sender(),
                body_len = message.body().len(),
                "received message"
            );
            Ok(())
        })
        .named("log"),
    );

    if let Err(e) = server.serve(&config.address, config.port) {
        tracing::error!(error = %e, "failed to start server");
        std::process::exit(1);
    }
}
