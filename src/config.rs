//! Server configuration.

/// Where the server listens and how it names itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1` or `0.0.0.0`.
    pub address: String,
    pub port: u16,
    /// Hostname used in the greeting and HELO replies.
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 2525,
            hostname: "inboxium.local".to_string(),
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables.
    ///
    /// Reads `INBOXIUM_ADDRESS`, `INBOXIUM_PORT` and `INBOXIUM_HOSTNAME`;
    /// unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            address: lookup("INBOXIUM_ADDRESS").unwrap_or(defaults.address),
            port: lookup("INBOXIUM_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            hostname: lookup("INBOXIUM_HOSTNAME").unwrap_or(defaults.hostname),
        }
    }

    /// Override fields with positional arguments: `[address] [port] [hostname]`.
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        if let Some(address) = args.next() {
            self.address = address;
        }
        if let Some(port) = args.next().and_then(|s| s.parse().ok()) {
            self.port = port;
        }
        if let Some(hostname) = args.next() {
            self.hostname = hostname;
        }

        self
    }
}
