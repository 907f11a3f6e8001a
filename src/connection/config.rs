//! Connection configuration.

use std::time::Duration;

/// Transport selection for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Plaintext TCP (port 143). **Not recommended outside tests.**
    Tcp,
    /// Plaintext TCP upgraded in-band after a successful STARTTLS (port 143).
    StartTls,
    /// TLS from the first byte (port 993). **Recommended.**
    #[default]
    Tls,
}

impl Transport {
    /// Default port for this transport.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tcp | Self::StartTls => 143,
            Self::Tls => 993,
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport selection.
    pub transport: Transport,
    /// Timeout for TCP connect and the TLS handshake.
    pub connect_timeout: Duration,
    /// Timeout for reading one response frame.
    pub read_timeout: Duration,
}

impl Config {
    /// Configuration for implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Starts a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            host: host.into(),
            port: None,
            transport: Transport::default(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    transport: Transport,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl ConfigBuilder {
    /// Sets an explicit port; otherwise the transport's default is used.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the transport.
    #[must_use]
    pub const fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the connect/handshake timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-frame read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            port: self.port.unwrap_or_else(|| self.transport.default_port()),
            host: self.host,
            transport: self.transport,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
        }
    }
}
