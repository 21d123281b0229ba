use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::ProtocolVersions;

/// Default timeout applied to each I/O step of a connection attempt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client certificate chain and private key presented for mutual TLS
#[derive(Clone, Debug)]
pub struct ClientIdentity {
    /// PEM file containing the client certificate chain, leaf first
    pub cert_chain_path: PathBuf,
    /// PEM file containing the private key
    pub private_key_path: PathBuf,
    /// Password of an encrypted PKCS#8 private key
    pub private_key_password: Option<String>,
}

impl ClientIdentity {
    /// Identity backed by a plaintext private key
    pub fn new(cert_chain_path: impl Into<PathBuf>, private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_chain_path: cert_chain_path.into(),
            private_key_path: private_key_path.into(),
            private_key_password: None,
        }
    }

    /// Decrypt the private key with this password
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.private_key_password = Some(password.into());
        self
    }
}

/// HTTP proxy through which connections are tunnelled with `CONNECT`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tunnel {
    /// Proxy host
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Extra headers sent with the `CONNECT` request, e.g. `Proxy-Authorization`
    pub headers: Vec<(String, String)>,
}

impl Tunnel {
    /// Tunnel through the proxy at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            headers: Vec::new(),
        }
    }

    /// Add a header to the `CONNECT` request
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Settings of a [`crate::connector::VerifiedConnector`]
#[derive(Clone, Debug)]
pub struct ConnectorConfig {
    /// Timeout of each blocking step: TCP connect, proxy tunnel, TLS handshake
    pub timeout: Duration,
    /// Local address to bind before connecting
    pub source_address: Option<SocketAddr>,
    /// Proxy tunnel to go through
    pub tunnel: Option<Tunnel>,
    /// Certificate and key for mutual TLS
    pub client_identity: Option<ClientIdentity>,
    /// TLS versions that may be negotiated
    pub protocol_versions: ProtocolVersions,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorConfig {
    /// Configuration with a 30 second timeout, no proxy, no client certificate and
    /// TLS 1.2 and 1.3 enabled
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            source_address: None,
            tunnel: None,
            client_identity: None,
            protocol_versions: ProtocolVersions::all(),
        }
    }

    /// Set the timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind to a local address before connecting
    #[must_use]
    pub fn source_address(mut self, addr: SocketAddr) -> Self {
        self.source_address = Some(addr);
        self
    }

    /// Tunnel through an HTTP proxy
    #[must_use]
    pub fn tunnel(mut self, tunnel: Tunnel) -> Self {
        self.tunnel = Some(tunnel);
        self
    }

    /// Present a client certificate
    #[must_use]
    pub fn client_identity(mut self, identity: ClientIdentity) -> Self {
        self.client_identity = Some(identity);
        self
    }

    /// Restrict the TLS versions
    #[must_use]
    pub fn protocol_versions(mut self, versions: ProtocolVersions) -> Self {
        self.protocol_versions = versions;
        self
    }
}
