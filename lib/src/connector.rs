use std::future::Future;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::{match_hostname, CertificateIdentity, ConnectorConfig, Error, TrustStore, Tunnel};

/// Upper bound on the size of the proxy's response to `CONNECT`
const MAX_TUNNEL_RESPONSE: usize = 8 * 1024;

/// Opens TLS connections whose peer certificate has been verified against the requested host
///
/// A connection attempt goes through the following steps:
///
/// 1. open a TCP connection, optionally from a source address and through a proxy tunnel
/// 2. perform the TLS handshake against the [`TrustStore`] with the host as SNI
/// 3. check the host against the names in the peer certificate with [`match_hostname`]
///
/// If the last step fails the socket is shut down in both directions and closed before the
/// error is returned, so no application data can ever be exchanged with the peer.
///
/// The connector holds no mutable state and can be shared between tasks.
#[derive(Clone)]
pub struct VerifiedConnector {
    tls: TlsConnector,
    config: ConnectorConfig,
}

impl VerifiedConnector {
    /// Build a connector which only trusts the anchors in `trust`
    pub fn new(trust: &TrustStore, config: ConnectorConfig) -> Result<Self, Error> {
        let tls = crate::client::deferred_name_verification(
            config.protocol_versions,
            trust,
            config.client_identity.as_ref(),
        )?;

        Ok(Self {
            tls: TlsConnector::from(Arc::new(tls)),
            config,
        })
    }

    /// Settings this connector was built with
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Connect to `host:port` and return a verified TLS stream
    pub async fn connect(&self, host: &str, port: u16) -> Result<TlsStream<TcpStream>, Error> {
        let tcp = match &self.config.tunnel {
            Some(tunnel) => {
                let mut tcp = self.open_tcp(&tunnel.host, tunnel.port).await?;
                with_timeout(
                    self.config.timeout,
                    establish_tunnel(&mut tcp, tunnel, host, port),
                )
                .await?;
                debug!(
                    proxy = %tunnel.host,
                    host,
                    port,
                    "proxy tunnel established"
                );
                tcp
            }
            None => self.open_tcp(host, port).await?,
        };

        self.connect_stream(tcp, host).await
    }

    /// Perform the TLS handshake and hostname verification over an already connected stream
    ///
    /// `host` is used both as the SNI value and as the name the certificate must be valid for.
    pub async fn connect_stream(
        &self,
        tcp: TcpStream,
        host: &str,
    ) -> Result<TlsStream<TcpStream>, Error> {
        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|err| Error::InvalidHostname(format!("{host}: {err}")))?;

        let stream = with_timeout(self.config.timeout, async {
            self.tls
                .connect(server_name, tcp)
                .await
                .map_err(Error::Handshake)
        })
        .await?;

        debug!(host, "TLS handshake complete");

        if let Err(err) = verify_peer(&stream, host) {
            warn!(host, error = %err, "peer certificate rejected, closing connection");
            abort(stream);
            return Err(err);
        }

        debug!(host, "peer certificate verified");

        Ok(stream)
    }

    async fn open_tcp(&self, host: &str, port: u16) -> Result<TcpStream, Error> {
        with_timeout(
            self.config.timeout,
            resolve_and_connect(host, port, self.config.source_address),
        )
        .await
    }
}

/// Try each resolved address in turn, returning the first successful connection
async fn resolve_and_connect(
    host: &str,
    port: u16,
    source: Option<SocketAddr>,
) -> Result<TcpStream, Error> {
    let mut last_err = None;
    for addr in tokio::net::lookup_host((host, port)).await? {
        match connect_addr(addr, source).await {
            Ok(stream) => {
                debug!(host, %addr, "TCP connected");
                return Ok(stream);
            }
            Err(err) => {
                debug!(host, %addr, error = %err, "TCP connect failed");
                last_err = Some(err);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{host} did not resolve to any address"),
        )
    });

    Err(err.into())
}

async fn connect_addr(addr: SocketAddr, source: Option<SocketAddr>) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    if let Some(source) = source {
        socket.bind(source)?;
    }

    socket.connect(addr).await
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

fn verify_peer(stream: &TlsStream<TcpStream>, host: &str) -> Result<(), Error> {
    let (_, conn) = stream.get_ref();

    let identity = match conn.peer_certificates().and_then(|certs| certs.first()) {
        Some(cert) => CertificateIdentity::from_der(cert.as_ref())?,
        None => CertificateIdentity::default(),
    };

    match_hostname(&identity, host)?;

    Ok(())
}

/// Shut down both directions of the underlying socket and close it
fn abort(stream: TlsStream<TcpStream>) {
    let (tcp, _) = stream.into_inner();

    match tcp.into_std() {
        Ok(tcp) => {
            if let Err(err) = tcp.shutdown(Shutdown::Both) {
                debug!(error = %err, "socket shutdown failed");
            }
        }
        Err(err) => debug!(error = %err, "unable to detach socket for shutdown"),
    }
}

async fn establish_tunnel(
    tcp: &mut TcpStream,
    tunnel: &Tunnel,
    host: &str,
    port: u16,
) -> Result<(), Error> {
    tcp.write_all(connect_request(tunnel, host, port).as_bytes())
        .await?;
    let head = read_response_head(tcp).await?;
    check_tunnel_response(&head)
}

fn connect_request(tunnel: &Tunnel, host: &str, port: u16) -> String {
    let authority = if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };

    let mut request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    for (name, value) in &tunnel.headers {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    request
}

/// Read the status line and headers one byte at a time so nothing past them is consumed
async fn read_response_head<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, Error> {
    let mut head = Vec::new();

    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_TUNNEL_RESPONSE {
            return Err(Error::Tunnel(format!(
                "response to CONNECT exceeds {MAX_TUNNEL_RESPONSE} bytes"
            )));
        }

        let mut byte = [0u8; 1];
        if reader.read(&mut byte).await? == 0 {
            return Err(Error::Tunnel(
                "proxy closed the connection during CONNECT".to_string(),
            ));
        }
        head.push(byte[0]);
    }

    Ok(String::from_utf8_lossy(&head).into_owned())
}

fn check_tunnel_response(head: &str) -> Result<(), Error> {
    let status_line = head.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();

    let version = parts.next().unwrap_or_default();
    let code = parts.next().and_then(|x| x.parse::<u16>().ok());

    match code {
        Some(200) if version.starts_with("HTTP/") => Ok(()),
        Some(_) if version.starts_with("HTTP/") => Err(Error::Tunnel(format!(
            "proxy refused CONNECT: {status_line}"
        ))),
        _ => Err(Error::Tunnel(format!(
            "malformed proxy response: {status_line}"
        ))),
    }
}
