use sfio_client_util::connector::VerifiedConnector;
use sfio_client_util::{ClientIdentity, ConnectorConfig, Error, ProtocolVersions, TrustStore, Tunnel};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

fn certs_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("certs")
}

fn local_host(port: u16) -> SocketAddr {
    SocketAddrV4::new(Ipv4Addr::LOCALHOST, port).into()
}

fn load_certs(path: &Path) -> Vec<CertificateDer<'static>> {
    CertificateDer::pem_file_iter(path)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Server config presenting `<name>.crt`, optionally requiring a client certificate issued by the test CA
fn server_config(name: &str, require_client_cert: bool) -> Arc<ServerConfig> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let certs = load_certs(&certs_dir().join(format!("{name}.crt")));
    let key = PrivateKeyDer::from_pem_file(certs_dir().join(format!("{name}.key"))).unwrap();

    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .unwrap();

    let builder = if require_client_cert {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(&certs_dir().join("ca.crt")) {
            roots.add(cert).unwrap();
        }
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .unwrap();
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    let mut config = builder.with_single_cert(certs, key).unwrap();
    // keep the client's receive buffer empty so an aborted connection closes cleanly
    config.send_tls13_tickets = 0;
    Arc::new(config)
}

fn trust_store() -> TrustStore {
    TrustStore::from_pem_file(&certs_dir().join("ca.crt")).unwrap()
}

fn connector(config: ConnectorConfig) -> VerifiedConnector {
    VerifiedConnector::new(&trust_store(), config.timeout(Duration::from_secs(5))).unwrap()
}

/// Outer result is the server side of the handshake, inner result is everything echoed until EOF
type ServerTask = JoinHandle<io::Result<io::Result<Vec<u8>>>>;

/// Accept a single TLS connection and echo everything back until the client closes
async fn spawn_server(config: Arc<ServerConfig>) -> (u16, ServerTask) {
    let listener = TcpListener::bind(local_host(0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from(config);

    let task = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await?;
        let mut stream = acceptor.accept(tcp).await?;

        let echo = async {
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let count = stream.read(&mut buf).await?;
                if count == 0 {
                    return Ok(received);
                }
                received.extend_from_slice(&buf[..count]);
                stream.write_all(&buf[..count]).await?;
            }
        };

        Ok(echo.await)
    });

    (port, task)
}

async fn tcp_to(port: u16) -> TcpStream {
    TcpStream::connect(local_host(port)).await.unwrap()
}

async fn ping(stream: &mut (impl AsyncReadExt + AsyncWriteExt + Unpin)) {
    stream.write_all(b"ping").await.unwrap();
    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"ping");
    stream.shutdown().await.unwrap();
}

#[tokio::test]
async fn accepts_host_listed_in_san() {
    let (port, server) = spawn_server(server_config("api", false)).await;

    let mut stream = connector(ConnectorConfig::new())
        .connect_stream(tcp_to(port).await, "api.example.com")
        .await
        .unwrap();

    ping(&mut stream).await;

    let received = server.await.unwrap().unwrap().unwrap();
    assert_eq!(received, b"ping");
}

#[tokio::test]
async fn rejects_host_not_listed_and_closes_socket() {
    let (port, server) = spawn_server(server_config("api", false)).await;

    let err = connector(ConnectorConfig::new())
        .connect_stream(tcp_to(port).await, "evil.example.com")
        .await
        .unwrap_err();

    assert!(err.is_verification_failure(), "unexpected error: {err}");
    match &err {
        Error::Certificate(err) => {
            assert_eq!(err.hostname(), "evil.example.com");
            assert_eq!(err.candidates(), ["api.example.com"]);
        }
        other => panic!("expected a certificate error, got {other:?}"),
    }

    // the handshake itself succeeded on the server side ...
    let echoed = server.await.unwrap().expect("server handshake failed");
    // ... but the connection was closed without any application data
    match echoed {
        Ok(data) => assert!(data.is_empty()),
        Err(_) => (),
    }
}

#[tokio::test]
async fn falls_back_to_common_name_without_san() {
    let (port, server) = spawn_server(server_config("legacy", false)).await;

    let mut stream = connector(ConnectorConfig::new())
        .connect_stream(tcp_to(port).await, "legacy.example.com")
        .await
        .unwrap();

    ping(&mut stream).await;
    assert_eq!(server.await.unwrap().unwrap().unwrap(), b"ping");
}

#[tokio::test]
async fn common_name_mismatch_is_reported() {
    let (port, _server) = spawn_server(server_config("legacy", false)).await;

    let err = connector(ConnectorConfig::new())
        .connect_stream(tcp_to(port).await, "other.example.com")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "certificate verification failed: hostname 'other.example.com' doesn't match 'legacy.example.com'"
    );
}

#[tokio::test]
async fn untrusted_chain_fails_the_handshake() {
    let (port, server) = spawn_server(server_config("rogue", false)).await;

    let err = connector(ConnectorConfig::new())
        .connect_stream(tcp_to(port).await, "api.example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Handshake(_)), "unexpected error: {err}");
    assert!(!err.is_verification_failure());
    assert!(server.await.unwrap().is_err());
}

#[tokio::test]
async fn presents_client_certificate() {
    let (port, server) = spawn_server(server_config("api", true)).await;

    let identity = ClientIdentity::new(
        certs_dir().join("client.crt"),
        certs_dir().join("client-encrypted.key"),
    )
    .password("foobar");

    let mut stream = connector(
        ConnectorConfig::new()
            .client_identity(identity)
            .protocol_versions(ProtocolVersions::v13_only()),
    )
    .connect_stream(tcp_to(port).await, "api.example.com")
    .await
    .unwrap();

    ping(&mut stream).await;
    assert_eq!(server.await.unwrap().unwrap().unwrap(), b"ping");
}

#[tokio::test]
async fn connects_by_name() {
    let (port, server) = spawn_server(server_config("localhost", false)).await;

    let mut stream = connector(ConnectorConfig::new().source_address(local_host(0)))
        .connect("localhost", port)
        .await
        .unwrap();

    ping(&mut stream).await;
    assert_eq!(server.await.unwrap().unwrap().unwrap(), b"ping");
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    // grab a free port and release it so nothing is listening
    let port = {
        let listener = TcpListener::bind(local_host(0)).await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = connector(ConnectorConfig::new())
        .connect("127.0.0.1", port)
        .await
        .unwrap_err();

    assert!(err.is_transport(), "unexpected error: {err}");
}

#[tokio::test]
async fn stalled_handshake_times_out() {
    let listener = TcpListener::bind(local_host(0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    // accept the TCP connection but never answer the ClientHello
    let _server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(tcp);
    });

    let connector = VerifiedConnector::new(
        &trust_store(),
        ConnectorConfig::new().timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let err = connector
        .connect_stream(tcp_to(port).await, "api.example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "unexpected error: {err}");
}

/// Minimal HTTP proxy: answers one CONNECT with `status_line` and, on 200, relays to `upstream`
async fn spawn_proxy(status_line: &'static str, upstream: u16) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind(local_host(0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let task = tokio::spawn(async move {
        let (mut client, _) = listener.accept().await.unwrap();

        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            head.push(client.read_u8().await.unwrap());
        }

        client
            .write_all(format!("{status_line}\r\n\r\n").as_bytes())
            .await
            .unwrap();

        if status_line.contains(" 200 ") {
            let mut server = tcp_to(upstream).await;
            let _ = tokio::io::copy_bidirectional(&mut client, &mut server).await;
        }

        String::from_utf8(head).unwrap()
    });

    (port, task)
}

#[tokio::test]
async fn tunnels_through_proxy() {
    let (server_port, server) = spawn_server(server_config("api", false)).await;
    let (proxy_port, proxy) =
        spawn_proxy("HTTP/1.1 200 Connection established", server_port).await;

    let tunnel = Tunnel::new("127.0.0.1", proxy_port).header("Proxy-Authorization", "Basic Zm9v");
    let mut stream = connector(ConnectorConfig::new().tunnel(tunnel))
        .connect("api.example.com", 443)
        .await
        .unwrap();

    ping(&mut stream).await;
    assert_eq!(server.await.unwrap().unwrap().unwrap(), b"ping");

    let request = proxy.await.unwrap();
    assert!(request.starts_with("CONNECT api.example.com:443 HTTP/1.1\r\n"));
    assert!(request.contains("\r\nProxy-Authorization: Basic Zm9v\r\n"));
}

#[tokio::test]
async fn refused_tunnel_is_a_transport_error() {
    let (proxy_port, _proxy) = spawn_proxy("HTTP/1.1 403 Forbidden", 0).await;

    let err = connector(ConnectorConfig::new().tunnel(Tunnel::new("127.0.0.1", proxy_port)))
        .connect("api.example.com", 443)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Tunnel(_)), "unexpected error: {err}");
    assert!(err.is_transport());
}

#[tokio::test]
async fn connections_are_independent() {
    let (good_port, _good) = spawn_server(server_config("api", false)).await;
    let (bad_port, _bad) = spawn_server(server_config("api", false)).await;

    let connector = connector(ConnectorConfig::new());
    let good_tcp = tcp_to(good_port).await;
    let bad_tcp = tcp_to(bad_port).await;
    let (good, bad) = tokio::join!(
        connector.connect_stream(good_tcp, "api.example.com"),
        connector.connect_stream(bad_tcp, "evil.example.com"),
    );

    assert!(good.is_ok());
    assert!(bad.unwrap_err().is_verification_failure());
}
