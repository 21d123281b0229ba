use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;

use crate::{ClientIdentity, Error, ProtocolVersions, TrustStore};

/// Create a client configuration that validates the server's chain against `trust`
///
/// Hostname verification is NOT performed during the handshake. The configuration
/// is meant to be used through [`crate::connector::VerifiedConnector`] which checks
/// the peer certificate against the requested host before handing out the stream.
///
/// If `identity` is present, the certificate chain and private key are loaded and
/// offered to the server for mutual TLS.
pub fn deferred_name_verification(
    versions: ProtocolVersions,
    trust: &TrustStore,
    identity: Option<&ClientIdentity>,
) -> Result<rustls::ClientConfig, Error> {
    let provider = Arc::new(crate::default_crypto_provider());

    let verifier = DeferredNameVerification(
        WebPkiServerVerifier::builder_with_provider(trust.roots(), provider.clone()).build()?,
    );

    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(versions.versions())?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    let config = match identity {
        Some(identity) => {
            let cert_chain = crate::pem::read_certificates(&identity.cert_chain_path)?;
            let private_key = crate::pem::read_private_key(
                &identity.private_key_path,
                identity.private_key_password.as_deref(),
            )?;
            builder.with_client_auth_cert(cert_chain, private_key)?
        }
        None => builder.with_no_client_auth(),
    };

    Ok(config)
}

/// Wraps the WebPKI verifier and traps name errors so that the chain is still fully validated
#[derive(Debug)]
struct DeferredNameVerification(Arc<dyn ServerCertVerifier>);

impl ServerCertVerifier for DeferredNameVerification {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let res =
            self.0
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);

        match res {
            // Name verification is the LAST step inside WebPkiServerVerifier so we can safely
            // trap it here. The name is checked once the handshake completes.
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            res => res,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.0.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.0.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.supported_verify_schemes()
    }
}
