use rustls::client::VerifierBuilderError;
use x509_parser::error::X509Error;

use crate::name::{CertificateError, NameError};

/// Error type used by the library
///
/// Each failure class of a connection attempt maps onto distinct variants:
///
/// * transport: [`Error::Io`], [`Error::Timeout`], [`Error::Tunnel`]
/// * handshake or protocol: [`Error::Handshake`], [`Error::InvalidHostname`]
/// * malformed input: [`Error::EmptyCertificate`]
/// * verification failure: [`Error::Certificate`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket level I/O error, or error reading a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An I/O step did not complete within the configured timeout
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The proxy refused or broke the CONNECT tunnel
    #[error("proxy tunnel failed: {0}")]
    Tunnel(String),
    /// Bad PEM file
    #[error("PEM error: {0}")]
    Pem(#[from] crate::pem::PemError),
    /// Error decoding a certificate
    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),
    /// Error returned by Rustls while building a configuration
    #[error("Rustls error: {0}")]
    Tls(#[from] rustls::Error),
    /// Error building a certificate verifier
    #[error("Error building certificate verifier: {0}")]
    BuilderError(#[from] VerifierBuilderError),
    /// The TLS handshake failed (untrusted chain, protocol mismatch, ...)
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
    /// The host cannot be used as a TLS server name
    #[error("invalid server name: {0}")]
    InvalidHostname(String),
    /// Hostname verification was given no certificate identity to check
    #[error("empty or no certificate")]
    EmptyCertificate,
    /// The peer certificate is not valid for the requested host
    #[error("certificate verification failed: {0}")]
    Certificate(#[from] CertificateError),
    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A consent-to-track value outside of the accepted set
    #[error("Consent to track value must be one of ('yes', 'no', 'unchanged'), got '{0}'")]
    InvalidConsentToTrack(String),
}

impl Error {
    /// True if the peer presented a certificate that is not valid for the requested host
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Certificate(_))
    }

    /// True for socket, timeout and proxy errors that a caller may choose to retry
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::Tunnel(_))
    }
}

impl From<NameError> for Error {
    fn from(err: NameError) -> Self {
        match err {
            NameError::EmptyCertificate => Self::EmptyCertificate,
            NameError::Mismatch(err) => Self::Certificate(err),
        }
    }
}

impl From<x509_parser::nom::Err<X509Error>> for Error {
    fn from(err: x509_parser::nom::Err<X509Error>) -> Self {
        match err {
            x509_parser::nom::Err::Incomplete(_) => Self::X509(X509Error::InvalidCertificate),
            x509_parser::nom::Err::Error(err) | x509_parser::nom::Err::Failure(err) => {
                Self::X509(err)
            }
        }
    }
}
