use std::path::Path;
use std::sync::Arc;

use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;

/// Fixed set of trust anchors used to validate server certificate chains
///
/// The platform's certificate store is never consulted. A store is immutable once
/// built and can be cloned cheaply and shared between connectors and threads.
#[derive(Clone, Debug)]
pub struct TrustStore {
    roots: Arc<RootCertStore>,
}

impl TrustStore {
    /// The Mozilla root program bundle compiled into the library
    pub fn bundled() -> Self {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        tracing::debug!(anchors = roots.len(), "loaded bundled trust store");
        Self {
            roots: Arc::new(roots),
        }
    }

    /// Load trust anchors from a PEM bundle shipped with the application
    ///
    /// The file must contain at least one `CERTIFICATE` section.
    pub fn from_pem_file(path: &Path) -> Result<Self, crate::Error> {
        let certs = crate::pem::read_certificates(path)?;
        let store = Self::from_certificates(&certs)?;
        tracing::debug!(
            path = %path.display(),
            anchors = store.len(),
            "loaded trust store"
        );
        Ok(store)
    }

    /// Load trust anchors from an in-memory PEM bundle
    pub fn from_pem<B: AsRef<[u8]>>(bytes: B) -> Result<Self, crate::Error> {
        let certs = crate::pem::parse_certificates(bytes)?;
        Self::from_certificates(&certs)
    }

    fn from_certificates(certs: &[CertificateDer<'_>]) -> Result<Self, crate::Error> {
        let mut roots = RootCertStore::empty();
        for cert in certs {
            let anchor = webpki::anchor_from_trusted_cert(cert)
                .map_err(|err| rustls::Error::General(format!("bad trust anchor: {err}")))?;
            roots.extend(std::iter::once(anchor.to_owned()));
        }
        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    /// Number of trust anchors in the store
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// True if the store holds no anchors
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub(crate) fn roots(&self) -> Arc<RootCertStore> {
        self.roots.clone()
    }
}
