use std::path::Path;

use rustls_pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer,
};

/// Error reading certificates or private keys from PEM data
#[derive(Debug)]
pub struct PemError {
    details: ErrorDetails,
}

impl std::fmt::Display for PemError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.details {
            ErrorDetails::InvalidPem(err) => write!(f, "PEM error: {err}"),
            ErrorDetails::DecryptionError(err) => write!(f, "PKCS#8 error: {err}"),
            ErrorDetails::NoPrivateKey => {
                f.write_str("PEM file does not contain a supported private key")
            }
            ErrorDetails::MoreThanOnePrivateKey => {
                f.write_str("PEM file contains more than one supported private key")
            }
            ErrorDetails::NoCertificate => f.write_str("PEM file does not contain a certificate"),
        }
    }
}

impl std::error::Error for PemError {}

#[derive(Debug)]
enum ErrorDetails {
    /// Invalid PEM file
    InvalidPem(pem::PemError),
    /// Bad PKCS #8 format or decryption failure
    DecryptionError(pkcs8::Error),
    /// PEM file does not contain a recognized private key format
    NoPrivateKey,
    /// PEM file contains more than one private key
    MoreThanOnePrivateKey,
    /// PEM file does not contain at least one certificate
    NoCertificate,
}

/// Read at least 1 certificate from a PEM file
pub(crate) fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, crate::Error> {
    let bytes = std::fs::read(path)?;
    Ok(parse_certificates(bytes)?)
}

/// Read the private key from a PEM file, decrypting it if a password is supplied
pub(crate) fn read_private_key(
    path: &Path,
    password: Option<&str>,
) -> Result<PrivateKeyDer<'static>, crate::Error> {
    let bytes = std::fs::read(path)?;
    let key = match password {
        Some(password) => PrivateKey::decrypt_from_pem(bytes, password)?,
        None => PrivateKey::read_from_pem(bytes)?,
    };
    Ok(key.into_der())
}

/// Parse at least 1 certificate from PEM data, ignoring sections of other types
pub(crate) fn parse_certificates<B: AsRef<[u8]>>(
    bytes: B,
) -> Result<Vec<CertificateDer<'static>>, PemError> {
    let entries: Vec<pem::Pem> = pem::parse_many(bytes)?;

    let certs: Vec<CertificateDer<'static>> = entries
        .into_iter()
        .filter(|x| x.tag() == "CERTIFICATE")
        .map(|x| CertificateDer::from(x.into_contents()))
        .collect();

    if certs.is_empty() {
        return Err(ErrorDetails::NoCertificate.into());
    }

    Ok(certs)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum KeyFormat {
    Pkcs8,
    Pkcs1,
    Sec1,
}

/// Private key read from a plaintext or encrypted PEM file
struct PrivateKey {
    format: KeyFormat,
    der: Vec<u8>,
}

impl PrivateKey {
    /// PEM tags that are supported for encrypted private keys
    const ALLOWED_ENCRYPTED_KEY_TAGS: &'static [&'static str] = &["ENCRYPTED PRIVATE KEY"];
    /// PEM tags that are supported for plain-text private keys
    const ALLOWED_PLAINTEXT_KEY_TAGS: &'static [&'static str] =
        &["PRIVATE KEY", "RSA PRIVATE KEY", "EC PRIVATE KEY"];

    fn into_der(self) -> PrivateKeyDer<'static> {
        match self.format {
            KeyFormat::Pkcs8 => PrivatePkcs8KeyDer::from(self.der).into(),
            KeyFormat::Pkcs1 => PrivatePkcs1KeyDer::from(self.der).into(),
            KeyFormat::Sec1 => PrivateSec1KeyDer::from(self.der).into(),
        }
    }

    /// Try to read a private key from a PEM file that may also contain certificate data. This
    /// method extracts plaintext private keys denoted by 'PRIVATE KEY' (PKCS #8),
    /// 'RSA PRIVATE KEY' (PKCS #1) or 'EC PRIVATE KEY' (SEC1) sections.
    ///
    /// This method ensures that only 1 private key is present in a possibly multi-section PEM file
    fn read_from_pem<B: AsRef<[u8]>>(bytes: B) -> Result<Self, PemError> {
        let sections = pem::parse_many(bytes)?;
        let section =
            Self::find_only_section_with_tags(&sections, Self::ALLOWED_PLAINTEXT_KEY_TAGS)?;
        let format = match section.tag() {
            "RSA PRIVATE KEY" => KeyFormat::Pkcs1,
            "EC PRIVATE KEY" => KeyFormat::Sec1,
            _ => KeyFormat::Pkcs8,
        };
        Ok(Self {
            format,
            der: section.contents().to_vec(),
        })
    }

    /// Try to decrypt a private key from a PEM file. This method expects the PEM to contain a
    /// section with 'ENCRYPTED PRIVATE KEY' with a PKCS #8 encrypted private key.
    ///
    /// This method ensures that only 1 private key is present in a possibly multi-section PEM file
    fn decrypt_from_pem<B: AsRef<[u8]>, S: AsRef<[u8]>>(
        bytes: B,
        password: S,
    ) -> Result<Self, PemError> {
        let sections = pem::parse_many(bytes)?;
        let section =
            Self::find_only_section_with_tags(&sections, Self::ALLOWED_ENCRYPTED_KEY_TAGS)?;
        let parsed = pkcs8::EncryptedPrivateKeyInfo::try_from(section.contents())?;
        let document = parsed.decrypt(password.as_ref())?;
        Ok(Self {
            format: KeyFormat::Pkcs8,
            der: document.as_bytes().to_vec(),
        })
    }

    fn find_only_section_with_tags<'a>(
        sections: &'a [pem::Pem],
        allowed_tags: &'static [&'static str],
    ) -> Result<&'a pem::Pem, PemError> {
        let mut iter = sections.iter();
        let first = match iter.find(|x| allowed_tags.contains(&x.tag())) {
            Some(x) => x,
            None => return Err(ErrorDetails::NoPrivateKey.into()),
        };

        // make sure there are not other sections that match the allowed tags
        if iter.any(|x| allowed_tags.contains(&x.tag())) {
            return Err(ErrorDetails::MoreThanOnePrivateKey.into());
        }

        Ok(first)
    }
}

impl From<pem::PemError> for PemError {
    fn from(err: pem::PemError) -> Self {
        PemError {
            details: ErrorDetails::InvalidPem(err),
        }
    }
}

impl From<pkcs8::Error> for PemError {
    fn from(err: pkcs8::Error) -> Self {
        PemError {
            details: ErrorDetails::DecryptionError(err),
        }
    }
}

impl From<ErrorDetails> for PemError {
    fn from(details: ErrorDetails) -> Self {
        PemError { details }
    }
}
