use crate::identity::{AltName, CertificateIdentity};

/// A hostname did not match any of the names presented in the peer certificate
///
/// Carries the target hostname and every candidate name that was compared against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateError {
    hostname: String,
    candidates: Vec<String>,
}

impl CertificateError {
    /// The hostname that failed verification
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Names from the certificate that were tried, in the order they were tried
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

impl std::fmt::Display for CertificateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.candidates.as_slice() {
            [] => f.write_str("no appropriate commonName or subjectAltName fields were found"),
            [single] => write!(f, "hostname '{}' doesn't match '{single}'", self.hostname),
            many => {
                write!(f, "hostname '{}' doesn't match either of ", self.hostname)?;
                for (i, name) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{name}'")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CertificateError {}

/// Reasons why [`match_hostname`] can fail
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The identity contained no claims at all, which indicates malformed input
    #[error("empty or no certificate")]
    EmptyCertificate,
    /// The hostname did not match any candidate name
    #[error(transparent)]
    Mismatch(#[from] CertificateError),
}

/// Verify that `hostname` is one of the names claimed by `identity`
///
/// DNS entries in the subjectAltName extension are tried in order. The commonName
/// attributes of the subject are only consulted when the certificate carries no
/// subjectAltName entries of any kind. Names may contain `*` wildcards, see
/// [`HostnamePattern`].
pub fn match_hostname(identity: &CertificateIdentity, hostname: &str) -> Result<(), NameError> {
    if identity.is_empty() {
        return Err(NameError::EmptyCertificate);
    }

    let mut candidates = Vec::new();

    for alt_name in identity.subject_alt_names() {
        if let AltName::Dns(name) = alt_name {
            if HostnamePattern::new(name).matches(hostname) {
                return Ok(());
            }
            candidates.push(name.clone());
        }
    }

    // the subject is only checked when subjectAltName is empty
    if identity.subject_alt_names().is_empty() {
        for name in identity.common_names() {
            if HostnamePattern::new(name).matches(hostname) {
                return Ok(());
            }
            candidates.push(name.to_owned());
        }
    }

    Err(CertificateError {
        hostname: hostname.to_owned(),
        candidates,
    }
    .into())
}

/// A DNS name from a certificate, possibly containing `*` wildcards
///
/// Matching is done fragment by fragment on `.` boundaries and is case-insensitive.
/// The hostname must have exactly as many fragments as the pattern.
///
/// * a fragment that is exactly `*` matches any non-empty fragment
/// * a `*` inside a longer fragment matches zero or more characters of that fragment
/// * everything else is compared literally
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostnamePattern {
    fragments: Vec<String>,
}

impl HostnamePattern {
    /// Compile a pattern from a name found in a certificate
    pub fn new(name: &str) -> Self {
        Self {
            fragments: name.to_lowercase().split('.').map(str::to_owned).collect(),
        }
    }

    /// Test if `hostname` matches the pattern in its entirety
    pub fn matches(&self, hostname: &str) -> bool {
        let hostname = hostname.to_lowercase();
        let mut labels = hostname.split('.');

        for fragment in &self.fragments {
            let label = match labels.next() {
                Some(x) => x,
                None => return false,
            };
            if !fragment_matches(fragment, label) {
                return false;
            }
        }

        // no trailing labels allowed
        labels.next().is_none()
    }
}

fn fragment_matches(fragment: &str, label: &str) -> bool {
    if fragment == "*" {
        return !label.is_empty();
    }

    if !fragment.contains('*') {
        return fragment == label;
    }

    glob_matches(fragment, label)
}

/// Wildcard match where `*` matches any run of characters, including an empty one
fn glob_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut p = 0;
    let mut t = 0;
    // position of the last star in the pattern and the text position it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            // let the last star absorb one more character
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, t));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
