use std::net::IpAddr;

use x509_parser::extensions::GeneralName;
use x509_parser::oid_registry::OID_X509_COMMON_NAME;

/// An entry of the subjectAltName extension
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AltName {
    /// dNSName entry
    Dns(String),
    /// iPAddress entry
    IpAddress(IpAddr),
    /// rfc822Name entry
    Email(String),
    /// uniformResourceIdentifier entry
    Uri(String),
    /// Any other kind of general name
    Other,
}

/// Type of an attribute in a subject relative distinguished name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeType {
    /// id-at-commonName (2.5.4.3)
    CommonName,
    /// Any other attribute, identified by its dotted OID
    Other(String),
}

/// A single (type, value) pair from a distinguished name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Type of the attribute
    pub attr_type: AttributeType,
    /// Value of the attribute decoded as a string
    pub value: String,
}

impl Attribute {
    /// Create an attribute
    pub fn new(attr_type: AttributeType, value: impl Into<String>) -> Self {
        Self {
            attr_type,
            value: value.into(),
        }
    }
}

/// A relative distinguished name, i.e. one set of attributes in a subject
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelativeName(Vec<Attribute>);

impl RelativeName {
    /// Create an RDN from its attributes
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self(attributes)
    }

    /// Attributes in the order they appear in the certificate
    pub fn attributes(&self) -> &[Attribute] {
        &self.0
    }
}

/// Identity claims of a peer certificate used for hostname verification
///
/// The default value is the empty identity, which is what a connection
/// without a peer certificate produces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateIdentity {
    subject_alt_names: Vec<AltName>,
    subject: Vec<RelativeName>,
}

impl CertificateIdentity {
    /// Create an identity from already decoded claims
    pub fn new(subject_alt_names: Vec<AltName>, subject: Vec<RelativeName>) -> Self {
        Self {
            subject_alt_names,
            subject,
        }
    }

    /// Decode the identity claims of a DER encoded X.509 certificate
    pub fn from_der(der: &[u8]) -> Result<Self, crate::Error> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)?;

        let mut subject_alt_names = Vec::new();
        if let Some(ext) = cert.subject_alternative_name()? {
            subject_alt_names.extend(ext.value.general_names.iter().map(AltName::from));
        }

        let subject = cert
            .subject()
            .iter_rdn()
            .map(|rdn| {
                let attributes = rdn
                    .iter()
                    // values that aren't strings can't be compared to a hostname
                    .filter_map(|attr| {
                        let value = attr.as_str().ok()?;
                        let attr_type = if attr.attr_type() == &OID_X509_COMMON_NAME {
                            AttributeType::CommonName
                        } else {
                            AttributeType::Other(attr.attr_type().to_id_string())
                        };
                        Some(Attribute::new(attr_type, value))
                    })
                    .collect();
                RelativeName::new(attributes)
            })
            .collect();

        Ok(Self {
            subject_alt_names,
            subject,
        })
    }

    /// Entries of the subjectAltName extension in certificate order
    pub fn subject_alt_names(&self) -> &[AltName] {
        &self.subject_alt_names
    }

    /// RDN sets of the subject in certificate order
    pub fn subject(&self) -> &[RelativeName] {
        &self.subject
    }

    /// Iterate over every commonName attribute value in the subject
    pub fn common_names(&self) -> impl Iterator<Item = &str> {
        self.subject
            .iter()
            .flat_map(|rdn| rdn.attributes())
            .filter(|attr| attr.attr_type == AttributeType::CommonName)
            .map(|attr| attr.value.as_str())
    }

    /// True if the identity holds no claims at all
    pub fn is_empty(&self) -> bool {
        self.subject_alt_names.is_empty() && self.subject.is_empty()
    }
}

impl From<&GeneralName<'_>> for AltName {
    fn from(name: &GeneralName<'_>) -> Self {
        match name {
            GeneralName::DNSName(x) => Self::Dns(x.to_string()),
            GeneralName::RFC822Name(x) => Self::Email(x.to_string()),
            GeneralName::URI(x) => Self::Uri(x.to_string()),
            GeneralName::IPAddress(bytes) => match bytes.len() {
                4 => {
                    let mut octets = [0u8; 4];
                    octets.copy_from_slice(bytes);
                    Self::IpAddress(IpAddr::from(octets))
                }
                16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(bytes);
                    Self::IpAddress(IpAddr::from(octets))
                }
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }
}
