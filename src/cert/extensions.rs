//! Typed views of the X.509 extensions an SVID carries.

use const_oid::AssociatedOid;
use const_oid::db::rfc5912::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use der::asn1::{Ia5String, OctetString};
use der::oid::ObjectIdentifier;
use der::{Decode, Encode};
use x509_cert::ext::pkix;
use x509_cert::ext::pkix::name::GeneralName;

use crate::error::CertError;

pub use der::flagset::FlagSet;
pub use x509_cert::ext::pkix::KeyUsages;

/// An extension value with a fixed OID and a DER codec.
///
/// # Example
/// ```
/// use svidca::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName {
///     dns_names: vec!["web.example.org".to_string()],
///     uris: vec!["spiffe://example.org/web".to_string()],
/// };
/// let der = san.to_x509_extension_value().unwrap();
/// assert_eq!(SubjectAltName::from_x509_extension_value(&der).unwrap(), san);
/// ```
pub trait ToAndFromX509Extension {
    const OID: ObjectIdentifier;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertError>;

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertError>
    where
        Self: Sized;
}

/// DNS and URI names from the Subject Alternative Name extension.
///
/// URIs hold SPIFFE IDs. Other general name forms are dropped on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub dns_names: Vec<String>,
    pub uris: Vec<String>,
}

impl SubjectAltName {
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.uris.is_empty()
    }
}

fn ia5(value: &str) -> Result<Ia5String, CertError> {
    Ia5String::new(value).map_err(|e| CertError::InvalidInput(format!("{value:?}: {e}")))
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertError> {
        let mut names = Vec::with_capacity(self.uris.len() + self.dns_names.len());
        for uri in &self.uris {
            names.push(GeneralName::UniformResourceIdentifier(ia5(uri)?));
        }
        for dns in &self.dns_names {
            names.push(GeneralName::DnsName(ia5(dns)?));
        }
        Ok(pkix::SubjectAltName(names).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertError> {
        let pkix::SubjectAltName(names) = pkix::SubjectAltName::from_der(extension)?;
        Ok(names
            .iter()
            .fold(SubjectAltName::default(), |mut san, name| {
                match name {
                    GeneralName::UniformResourceIdentifier(uri) => san.uris.push(uri.to_string()),
                    GeneralName::DnsName(dns) => san.dns_names.push(dns.to_string()),
                    _ => {}
                }
                san
            }))
    }
}

/// Basic Constraints. `max_path_length` is only meaningful when `is_ca`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertError> {
        Ok(pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length.filter(|_| self.is_ca),
        }
        .to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, CertError> {
        let pkix::BasicConstraints {
            ca,
            path_len_constraint,
        } = pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: ca,
            max_path_length: path_len_constraint,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <pkix::KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertError> {
        Ok(pkix::KeyUsage(self.0).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertError> {
        Ok(Self(pkix::KeyUsage::from_der(extension)?.0))
    }
}

/// A key purpose from the Extended Key Usage extension.
///
/// SVIDs are only ever issued for TLS; any other purpose found in an
/// upstream certificate is kept as its raw OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    Other(ObjectIdentifier),
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::Other(oid) => oid,
        }
    }
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(oid: ObjectIdentifier) -> Self {
        match oid {
            ID_KP_SERVER_AUTH => ExtendedKeyUsageOption::ServerAuth,
            ID_KP_CLIENT_AUTH => ExtendedKeyUsageOption::ClientAuth,
            other => ExtendedKeyUsageOption::Other(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertError> {
        let oids = self.usage.iter().copied().map(ObjectIdentifier::from).collect();
        Ok(pkix::ExtendedKeyUsage(oids).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertError> {
        let pkix::ExtendedKeyUsage(oids) = pkix::ExtendedKeyUsage::from_der(extension)?;
        Ok(Self {
            usage: oids.into_iter().map(ExtendedKeyUsageOption::from).collect(),
        })
    }
}

/// Subject Key Identifier, the SHA-1 of the subject public key bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertError> {
        Ok(pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertError> {
        let pkix::SubjectKeyIdentifier(id) = pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(id.into_bytes()))
    }
}

/// Authority Key Identifier in its key-identifier form, pointing at the
/// issuer's subject key identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertError> {
        Ok(pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        }
        .to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertError> {
        let aki = pkix::AuthorityKeyIdentifier::from_der(extension)?;
        let key_identifier = aki.key_identifier.ok_or_else(|| {
            CertError::CertificateError(
                "authority key identifier has no key identifier".to_string(),
            )
        })?;
        Ok(Self {
            key_identifier: key_identifier.into_bytes(),
        })
    }
}
