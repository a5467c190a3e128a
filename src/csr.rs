//! PKCS#10 certificate signing requests.
//!
//! Workloads and downstream servers send a CSR carrying their public key and
//! a single URI SAN. [`CertificationRequest::parse_and_check`] is the only way
//! the authority reads a CSR: it refuses anything whose self-signature does
//! not verify.

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, SetOfVec};
use der::{Any, Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::ext::Extension;
use x509_cert::request::{CertReq, CertReqInfo, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::error::CertError;
use crate::key::{KeyPair, PublicKey};

/// PKCS#9 extensionRequest attribute.
const EXTENSION_REQUEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

/// Parameters for building a CSR.
///
/// # Fields
/// * `subject` - The requested subject name.
/// * `uris` - URI SANs, normally a single SPIFFE ID.
/// * `dns_names` - DNS SANs.
#[derive(Clone, Debug, Default, Builder)]
pub struct CertificationRequestInfo {
    #[builder(default)]
    pub subject: DistinguishedName,
    #[builder(default)]
    pub uris: Vec<String>,
    #[builder(default)]
    pub dns_names: Vec<String>,
}

impl CertificationRequestInfo {
    /// Builds and signs a DER-encoded CSR for `key`.
    pub fn to_csr_der(&self, key: &KeyPair) -> Result<Vec<u8>, CertError> {
        let mut attributes = Vec::new();
        let san = SubjectAltName {
            dns_names: self.dns_names.clone(),
            uris: self.uris.clone(),
        };
        if !san.is_empty() {
            let extensions = vec![ExtensionParam::from_extension(san, false)?.to_x509()?];
            let value = Any::from_der(&extensions.to_der()?)?;
            attributes.push(Attribute {
                oid: EXTENSION_REQUEST,
                values: SetOfVec::try_from(vec![value])?,
            });
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject: self.subject.as_x509_name()?,
            public_key: key.public_key().as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };

        let signature = key.sign_data(&info.to_der()?)?;
        let csr = CertReq {
            info,
            algorithm: SignatureAlgorithm::for_key(key).into(),
            signature: BitString::from_bytes(&signature)?,
        };
        Ok(csr.to_der()?)
    }
}

/// The parts of a verified CSR the template builder needs.
#[derive(Clone, Debug)]
pub struct CertificationRequest {
    pub subject: DistinguishedName,
    pub public_key: PublicKey,
    pub uris: Vec<String>,
    pub dns_names: Vec<String>,
}

impl CertificationRequest {
    /// Parses a DER CSR and verifies its self-signature.
    pub fn parse_and_check(der: &[u8]) -> Result<Self, CertError> {
        let csr = CertReq::from_der(der)?;
        let public_key = PublicKey::from_x509spki(&csr.info.public_key)?;

        let expected: x509_cert::spki::AlgorithmIdentifierOwned =
            SignatureAlgorithm::for_public_key(&public_key).into();
        if csr.algorithm.oid != expected.oid {
            return Err(CertError::SignatureError(format!(
                "CSR signature algorithm {} does not match its key",
                csr.algorithm.oid
            )));
        }
        let signature = csr
            .signature
            .as_bytes()
            .ok_or_else(|| CertError::SignatureError("signature has unused bits".to_string()))?;
        public_key
            .verify_data(&csr.info.to_der()?, signature)
            .map_err(|e| CertError::SignatureError(format!("CSR signature check failed: {e}")))?;

        let mut san = SubjectAltName::default();
        for attr in csr.info.attributes.iter() {
            if attr.oid != EXTENSION_REQUEST {
                continue;
            }
            for value in attr.values.iter() {
                let extensions: Vec<Extension> = value.decode_as()?;
                for ext in extensions.iter().filter(|ext| ext.extn_id == SubjectAltName::OID) {
                    let names = SubjectAltName::from_x509_extension_value(ext.extn_value.as_bytes())?;
                    san.uris.extend(names.uris);
                    san.dns_names.extend(names.dns_names);
                }
            }
        }

        Ok(Self {
            subject: DistinguishedName::from_x509_name(&csr.info.subject),
            public_key,
            uris: san.uris,
            dns_names: san.dns_names,
        })
    }
}
