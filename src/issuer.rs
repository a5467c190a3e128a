use der::Encode;
use x509_cert::certificate::CertificateInner;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::AuthorityKeyIdentifier;
use crate::cert::extensions::BasicConstraints;
use crate::cert::extensions::ExtendedKeyUsage;
use crate::cert::extensions::KeyUsage;
use crate::cert::extensions::SubjectAltName;
use crate::cert::extensions::SubjectKeyIdentifier;
use crate::cert::params::ExtensionParam;
use crate::error::CertError;
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;
use crate::template::CertificateTemplate;

/// The signing primitive used by the issuance authority.
///
/// `sign` produces DER bytes; `parse` turns them back into a structured
/// certificate so a signer that emits something inconsistent is caught
/// before the certificate leaves the authority.
pub trait CertificateSigner: Send + Sync {
    /// Signs `template` as a child of `parent`, certifying `public_key`.
    fn sign(
        &self,
        template: &CertificateTemplate,
        parent: &Certificate,
        public_key: &PublicKey,
        signer: &KeyPair,
    ) -> Result<Vec<u8>, CertError>;

    fn parse(&self, der: &[u8]) -> Result<Certificate, CertError> {
        Certificate::from_der(der)
    }
}

/// Signs RFC 5280 v3 certificates with the RustCrypto stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct X509CertificateSigner;

impl X509CertificateSigner {
    /// Creates a self-signed certificate, as used for root authorities.
    pub fn self_sign(
        &self,
        template: &CertificateTemplate,
        key: &KeyPair,
    ) -> Result<Certificate, CertError> {
        let issuer = template.subject.as_x509_name()?;
        let authority_key_id = template.public_key.key_identifier()?;
        let der = issue(template, issuer, authority_key_id, &template.public_key, key)?;
        self.parse(&der)
    }
}

impl CertificateSigner for X509CertificateSigner {
    fn sign(
        &self,
        template: &CertificateTemplate,
        parent: &Certificate,
        public_key: &PublicKey,
        signer: &KeyPair,
    ) -> Result<Vec<u8>, CertError> {
        if parent.public_key()? != signer.public_key() {
            return Err(CertError::InvalidInput(
                "signing key does not match the parent certificate".to_string(),
            ));
        }
        let authority_key_id = match parent.subject_key_identifier()? {
            Some(key_id) => key_id,
            None => signer.public_key().key_identifier()?,
        };
        issue(
            template,
            parent.inner.tbs_certificate.subject.clone(),
            authority_key_id,
            public_key,
            signer,
        )
    }
}

fn extensions_for(
    template: &CertificateTemplate,
    public_key: &PublicKey,
    authority_key_id: Vec<u8>,
) -> Result<Vec<ExtensionParam>, CertError> {
    let basic_constraints = BasicConstraints {
        is_ca: template.is_ca,
        max_path_length: None,
    };

    let mut extensions = vec![
        ExtensionParam::from_extension(basic_constraints, true)?,
        ExtensionParam::from_extension(SubjectKeyIdentifier(public_key.key_identifier()?), false)?,
        ExtensionParam::from_extension(
            AuthorityKeyIdentifier {
                key_identifier: authority_key_id,
            },
            false,
        )?,
    ];

    if !template.key_usage.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            KeyUsage(template.key_usage),
            true,
        )?);
    }

    if !template.ext_key_usage.is_empty() {
        let extended_key_usage = ExtendedKeyUsage {
            usage: template.ext_key_usage.clone(),
        };
        extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
    }

    let san = SubjectAltName {
        dns_names: template.dns_names.clone(),
        uris: template.uris.clone(),
    };
    if !san.is_empty() {
        // RFC 5280 4.2.1.6: critical when the subject is empty.
        let critical = template.subject.is_empty();
        extensions.push(ExtensionParam::from_extension(san, critical)?);
    }

    Ok(extensions)
}

fn issue(
    template: &CertificateTemplate,
    issuer: x509_cert::name::Name,
    authority_key_id: Vec<u8>,
    public_key: &PublicKey,
    signer: &KeyPair,
) -> Result<Vec<u8>, CertError> {
    let signature_algo = SignatureAlgorithm::for_key(signer);

    let tbs_cert = TbsCertificate {
        serial_number: template.serial,
        signature_algorithm: signature_algo,
        issuer,
        validity: template.validity,
        subject: template.subject.clone(),
        subject_public_key: public_key.clone(),
        extensions: extensions_for(template, public_key, authority_key_id)?,
    };

    let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
    let signature = signer.sign_data(&tbs_cert_inner.to_der()?)?;

    let cert_inner = CertificateInner {
        tbs_certificate: tbs_cert_inner,
        signature_algorithm: signature_algo.into(),
        signature: der::asn1::BitString::from_bytes(&signature)?,
    };

    cert_inner
        .to_der()
        .map_err(|e| CertError::EncodingError(e.to_string()))
}
