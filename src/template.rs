//! Certificate templates and the CSR-driven template builder.

use crate::ca::Serial;
use crate::cert::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages};
use crate::cert::params::{DistinguishedName, Validity};
use crate::csr::CertificationRequest;
use crate::error::TemplateError;
use crate::key::PublicKey;
use crate::spiffe_id::{self, ValidationMode};

/// Everything needed to sign a certificate except the issuer.
#[derive(Clone, Debug)]
pub struct CertificateTemplate {
    pub serial: Serial,
    pub subject: DistinguishedName,
    pub public_key: PublicKey,
    pub validity: Validity,
    pub uris: Vec<String>,
    pub dns_names: Vec<String>,
    pub is_ca: bool,
    pub key_usage: FlagSet<KeyUsages>,
    pub ext_key_usage: Vec<ExtendedKeyUsageOption>,
}

/// Turns a raw CSR into a leaf or CA certificate template.
pub trait TemplateBuilder: Send + Sync {
    fn build_leaf_template(
        &self,
        csr_der: &[u8],
        trust_domain: &str,
        validity: Validity,
        serial: Serial,
    ) -> Result<CertificateTemplate, TemplateError>;

    fn build_ca_template(
        &self,
        csr_der: &[u8],
        trust_domain: &str,
        validity: Validity,
        serial: Serial,
    ) -> Result<CertificateTemplate, TemplateError>;
}

/// Builds templates from a checked CSR whose single URI SAN names the
/// requested identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsrTemplateBuilder;

impl CsrTemplateBuilder {
    fn checked_request(
        csr_der: &[u8],
        mode: ValidationMode<'_>,
    ) -> Result<(CertificationRequest, String), TemplateError> {
        let csr =
            CertificationRequest::parse_and_check(csr_der).map_err(TemplateError::MalformedCsr)?;
        let uri = match csr.uris.as_slice() {
            [] => return Err(TemplateError::MissingUri),
            [uri] => uri.clone(),
            uris => return Err(TemplateError::TooManyUris(uris.len())),
        };
        let id = spiffe_id::validate(&uri, mode)?;
        Ok((csr, id.to_string()))
    }
}

impl TemplateBuilder for CsrTemplateBuilder {
    fn build_leaf_template(
        &self,
        csr_der: &[u8],
        trust_domain: &str,
        validity: Validity,
        serial: Serial,
    ) -> Result<CertificateTemplate, TemplateError> {
        let (csr, id) =
            Self::checked_request(csr_der, ValidationMode::TrustDomainWorkload(trust_domain))?;

        Ok(CertificateTemplate {
            serial,
            subject: csr.subject,
            public_key: csr.public_key,
            validity,
            uris: vec![id],
            dns_names: Vec::new(),
            is_ca: false,
            key_usage: KeyUsages::DigitalSignature
                | KeyUsages::KeyEncipherment
                | KeyUsages::KeyAgreement,
            ext_key_usage: vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
            ],
        })
    }

    fn build_ca_template(
        &self,
        csr_der: &[u8],
        trust_domain: &str,
        validity: Validity,
        serial: Serial,
    ) -> Result<CertificateTemplate, TemplateError> {
        let (csr, id) =
            Self::checked_request(csr_der, ValidationMode::TrustDomainId(trust_domain))?;

        Ok(CertificateTemplate {
            serial,
            subject: csr.subject,
            public_key: csr.public_key,
            validity,
            uris: vec![id],
            dns_names: Vec::new(),
            is_ca: true,
            key_usage: KeyUsages::KeyCertSign | KeyUsages::CRLSign | KeyUsages::DigitalSignature,
            ext_key_usage: Vec::new(),
        })
    }
}
