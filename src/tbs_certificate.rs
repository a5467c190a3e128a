use der::Encode;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::ca::Serial;
use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::CertError;
use crate::key::PublicKey;

/// The signed part of a v3 certificate.
///
/// `issuer` is kept as the parent's encoded name rather than a
/// [`DistinguishedName`]: it must match the parent's subject byte for byte or
/// chain building fails.
pub struct TbsCertificate {
    pub serial_number: Serial,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner, CertError> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>, _>>()?;

        let validity = x509_cert::time::Validity {
            not_before: Time::try_from(std::time::SystemTime::from(self.validity.not_before))?,
            not_after: Time::try_from(std::time::SystemTime::from(self.validity.not_after))?,
        };

        let serial_number = SerialNumber::new(&self.serial_number.to_be_bytes_trimmed())?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.as_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }

    /// The exact bytes the issuer signs.
    pub fn to_der(&self) -> Result<Vec<u8>, CertError> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}
