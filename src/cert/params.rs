use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Ia5StringRef, PrintableStringRef, Utf8StringRef};
use time::{Duration, OffsetDateTime};
use x509_cert::name::RdnSequence;

use super::extensions::ToAndFromX509Extension;
use crate::error::CertError;

/// The subset of X.500 name attributes SVID subjects use.
///
/// Unset attributes are left out of the encoded name, so the default value
/// encodes as an empty subject (X509-SVIDs normally have one).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

const CN: &str = "2.5.4.3";
const C: &str = "2.5.4.6";
const L: &str = "2.5.4.7";
const ST: &str = "2.5.4.8";
const O: &str = "2.5.4.10";
const OU: &str = "2.5.4.11";

impl DistinguishedName {
    /// Returns true when no attribute is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Encodes as an RDN sequence, most specific attribute first.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName, CertError> {
        use core::str::FromStr;

        // RFC 4514 lists the most specific attribute first.
        let rfc4514_name = [
            ("CN", &self.common_name),
            ("OU", &self.organization_unit),
            ("O", &self.organization),
            ("L", &self.locality),
            ("ST", &self.state),
            ("C", &self.country),
        ]
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(|value| format!("{key}={}", escape_rfc4514(value)))
        })
        .collect::<Vec<_>>()
        .join(",");

        if rfc4514_name.is_empty() {
            return Ok(RdnSequence::default());
        }
        RdnSequence::from_str(&rfc4514_name).map_err(|e| CertError::InvalidInput(e.to_string()))
    }

    /// Reads the supported attributes back out of an encoded name; anything
    /// else is ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = attribute_string(&attr.value) else {
                    continue;
                };
                let slot = match attr.oid.to_string().as_str() {
                    CN => &mut dn.common_name,
                    C => &mut dn.country,
                    L => &mut dn.locality,
                    ST => &mut dn.state,
                    O => &mut dn.organization,
                    OU => &mut dn.organization_unit,
                    _ => continue,
                };
                *slot = Some(value);
            }
        }

        dn
    }
}

fn attribute_string(value: &der::Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<Utf8StringRef<'_>>() {
        return Some(s.as_str().to_string());
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
        return Some(s.as_str().to_string());
    }
    value
        .decode_as::<Ia5StringRef<'_>>()
        .ok()
        .map(|s| s.as_str().to_string())
}

fn escape_rfc4514(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `notBefore`/`notAfter` window. Encoding truncates both ends to whole
/// seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// `[now, now + days]` on the wall clock.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// Length of the window; negative when the window is degenerate.
    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }
}

/// A raw extension: OID, criticality flag and DER value.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Encodes a typed extension.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, CertError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, CertError> {
        E::from_x509_extension_value(&self.value)
    }

    pub(crate) fn from_x509(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }

    pub(crate) fn to_x509(&self) -> Result<x509_cert::ext::Extension, CertError> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }
}
