//! PEM helpers for certificate chains and keys.

use crate::cert::Certificate;
use crate::error::CertError;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Convert DER-encoded data into a PEM-encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Encodes a chain, leaf first, as concatenated `CERTIFICATE` blocks.
pub fn chain_to_pem(chain: &[Certificate]) -> Result<String, CertError> {
    let blocks = chain
        .iter()
        .map(|cert| cert.to_der().map(|der| pem::Pem::new(CERTIFICATE_LABEL, der)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pem::encode_many_config(
        &blocks,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    ))
}

/// Parses every `CERTIFICATE` block in `pem_str`, preserving order.
///
/// Blocks with any other label are rejected.
pub fn pem_to_chain(pem_str: &str) -> Result<Vec<Certificate>, CertError> {
    let blocks = pem::parse_many(pem_str).map_err(|e| CertError::DecodingError(e.to_string()))?;
    blocks
        .iter()
        .map(|block| {
            if block.tag() != CERTIFICATE_LABEL {
                return Err(CertError::InvalidInput(format!(
                    "unexpected PEM block {:?}",
                    block.tag()
                )));
            }
            Certificate::from_der(block.contents())
        })
        .collect()
}
