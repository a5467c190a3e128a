//! use svidca::error::{CaError, CertError};

use thiserror::Error;

use crate::jwt::JwtError;
use crate::spiffe_id::SpiffeIdError;

/// Represents low-level errors from the certificate and key codecs.
///
/// This enum provides detailed error messages for encoding, decoding and
/// cryptographic failures.
#[derive(Debug, Error, Clone)]
pub enum CertError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Signing failed or a signature did not verify.
    #[error("Signature error: {0}")]
    SignatureError(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    CertificateError(String),
}

impl From<der::Error> for CertError {
    /// Converts a `der::Error` into a `CertError`.
    fn from(err: der::Error) -> Self {
        CertError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CertError {
    fn from(err: rsa::Error) -> Self {
        CertError::KeyGenerationError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CertError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CertError::EncodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for CertError {
    fn from(err: pkcs8::Error) -> Self {
        CertError::DecodingError(err.to_string())
    }
}

impl From<ecdsa::signature::Error> for CertError {
    fn from(err: ecdsa::signature::Error) -> Self {
        CertError::SignatureError(err.to_string())
    }
}

/// Errors raised while turning a CSR into a certificate template.
#[derive(Debug, Error, Clone)]
pub enum TemplateError {
    /// The CSR could not be parsed or its self-signature does not verify.
    #[error("malformed CSR: {0}")]
    MalformedCsr(#[source] CertError),

    /// The CSR carries no URI SAN.
    #[error("CSR must have exactly one URI SAN, found none")]
    MissingUri,

    /// The CSR carries more than one URI SAN.
    #[error("CSR must have exactly one URI SAN, found {0}")]
    TooManyUris(usize),

    /// The CSR URI SAN is not acceptable for the requested certificate.
    #[error(transparent)]
    InvalidId(#[from] SpiffeIdError),
}

/// Coarse classification of [`CaError`] used by transport layers to pick a
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unavailable,
    InvalidRequest,
    SigningFailure,
    Config,
}

/// Errors returned by the issuance authority.
#[derive(Debug, Error)]
pub enum CaError {
    /// No usable key bundle is installed.
    #[error("{0}")]
    Unavailable(String),

    /// The request itself is unacceptable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The signing primitive or the parse-back step failed.
    #[error("{context}: {source}")]
    SigningFailure {
        context: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Propagated verbatim from the template builder.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The authority was constructed with an unusable configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CaError {
    pub(crate) fn signing<E>(context: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CaError::SigningFailure {
            context,
            source: Box::new(source),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaError::Unavailable(_) => ErrorKind::Unavailable,
            CaError::InvalidRequest(_) | CaError::Template(_) => ErrorKind::InvalidRequest,
            CaError::SigningFailure { .. } => ErrorKind::SigningFailure,
            CaError::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

impl From<JwtError> for CaError {
    fn from(err: JwtError) -> Self {
        CaError::signing("unable to sign JWT SVID", err)
    }
}
