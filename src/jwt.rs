//! JWT-SVID signing and verification (compact JWS serialization).

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::clock::Clock;
use crate::error::CertError;
use crate::key::{KeyPair, PublicKey};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("subject is required")]
    MissingSubject,

    #[error("audience is required")]
    MissingAudience,

    #[error("expiration {expires_at} must be after issued-at {issued_at}")]
    InvalidExpiration {
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    },

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token algorithm {found} does not match key algorithm {expected}")]
    AlgorithmMismatch { found: String, expected: &'static str },

    #[error("token has expired")]
    Expired,

    #[error(transparent)]
    Crypto(#[from] CertError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JwtError>;

/// `aud` is a bare string for a single audience and an array otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn from_list(audience: &[String]) -> Self {
        match audience {
            [single] => Audience::One(single.clone()),
            many => Audience::Many(many.to_vec()),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Audience::One(single) => vec![single.clone()],
            Audience::Many(many) => many.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    pub iat: i64,
}

/// JWS algorithm name for a key type.
pub fn algorithm_for(key: &PublicKey) -> &'static str {
    match key {
        PublicKey::Rsa(_) => "RS256",
        PublicKey::EcdsaP256(_) => "ES256",
        PublicKey::EcdsaP384(_) => "ES384",
        PublicKey::Ed25519(_) => "EdDSA",
    }
}

/// Produces a compact signed token.
pub trait JwtSigner: Send + Sync {
    fn sign_token(
        &self,
        subject: &str,
        audience: &[String],
        expires_at: OffsetDateTime,
        signer: &KeyPair,
        kid: &str,
    ) -> Result<String>;
}

/// Signs JWT-SVIDs with `iat` taken from the injected clock.
#[derive(Clone)]
pub struct JwsSigner {
    clock: Arc<dyn Clock>,
}

impl JwsSigner {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl JwtSigner for JwsSigner {
    fn sign_token(
        &self,
        subject: &str,
        audience: &[String],
        expires_at: OffsetDateTime,
        signer: &KeyPair,
        kid: &str,
    ) -> Result<String> {
        if subject.is_empty() {
            return Err(JwtError::MissingSubject);
        }
        if audience.is_empty() {
            return Err(JwtError::MissingAudience);
        }
        let issued_at = self.clock.now();
        if expires_at <= issued_at {
            return Err(JwtError::InvalidExpiration {
                issued_at,
                expires_at,
            });
        }

        let header = Header {
            alg: algorithm_for(&signer.public_key()).to_string(),
            kid: Some(kid.to_string()),
            typ: Some("JWT".to_string()),
        };
        let claims = Claims {
            sub: subject.to_string(),
            aud: Audience::from_list(audience),
            exp: expires_at.unix_timestamp(),
            iat: issued_at.unix_timestamp(),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = signer.sign_jws(signing_input.as_bytes())?;
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| JwtError::Malformed(e.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Checks the signature and expiry of `token` and returns its header and
/// claims.
pub fn verify_token(token: &str, key: &PublicKey, now: OffsetDateTime) -> Result<(Header, Claims)> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::Malformed(
            "expected three dot-separated parts".to_string(),
        ));
    };

    let header: Header = decode_part(header_b64)?;
    let expected = algorithm_for(key);
    if header.alg != expected {
        return Err(JwtError::AlgorithmMismatch {
            found: header.alg,
            expected,
        });
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| JwtError::Malformed(e.to_string()))?;
    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    key.verify_jws(signing_input.as_bytes(), &signature)?;

    let claims: Claims = decode_part(claims_b64)?;
    if claims.exp <= now.unix_timestamp() {
        return Err(JwtError::Expired);
    }
    Ok((header, claims))
}
