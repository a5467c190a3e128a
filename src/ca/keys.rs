use std::sync::Arc;

use arc_swap::ArcSwapOption;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::cert::Certificate;
use crate::key::KeyPair;

/// The active X.509 signing authority.
#[derive(Debug, Clone)]
pub struct X509CA {
    /// Signs child certificates.
    pub signer: KeyPair,

    /// The CA certificate.
    pub certificate: Certificate,

    /// Certificates chaining the CA back to the upstream trust bundle, appended
    /// after every issued leaf. Empty when the CA is its own trust anchor.
    pub upstream_chain: Vec<Certificate>,
}

/// The active JWT signing key.
#[derive(Debug, Clone)]
pub struct JwtKey {
    pub signer: KeyPair,

    /// Published as the `kid` header.
    pub kid: String,

    pub not_after: OffsetDateTime,
}

/// Holds the currently installed key bundles.
///
/// Each bundle sits behind its own [`ArcSwapOption`]: readers take a wait-free
/// snapshot and keep using it for the whole call even if a rotation swaps in
/// a new bundle meanwhile. Bundles are never mutated once installed.
#[derive(Default)]
pub struct KeyMaterialStore {
    x509_ca: ArcSwapOption<X509CA>,
    jwt_key: ArcSwapOption<JwtKey>,
}

impl KeyMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn x509_ca(&self) -> Option<Arc<X509CA>> {
        self.x509_ca.load_full()
    }

    pub fn set_x509_ca(&self, x509_ca: X509CA) {
        info!(
            expires_at = %rfc3339(x509_ca.certificate.not_after()),
            upstream_chain_len = x509_ca.upstream_chain.len(),
            "X509 CA installed"
        );
        self.x509_ca.store(Some(Arc::new(x509_ca)));
    }

    pub fn jwt_key(&self) -> Option<Arc<JwtKey>> {
        self.jwt_key.load_full()
    }

    pub fn set_jwt_key(&self, jwt_key: JwtKey) {
        info!(
            kid = %jwt_key.kid,
            expires_at = %rfc3339(jwt_key.not_after),
            "JWT key installed"
        );
        self.jwt_key.store(Some(Arc::new(jwt_key)));
    }
}

pub(crate) fn rfc3339(time: OffsetDateTime) -> String {
    time.format(&Rfc3339).unwrap_or_else(|_| time.to_string())
}
