//! The issuance authority.
//!
//! [`Ca`] turns signing requests into X509-SVIDs, X509 CA SVIDs and
//! JWT-SVIDs. It never lets an issued credential outlive the key that signed
//! it, and it never lets a downstream server pick the subject of its own CA
//! certificate.

mod keys;
mod lifetime;
mod serial;

use std::sync::Arc;

use bon::Builder;
use time::Duration;
use tracing::{Span, debug};

pub use keys::{JwtKey, KeyMaterialStore, X509CA};
pub use lifetime::{DEFAULT_BACKDATE, LifetimeCapper};
pub use serial::{Serial, SerialAllocator};

use crate::cert::Certificate;
use crate::cert::params::{DistinguishedName, Validity};
use crate::clock::{Clock, SystemClock};
use crate::error::{CaError, CertError};
use crate::issuer::{CertificateSigner, X509CertificateSigner};
use crate::jwt::{JwsSigner, JwtSigner};
use crate::metrics::{self, Label, Metrics, NoopMetrics};
use crate::spiffe_id::{self, ValidationMode};
use crate::template::{CertificateTemplate, CsrTemplateBuilder, TemplateBuilder};

/// TTL given to X509 SVIDs when neither the request nor the config sets one.
pub const DEFAULT_X509_SVID_TTL: Duration = Duration::hours(1);

/// TTL given to JWT SVIDs when the request does not set one.
pub const DEFAULT_JWT_SVID_TTL: Duration = Duration::minutes(5);

pub type Result<T> = std::result::Result<T, CaError>;

/// Parameters relevant to X509 SVID creation.
#[derive(Debug, Clone, Default)]
pub struct X509Params {
    /// Desired lifetime. Zero or negative selects the configured default.
    /// Whatever the value, the certificate never outlives the signing CA.
    pub ttl: Duration,

    /// DNS SANs for the SVID; the first entry also becomes the subject common
    /// name. Ignored when signing CA SVIDs.
    pub dns_list: Vec<String>,
}

/// A JWT-SVID signing request.
#[derive(Debug, Clone, Default)]
pub struct JwtSvidRequest {
    pub spiffe_id: String,
    pub audience: Vec<String>,
    /// Desired lifetime in seconds; zero or negative selects the default.
    pub ttl: i64,
}

/// Per-request context.
///
/// Log records are emitted inside the carried span. Signing is never
/// interrupted once started, so there is no cancellation hook.
#[derive(Debug, Clone)]
pub struct Context {
    span: Span,
}

impl Context {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Context bound to the caller's current span.
    pub fn current() -> Self {
        Self::new(Span::current())
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::current()
    }
}

/// Configuration for [`Ca`]. Collaborators left unset get the crate's default
/// implementation.
#[derive(Builder)]
pub struct CaConfig {
    /// Host part of the trust domain, e.g. `example.org`.
    #[builder(into)]
    pub trust_domain: String,

    /// Subject stamped on every CA certificate this authority signs.
    #[builder(default)]
    pub ca_subject: DistinguishedName,

    pub x509_svid_ttl: Option<Duration>,
    pub jwt_svid_ttl: Option<Duration>,

    #[builder(default = DEFAULT_BACKDATE)]
    pub backdate: Duration,

    pub clock: Option<Arc<dyn Clock>>,
    pub metrics: Option<Arc<dyn Metrics>>,
    pub template_builder: Option<Arc<dyn TemplateBuilder>>,
    pub certificate_signer: Option<Arc<dyn CertificateSigner>>,
    pub jwt_signer: Option<Arc<dyn JwtSigner>>,
}

/// The operations exposed to the transport layer.
pub trait ServerCa: Send + Sync {
    fn sign_x509_svid(
        &self,
        ctx: &Context,
        csr_der: &[u8],
        params: X509Params,
    ) -> Result<Vec<Certificate>>;

    fn sign_x509_ca_svid(
        &self,
        ctx: &Context,
        csr_der: &[u8],
        params: X509Params,
    ) -> Result<Vec<Certificate>>;

    fn sign_jwt_svid(&self, ctx: &Context, request: &JwtSvidRequest) -> Result<String>;
}

pub struct Ca {
    trust_domain: String,
    ca_subject: DistinguishedName,
    x509_svid_ttl: Duration,
    jwt_svid_ttl: Duration,

    keys: KeyMaterialStore,
    serials: SerialAllocator,
    lifetime: LifetimeCapper,

    metrics: Arc<dyn Metrics>,
    template_builder: Arc<dyn TemplateBuilder>,
    certificate_signer: Arc<dyn CertificateSigner>,
    jwt_signer: Arc<dyn JwtSigner>,
}

fn positive_or(ttl: Option<Duration>, default: Duration) -> Duration {
    ttl.filter(|ttl| ttl.is_positive()).unwrap_or(default)
}

impl Ca {
    pub fn new(config: CaConfig) -> Result<Self> {
        spiffe_id::validate_trust_domain(&config.trust_domain)
            .map_err(|e| CaError::InvalidConfig(e.to_string()))?;
        if config.backdate.is_negative() {
            return Err(CaError::InvalidConfig(
                "backdate must not be negative".to_string(),
            ));
        }

        let clock = config.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let jwt_signer = config
            .jwt_signer
            .unwrap_or_else(|| Arc::new(JwsSigner::new(clock.clone())));

        Ok(Self {
            trust_domain: config.trust_domain,
            ca_subject: config.ca_subject,
            x509_svid_ttl: positive_or(config.x509_svid_ttl, DEFAULT_X509_SVID_TTL),
            jwt_svid_ttl: positive_or(config.jwt_svid_ttl, DEFAULT_JWT_SVID_TTL),
            keys: KeyMaterialStore::new(),
            serials: SerialAllocator::new(),
            lifetime: LifetimeCapper::new(clock, config.backdate),
            metrics: config.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
            template_builder: config
                .template_builder
                .unwrap_or_else(|| Arc::new(CsrTemplateBuilder)),
            certificate_signer: config
                .certificate_signer
                .unwrap_or_else(|| Arc::new(X509CertificateSigner)),
            jwt_signer,
        })
    }

    pub fn trust_domain(&self) -> &str {
        &self.trust_domain
    }

    pub fn x509_ca(&self) -> Option<Arc<X509CA>> {
        self.keys.x509_ca()
    }

    pub fn set_x509_ca(&self, x509_ca: X509CA) {
        self.keys.set_x509_ca(x509_ca);
    }

    pub fn jwt_key(&self) -> Option<Arc<JwtKey>> {
        self.keys.jwt_key()
    }

    pub fn set_jwt_key(&self, jwt_key: JwtKey) {
        self.keys.set_jwt_key(jwt_key);
    }

    fn require_x509_ca(&self) -> Result<Arc<X509CA>> {
        self.keys.x509_ca().ok_or_else(|| {
            CaError::Unavailable("X509 CA is not available for signing".to_string())
        })
    }

    /// Caps `ttl` by `expiration_cap`, refusing when the signing key has
    /// already expired.
    fn validity(&self, ttl: Duration, expiration_cap: time::OffsetDateTime) -> Result<Validity> {
        let validity = self.lifetime.cap(ttl, expiration_cap);
        if validity.not_after <= self.lifetime.now() {
            return Err(CaError::Unavailable(format!(
                "signing key expired at {}",
                keys::rfc3339(expiration_cap)
            )));
        }
        Ok(validity)
    }

    fn create_certificate(
        &self,
        template: &CertificateTemplate,
        x509_ca: &X509CA,
        context: &'static str,
    ) -> Result<(Certificate, String)> {
        let der = self
            .certificate_signer
            .sign(
                template,
                &x509_ca.certificate,
                &template.public_key,
                &x509_ca.signer,
            )
            .map_err(|e| CaError::signing(context, e))?;
        let cert = self
            .certificate_signer
            .parse(&der)
            .map_err(|e| CaError::signing(context, e))?;

        let spiffe_id = cert
            .uris()
            .map_err(|e| CaError::signing(context, e))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CaError::signing(
                    context,
                    CertError::CertificateError(
                        "issued certificate has no URI SAN".to_string(),
                    ),
                )
            })?;
        Ok((cert, spiffe_id))
    }

    fn x509_ttl(&self, params: &X509Params) -> Duration {
        positive_or(Some(params.ttl), self.x509_svid_ttl)
    }
}

fn make_svid_cert_chain(x509_ca: &X509CA, cert: Certificate) -> Vec<Certificate> {
    std::iter::once(cert)
        .chain(x509_ca.upstream_chain.iter().cloned())
        .collect()
}

impl ServerCa for Ca {
    fn sign_x509_svid(
        &self,
        ctx: &Context,
        csr_der: &[u8],
        params: X509Params,
    ) -> Result<Vec<Certificate>> {
        let _entered = ctx.span().enter();
        let x509_ca = self.require_x509_ca()?;

        let validity = self.validity(self.x509_ttl(&params), x509_ca.certificate.not_after())?;
        let serial = self.serials.next();

        let mut template = self.template_builder.build_leaf_template(
            csr_der,
            &self.trust_domain,
            validity,
            serial,
        )?;

        // The first DNS name doubles as the common name, overriding the CSR.
        if let Some(first) = params.dns_list.first() {
            template.subject.common_name = Some(first.clone());
            template.dns_names = params.dns_list.clone();
        }

        let (cert, spiffe_id) =
            self.create_certificate(&template, &x509_ca, "unable to create X509 SVID")?;

        debug!(
            spiffe_id = %spiffe_id,
            serial = %serial,
            expires_at = %keys::rfc3339(cert.not_after()),
            "Signed X509 SVID"
        );
        self.metrics.incr_counter_with_labels(
            &[metrics::CA, metrics::SIGN, metrics::X509_SVID],
            1.0,
            &[Label::new(metrics::SPIFFE_ID, spiffe_id)],
        );

        Ok(make_svid_cert_chain(&x509_ca, cert))
    }

    fn sign_x509_ca_svid(
        &self,
        ctx: &Context,
        csr_der: &[u8],
        params: X509Params,
    ) -> Result<Vec<Certificate>> {
        let _entered = ctx.span().enter();
        let x509_ca = self.require_x509_ca()?;

        let validity = self.validity(self.x509_ttl(&params), x509_ca.certificate.not_after())?;
        let serial = self.serials.next();

        let mut template =
            self.template_builder
                .build_ca_template(csr_der, &self.trust_domain, validity, serial)?;

        // Downstream servers never control the subject of their CA certificate.
        template.subject = self.ca_subject.clone();

        let (cert, spiffe_id) =
            self.create_certificate(&template, &x509_ca, "unable to create X509 CA SVID")?;

        debug!(
            spiffe_id = %spiffe_id,
            serial = %serial,
            expires_at = %keys::rfc3339(cert.not_after()),
            "Signed X509 CA SVID"
        );
        self.metrics.incr_counter_with_labels(
            &[metrics::CA, metrics::SIGN, metrics::X509_CA_SVID],
            1.0,
            &[Label::new(metrics::SPIFFE_ID, spiffe_id)],
        );

        Ok(make_svid_cert_chain(&x509_ca, cert))
    }

    fn sign_jwt_svid(&self, ctx: &Context, request: &JwtSvidRequest) -> Result<String> {
        let _entered = ctx.span().enter();
        let jwt_key = self
            .keys
            .jwt_key()
            .ok_or_else(|| CaError::Unavailable("JWT key is not available for signing".to_string()))?;

        spiffe_id::validate(
            &request.spiffe_id,
            ValidationMode::TrustDomainWorkload(&self.trust_domain),
        )
        .map_err(|e| CaError::InvalidRequest(e.to_string()))?;

        let ttl = positive_or(
            Some(Duration::seconds(request.ttl)),
            self.jwt_svid_ttl,
        );
        let expires_at = self.validity(ttl, jwt_key.not_after)?.not_after;

        let token = self.jwt_signer.sign_token(
            &request.spiffe_id,
            &request.audience,
            expires_at,
            &jwt_key.signer,
            &jwt_key.kid,
        )?;

        debug!(
            spiffe_id = %request.spiffe_id,
            kid = %jwt_key.kid,
            expires_at = %keys::rfc3339(expires_at),
            "Signed JWT SVID"
        );
        for audience in &request.audience {
            self.metrics.incr_counter_with_labels(
                &[metrics::SERVER_CA, metrics::SIGN, metrics::JWT_SVID],
                1.0,
                &[
                    Label::new(metrics::SPIFFE_ID, request.spiffe_id.clone()),
                    Label::new(metrics::AUDIENCE, audience.clone()),
                ],
            );
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::error::ErrorKind;
    use crate::key::KeyPair;
    use time::macros::datetime;

    const NOW: time::OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

    fn ca() -> Ca {
        Ca::new(
            CaConfig::builder()
                .trust_domain("example.org")
                .clock(Arc::new(FakeClock::new(NOW)) as Arc<dyn Clock>)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_trust_domain() {
        let err = Ca::new(CaConfig::builder().trust_domain("Example.org").build())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn ttl_defaults_apply_to_non_positive_values() {
        let ca = Ca::new(
            CaConfig::builder()
                .trust_domain("example.org")
                .x509_svid_ttl(Duration::ZERO)
                .build(),
        )
        .unwrap();
        assert_eq!(ca.x509_svid_ttl, DEFAULT_X509_SVID_TTL);
        assert_eq!(ca.jwt_svid_ttl, DEFAULT_JWT_SVID_TTL);
        assert_eq!(
            ca.x509_ttl(&X509Params {
                ttl: Duration::minutes(-1),
                dns_list: vec![],
            }),
            DEFAULT_X509_SVID_TTL
        );
    }

    #[test]
    fn jwt_requires_installed_key() {
        let err = ca()
            .sign_jwt_svid(
                &Context::current(),
                &JwtSvidRequest {
                    spiffe_id: "spiffe://example.org/web".to_string(),
                    audience: vec!["db".to_string()],
                    ttl: 0,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn expired_key_is_refused() {
        let ca = ca();
        ca.set_jwt_key(JwtKey {
            signer: KeyPair::generate_ed25519(),
            kid: "expired".to_string(),
            not_after: NOW - Duration::seconds(1),
        });
        let err = ca
            .sign_jwt_svid(
                &Context::current(),
                &JwtSvidRequest {
                    spiffe_id: "spiffe://example.org/web".to_string(),
                    audience: vec!["db".to_string()],
                    ttl: 60,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
