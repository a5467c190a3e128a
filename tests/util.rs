#![allow(dead_code)]

use std::sync::Arc;

use svidca::ca::{Ca, CaConfig, Serial, X509CA};
use svidca::cert::Certificate;
use svidca::cert::extensions::KeyUsages;
use svidca::cert::params::{DistinguishedName, Validity};
use svidca::clock::{Clock, FakeClock};
use svidca::csr::CertificationRequestInfo;
use svidca::issuer::{CertificateSigner, X509CertificateSigner};
use svidca::key::KeyPair;
use svidca::metrics::{InMemoryMetrics, Metrics};
use svidca::template::CertificateTemplate;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

pub const TRUST_DOMAIN: &str = "example.org";

/// Whole seconds, so certificate times compare exactly after encoding.
pub const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

pub struct Harness {
    pub ca: Ca,
    pub clock: Arc<FakeClock>,
    pub metrics: Arc<InMemoryMetrics>,
}

pub fn ca_subject() -> DistinguishedName {
    DistinguishedName::builder()
        .country("US".to_string())
        .organization("SPIFFE".to_string())
        .build()
}

pub fn harness() -> Harness {
    harness_with_signer(None)
}

pub fn harness_with_signer(signer: Option<Arc<dyn CertificateSigner>>) -> Harness {
    let clock = Arc::new(FakeClock::new(NOW));
    let metrics = Arc::new(InMemoryMetrics::new());
    let ca = Ca::new(
        CaConfig::builder()
            .trust_domain(TRUST_DOMAIN)
            .ca_subject(ca_subject())
            .clock(clock.clone() as Arc<dyn Clock>)
            .metrics(metrics.clone() as Arc<dyn Metrics>)
            .maybe_certificate_signer(signer)
            .build(),
    )
    .expect("valid config");
    Harness { ca, clock, metrics }
}

/// A self-signed root for the trust domain, valid from an hour before `NOW`.
pub fn root_ca(key: &KeyPair, common_name: &str, not_after: OffsetDateTime) -> Certificate {
    let template = CertificateTemplate {
        serial: Serial(1),
        subject: DistinguishedName::builder()
            .common_name(common_name.to_string())
            .build(),
        public_key: key.public_key(),
        validity: Validity {
            not_before: NOW - Duration::hours(1),
            not_after,
        },
        uris: vec![format!("spiffe://{TRUST_DOMAIN}")],
        dns_names: Vec::new(),
        is_ca: true,
        key_usage: KeyUsages::KeyCertSign | KeyUsages::CRLSign | KeyUsages::DigitalSignature,
        ext_key_usage: Vec::new(),
    };
    X509CertificateSigner
        .self_sign(&template, key)
        .expect("self-signed root")
}

/// A self-rooted signing authority; its own certificate is the upstream chain.
pub fn x509_ca(common_name: &str, not_after: OffsetDateTime) -> X509CA {
    let signer = KeyPair::generate_ecdsa_p256();
    let certificate = root_ca(&signer, common_name, not_after);
    X509CA {
        signer,
        upstream_chain: vec![certificate.clone()],
        certificate,
    }
}

pub fn csr_with(info: CertificationRequestInfo) -> (KeyPair, Vec<u8>) {
    let key = KeyPair::generate_ecdsa_p256();
    let der = info.to_csr_der(&key).expect("csr");
    (key, der)
}

pub fn csr_for(id: &str) -> (KeyPair, Vec<u8>) {
    csr_with(
        CertificationRequestInfo::builder()
            .uris(vec![id.to_string()])
            .build(),
    )
}
