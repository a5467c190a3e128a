mod util;

use std::collections::HashSet;
use std::sync::Arc;

use svidca::ca::{Context, JwtKey, JwtSvidRequest, Serial, ServerCa, X509Params};
use svidca::cert::Certificate;
use svidca::cert::params::DistinguishedName;
use svidca::csr::CertificationRequestInfo;
use svidca::error::{CertError, ErrorKind};
use svidca::issuer::CertificateSigner;
use svidca::jwt::verify_token;
use svidca::key::{KeyPair, PublicKey};
use svidca::metrics::Label;
use svidca::template::CertificateTemplate;
use time::Duration;
use util::{NOW, csr_for, csr_with, harness, harness_with_signer, x509_ca};

const WORKLOAD: &str = "spiffe://example.org/web";

fn jwt_request(spiffe_id: &str, audience: &[&str], ttl: i64) -> JwtSvidRequest {
    JwtSvidRequest {
        spiffe_id: spiffe_id.to_string(),
        audience: audience.iter().map(|a| a.to_string()).collect(),
        ttl,
    }
}

#[test]
fn x509_svid_requires_installed_ca() {
    let h = harness();
    let (_, csr) = csr_for(WORKLOAD);

    let err = h
        .ca
        .sign_x509_svid(&Context::current(), &csr, X509Params::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(err.to_string(), "X509 CA is not available for signing");
    assert!(h.metrics.samples().is_empty());

    let ca = x509_ca("root", NOW + Duration::days(1));
    let root = ca.certificate.clone();
    h.ca.set_x509_ca(ca);

    let chain = h
        .ca
        .sign_x509_svid(&Context::current(), &csr, X509Params::default())
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1], root);
    chain[0].verify_signed_by(&root).unwrap();
    assert_eq!(chain[0].serial_number(), Some(Serial(1)));
}

#[test]
fn x509_svid_is_capped_by_ca_expiry() {
    let h = harness();
    h.ca.set_x509_ca(x509_ca("root", NOW + Duration::hours(1)));
    let (key, csr) = csr_for(WORKLOAD);

    let chain = h
        .ca
        .sign_x509_svid(
            &Context::current(),
            &csr,
            X509Params {
                ttl: Duration::hours(2),
                dns_list: Vec::new(),
            },
        )
        .unwrap();

    let leaf = &chain[0];
    assert_eq!(leaf.not_before(), NOW - Duration::seconds(10));
    assert_eq!(leaf.not_after(), NOW + Duration::hours(1));
    assert_eq!(leaf.uris().unwrap(), vec![WORKLOAD.to_string()]);
    assert_eq!(leaf.public_key().unwrap(), key.public_key());
    assert!(!leaf.is_ca().unwrap());
}

#[test]
fn x509_svid_uses_default_ttl() {
    let h = harness();
    h.ca.set_x509_ca(x509_ca("root", NOW + Duration::days(1)));
    let (_, csr) = csr_for(WORKLOAD);

    let chain = h
        .ca
        .sign_x509_svid(&Context::current(), &csr, X509Params::default())
        .unwrap();
    assert_eq!(chain[0].not_after(), NOW + Duration::hours(1));
}

#[test]
fn dns_list_sets_common_name_and_sans() {
    let h = harness();
    h.ca.set_x509_ca(x509_ca("root", NOW + Duration::days(1)));
    let (_, csr) = csr_with(
        CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("from-csr".to_string())
                    .build(),
            )
            .uris(vec![WORKLOAD.to_string()])
            .build(),
    );

    let dns_list = vec!["a.example.org".to_string(), "b.example.org".to_string()];
    let chain = h
        .ca
        .sign_x509_svid(
            &Context::current(),
            &csr,
            X509Params {
                ttl: Duration::ZERO,
                dns_list: dns_list.clone(),
            },
        )
        .unwrap();

    let leaf = &chain[0];
    assert_eq!(leaf.subject().common_name.as_deref(), Some("a.example.org"));
    assert_eq!(leaf.dns_names().unwrap(), dns_list);
    assert_eq!(leaf.uris().unwrap(), vec![WORKLOAD.to_string()]);
}

#[test]
fn x509_svid_metrics_and_foreign_ids() {
    let h = harness();
    h.ca.set_x509_ca(x509_ca("root", NOW + Duration::days(1)));

    let (_, foreign) = csr_for("spiffe://other.org/web");
    let err = h
        .ca
        .sign_x509_svid(&Context::current(), &foreign, X509Params::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let (_, two_ids) = csr_with(
        CertificationRequestInfo::builder()
            .uris(vec![WORKLOAD.to_string(), "spiffe://example.org/db".to_string()])
            .build(),
    );
    let err = h
        .ca
        .sign_x509_svid(&Context::current(), &two_ids, X509Params::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(h.metrics.samples().is_empty());

    let (_, csr) = csr_for(WORKLOAD);
    h.ca.sign_x509_svid(&Context::current(), &csr, X509Params::default())
        .unwrap();
    let samples = h.metrics.samples_for(&["ca", "sign", "x509_svid"]);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].value, 1.0);
    assert_eq!(samples[0].labels, vec![Label::new("spiffe_id", WORKLOAD)]);
}

#[test]
fn expired_ca_is_unavailable() {
    let h = harness();
    h.ca.set_x509_ca(x509_ca("root", NOW + Duration::minutes(30)));
    h.clock.advance(Duration::minutes(31));
    let (_, csr) = csr_for(WORKLOAD);

    let err = h
        .ca
        .sign_x509_svid(&Context::current(), &csr, X509Params::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

#[test]
fn ca_svid_subject_is_always_overridden() {
    let h = harness();
    let ca = x509_ca("root", NOW + Duration::days(1));
    let root = ca.certificate.clone();
    h.ca.set_x509_ca(ca);

    let (key, csr) = csr_with(
        CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .organization("Evil Corp".to_string())
                    .common_name("evil".to_string())
                    .build(),
            )
            .uris(vec!["spiffe://example.org".to_string()])
            .build(),
    );

    let chain = h
        .ca
        .sign_x509_ca_svid(
            &Context::current(),
            &csr,
            X509Params {
                ttl: Duration::hours(48),
                dns_list: vec!["ignored.example.org".to_string()],
            },
        )
        .unwrap();

    let cert = &chain[0];
    assert_eq!(cert.subject(), util::ca_subject());
    assert!(cert.is_ca().unwrap());
    assert!(cert.dns_names().unwrap().is_empty());
    assert_eq!(cert.public_key().unwrap(), key.public_key());
    assert_eq!(cert.not_after(), NOW + Duration::days(1));
    cert.verify_signed_by(&root).unwrap();

    let samples = h.metrics.samples_for(&["ca", "sign", "x509_ca_svid"]);
    assert_eq!(samples.len(), 1);
    assert_eq!(
        samples[0].labels,
        vec![Label::new("spiffe_id", "spiffe://example.org")]
    );
}

#[test]
fn ca_svid_requires_trust_domain_id() {
    let h = harness();
    h.ca.set_x509_ca(x509_ca("root", NOW + Duration::days(1)));
    let (_, csr) = csr_for(WORKLOAD);

    let err = h
        .ca
        .sign_x509_ca_svid(&Context::current(), &csr, X509Params::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn jwt_svid_is_capped_by_key_expiry() {
    let h = harness();
    let key = KeyPair::generate_ecdsa_p256();
    h.ca.set_jwt_key(JwtKey {
        signer: key.clone(),
        kid: "kid-1".to_string(),
        not_after: NOW + Duration::minutes(5),
    });

    let token = h
        .ca
        .sign_jwt_svid(&Context::current(), &jwt_request(WORKLOAD, &["db", "cache"], 600))
        .unwrap();

    let (header, claims) = verify_token(&token, &key.public_key(), NOW).unwrap();
    assert_eq!(header.kid.as_deref(), Some("kid-1"));
    assert_eq!(claims.sub, WORKLOAD);
    assert_eq!(claims.aud.to_vec(), vec!["db", "cache"]);
    assert_eq!(claims.exp, (NOW + Duration::minutes(5)).unix_timestamp());

    let samples = h.metrics.samples_for(&["server_ca", "sign", "jwt_svid"]);
    assert_eq!(samples.len(), 2);
    assert_eq!(
        samples[0].labels,
        vec![Label::new("spiffe_id", WORKLOAD), Label::new("audience", "db")]
    );
    assert_eq!(
        samples[1].labels,
        vec![Label::new("spiffe_id", WORKLOAD), Label::new("audience", "cache")]
    );
}

#[test]
fn jwt_svid_default_ttl() {
    let h = harness();
    let key = KeyPair::generate_ed25519();
    h.ca.set_jwt_key(JwtKey {
        signer: key.clone(),
        kid: "kid".to_string(),
        not_after: NOW + Duration::days(1),
    });

    let token = h
        .ca
        .sign_jwt_svid(&Context::current(), &jwt_request(WORKLOAD, &["db"], 0))
        .unwrap();
    let (_, claims) = verify_token(&token, &key.public_key(), NOW).unwrap();
    assert_eq!(claims.exp, (NOW + Duration::minutes(5)).unix_timestamp());
    assert_eq!(claims.iat, NOW.unix_timestamp());
}

#[test]
fn jwt_svid_rejects_bad_subjects() {
    let h = harness();
    h.ca.set_jwt_key(JwtKey {
        signer: KeyPair::generate_ecdsa_p256(),
        kid: "kid".to_string(),
        not_after: NOW + Duration::days(1),
    });

    for id in [
        "spiffe://other.org/web",
        "spiffe://example.org",
        "spiffe://example.org/spire/agent/x",
        "https://example.org/web",
    ] {
        let err = h
            .ca
            .sign_jwt_svid(&Context::current(), &jwt_request(id, &["db"], 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{id}");
    }
    assert!(h.metrics.samples().is_empty());
}

#[test]
fn jwt_svid_without_audience_is_a_signing_failure() {
    let h = harness();
    h.ca.set_jwt_key(JwtKey {
        signer: KeyPair::generate_ecdsa_p256(),
        kid: "kid".to_string(),
        not_after: NOW + Duration::days(1),
    });

    let err = h
        .ca
        .sign_jwt_svid(&Context::current(), &jwt_request(WORKLOAD, &[], 0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SigningFailure);
    assert!(err.to_string().starts_with("unable to sign JWT SVID"));
}

struct FailingSigner;

impl CertificateSigner for FailingSigner {
    fn sign(
        &self,
        _template: &CertificateTemplate,
        _parent: &Certificate,
        _public_key: &PublicKey,
        _signer: &KeyPair,
    ) -> Result<Vec<u8>, CertError> {
        Err(CertError::SignatureError("hsm offline".to_string()))
    }
}

struct GarbageSigner;

impl CertificateSigner for GarbageSigner {
    fn sign(
        &self,
        _template: &CertificateTemplate,
        _parent: &Certificate,
        _public_key: &PublicKey,
        _signer: &KeyPair,
    ) -> Result<Vec<u8>, CertError> {
        Ok(vec![0x30, 0x03, 0x02, 0x01])
    }
}

#[test]
fn signer_failures_surface_as_signing_failures() {
    for signer in [
        Arc::new(FailingSigner) as Arc<dyn CertificateSigner>,
        Arc::new(GarbageSigner) as Arc<dyn CertificateSigner>,
    ] {
        let h = harness_with_signer(Some(signer));
        h.ca.set_x509_ca(x509_ca("root", NOW + Duration::days(1)));

        let (_, csr) = csr_for(WORKLOAD);
        let err = h
            .ca
            .sign_x509_svid(&Context::current(), &csr, X509Params::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningFailure);
        assert!(err.to_string().starts_with("unable to create X509 SVID: "));

        let (_, csr) = csr_for("spiffe://example.org");
        let err = h
            .ca
            .sign_x509_ca_svid(&Context::current(), &csr, X509Params::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("unable to create X509 CA SVID: "));

        assert!(h.metrics.samples().is_empty());
    }
}

#[test]
fn concurrent_issuance_never_reuses_serials() {
    let h = harness();
    h.ca.set_x509_ca(x509_ca("root", NOW + Duration::days(1)));
    let (_, csr) = csr_for(WORKLOAD);
    let ca = &h.ca;
    let csr = &csr;

    let serials: Vec<Serial> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(move || {
                    (0..10)
                        .map(|_| {
                            let chain = ca
                                .sign_x509_svid(&Context::current(), csr, X509Params::default())
                                .unwrap();
                            chain[0].serial_number().unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    let unique: HashSet<Serial> = serials.iter().copied().collect();
    assert_eq!(unique.len(), 80);
}

#[test]
fn rotation_never_mixes_bundles() {
    let h = harness();
    let first = x509_ca("first", NOW + Duration::days(1));
    let second = x509_ca("second", NOW + Duration::days(2));
    let roots = [first.certificate.clone(), second.certificate.clone()];
    h.ca.set_x509_ca(first.clone());

    let (_, csr) = csr_for(WORKLOAD);
    let ca = &h.ca;
    let csr = &csr;

    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(move || {
                    for _ in 0..25 {
                        let chain = ca
                            .sign_x509_svid(&Context::current(), csr, X509Params::default())
                            .unwrap();
                        assert_eq!(chain.len(), 2);
                        chain[0].verify_signed_by(&chain[1]).unwrap();
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let next = if i % 2 == 0 { &second } else { &first };
            ca.set_x509_ca(next.clone());
        }

        for worker in workers {
            worker.join().unwrap();
        }
    });

    let installed = h.ca.x509_ca().unwrap();
    assert!(roots.contains(&installed.certificate));
}
