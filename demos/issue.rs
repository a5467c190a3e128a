use svidca::ca::{Ca, CaConfig, Context, JwtKey, JwtSvidRequest, Serial, ServerCa, X509CA, X509Params};
use svidca::cert::extensions::KeyUsages;
use svidca::cert::params::{DistinguishedName, Validity};
use svidca::csr::CertificationRequestInfo;
use svidca::issuer::X509CertificateSigner;
use svidca::key::KeyPair;
use svidca::pem_utils::chain_to_pem;
use svidca::template::CertificateTemplate;
use time::{Duration, OffsetDateTime};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let ca = Ca::new(
        CaConfig::builder()
            .trust_domain("example.org")
            .ca_subject(
                DistinguishedName::builder()
                    .country("US".to_string())
                    .organization("SPIFFE".to_string())
                    .build(),
            )
            .build(),
    )?;

    // A self-signed root stands in for the upstream authority.
    let root_key = KeyPair::generate_ecdsa_p256();
    let root = X509CertificateSigner.self_sign(
        &CertificateTemplate {
            serial: Serial(1),
            subject: DistinguishedName::builder()
                .common_name("Example Root CA".to_string())
                .build(),
            public_key: root_key.public_key(),
            validity: Validity::for_days(1),
            uris: vec!["spiffe://example.org".to_string()],
            dns_names: Vec::new(),
            is_ca: true,
            key_usage: KeyUsages::KeyCertSign | KeyUsages::CRLSign,
            ext_key_usage: Vec::new(),
        },
        &root_key,
    )?;
    ca.set_x509_ca(X509CA {
        signer: root_key,
        certificate: root.clone(),
        upstream_chain: vec![root],
    });

    let workload_key = KeyPair::generate_ed25519();
    let csr = CertificationRequestInfo::builder()
        .uris(vec!["spiffe://example.org/web".to_string()])
        .build()
        .to_csr_der(&workload_key)?;

    let chain = ca.sign_x509_svid(
        &Context::current(),
        &csr,
        X509Params {
            ttl: Duration::minutes(30),
            dns_list: vec!["web.example.org".to_string()],
        },
    )?;
    println!("X509-SVID chain:\n{}", chain_to_pem(&chain)?);

    ca.set_jwt_key(JwtKey {
        signer: KeyPair::generate_ecdsa_p256(),
        kid: "jwt-key-1".to_string(),
        not_after: OffsetDateTime::now_utc() + Duration::hours(1),
    });
    let token = ca.sign_jwt_svid(
        &Context::current(),
        &JwtSvidRequest {
            spiffe_id: "spiffe://example.org/web".to_string(),
            audience: vec!["db".to_string()],
            ttl: 120,
        },
    )?;
    println!("JWT-SVID:\n{token}");

    Ok(())
}
