//! # svidca - A Pure Rust SVID Issuance Authority
//!
//! svidca signs short-lived identity credentials for workloads in a SPIFFE
//! trust domain. It is built entirely with RustCrypto libraries and has no
//! dependency on ring or openssl (except for testing).
//!
//! ## Credentials
//!
//! - **X509-SVID**: a leaf certificate whose single URI SAN is the workload's
//!   SPIFFE ID, returned together with the chain back to the upstream bundle.
//! - **X509 CA SVID**: an intermediate certificate for a downstream server,
//!   always stamped with the configured CA subject.
//! - **JWT-SVID**: a compact JWS whose subject is the workload's SPIFFE ID.
//!
//! Every credential is clipped so it never outlives the key that signed it,
//! and its validity window starts slightly in the past to tolerate clock skew.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048, 3072, and 4096-bit keys
//! - **ECDSA**: P-256 and P-384 curves
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use svidca::ca::{Ca, CaConfig, Context, JwtKey, JwtSvidRequest, ServerCa, X509CA, X509Params};
//! use svidca::cert::extensions::KeyUsages;
//! use svidca::cert::params::{DistinguishedName, Validity};
//! use svidca::csr::CertificationRequestInfo;
//! use svidca::issuer::X509CertificateSigner;
//! use svidca::key::KeyPair;
//! use svidca::template::CertificateTemplate;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ca = Ca::new(CaConfig::builder().trust_domain("example.org").build())?;
//!
//! // Install a self-signed root as the signing authority.
//! let ca_key = KeyPair::generate_ecdsa_p256();
//! let root = X509CertificateSigner.self_sign(
//!     &CertificateTemplate {
//!         serial: svidca::ca::Serial(1),
//!         subject: DistinguishedName::builder()
//!             .common_name("Example Root".to_string())
//!             .build(),
//!         public_key: ca_key.public_key(),
//!         validity: Validity::for_days(1),
//!         uris: vec!["spiffe://example.org".to_string()],
//!         dns_names: Vec::new(),
//!         is_ca: true,
//!         key_usage: KeyUsages::KeyCertSign | KeyUsages::CRLSign,
//!         ext_key_usage: Vec::new(),
//!     },
//!     &ca_key,
//! )?;
//! ca.set_x509_ca(X509CA {
//!     signer: ca_key,
//!     certificate: root,
//!     upstream_chain: Vec::new(),
//! });
//!
//! // A workload asks for an X509-SVID.
//! let workload_key = KeyPair::generate_ecdsa_p256();
//! let csr = CertificationRequestInfo::builder()
//!     .uris(vec!["spiffe://example.org/web".to_string()])
//!     .build()
//!     .to_csr_der(&workload_key)?;
//! let chain = ca.sign_x509_svid(&Context::current(), &csr, X509Params::default())?;
//! println!("{}", svidca::pem_utils::chain_to_pem(&chain)?);
//!
//! // And for a JWT-SVID.
//! ca.set_jwt_key(JwtKey {
//!     signer: KeyPair::generate_ecdsa_p256(),
//!     kid: "key-1".to_string(),
//!     not_after: time::OffsetDateTime::now_utc() + time::Duration::hours(1),
//! });
//! let token = ca.sign_jwt_svid(
//!     &Context::current(),
//!     &JwtSvidRequest {
//!         spiffe_id: "spiffe://example.org/web".to_string(),
//!         audience: vec!["db".to_string()],
//!         ttl: 0,
//!     },
//! )?;
//! println!("{token}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Authority operations return [`error::CaError`]; transports map it to a
//! status with [`error::CaError::kind`]:
//!
//! ```rust
//! use svidca::error::{CaError, ErrorKind};
//!
//! fn status(err: &CaError) -> u16 {
//!     match err.kind() {
//!         ErrorKind::Unavailable => 503,
//!         ErrorKind::InvalidRequest => 400,
//!         ErrorKind::SigningFailure | ErrorKind::Config => 500,
//!     }
//! }
//! # assert_eq!(status(&CaError::Unavailable("no CA".to_string())), 503);
//! ```
//!
//! ## Module Organization
//!
//! - [`ca`]: The issuance authority, key material store, lifetime capper and serial allocator
//! - [`key`]: Key generation, import, and cryptographic operations
//! - [`cert`]: Certificate encoding/decoding and extensions
//! - [`csr`]: PKCS#10 requests
//! - [`template`]: Turning CSRs into certificate templates
//! - [`issuer`]: The X.509 signing primitive
//! - [`jwt`]: JWT-SVID signing and verification
//! - [`spiffe_id`]: SPIFFE ID parsing and validation
//! - [`error`]: Error types and handling
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod ca;
pub mod cert;
pub mod clock;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod jwt;
pub mod key;
pub mod metrics;
pub mod pem_utils;
pub mod spiffe_id;
pub mod tbs_certificate;
pub mod template;
