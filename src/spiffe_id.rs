//! SPIFFE ID parsing and trust-domain scoping.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const SCHEME: &str = "spiffe://";

/// Paths under this prefix identify SPIRE agents and servers, never workloads.
const RESERVED_PREFIX: &str = "/spire/";

static TRUST_DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9._-]+$").expect("static regex"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpiffeIdError {
    #[error("SPIFFE ID is empty")]
    Empty,

    #[error("{0:?} is not a SPIFFE ID: scheme must be spiffe://")]
    InvalidScheme(String),

    #[error("invalid trust domain {0:?}: must be lowercase letters, digits, '.', '-' or '_'")]
    InvalidTrustDomain(String),

    #[error("invalid path in {id:?}: {reason}")]
    InvalidPath { id: String, reason: &'static str },

    #[error("{id:?} does not belong to trust domain {expected:?}")]
    TrustDomainMismatch { id: String, expected: String },

    #[error("{0:?} is not a trust domain ID")]
    NotTrustDomainId(String),

    #[error("{0:?} is not a workload ID")]
    NotWorkload(String),
}

/// A parsed `spiffe://<trust domain><path>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpiffeId {
    trust_domain: String,
    path: String,
}

impl SpiffeId {
    pub fn parse(id: &str) -> Result<Self, SpiffeIdError> {
        if id.is_empty() {
            return Err(SpiffeIdError::Empty);
        }
        let rest = id
            .strip_prefix(SCHEME)
            .ok_or_else(|| SpiffeIdError::InvalidScheme(id.to_string()))?;

        if rest.contains(['?', '#']) {
            return Err(SpiffeIdError::InvalidPath {
                id: id.to_string(),
                reason: "query and fragment are not allowed",
            });
        }

        let (trust_domain, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        validate_trust_domain(trust_domain)?;

        if !path.is_empty() {
            for segment in path[1..].split('/') {
                let reason = match segment {
                    "" => "empty path segment",
                    "." | ".." => "dot segments are not allowed",
                    _ => continue,
                };
                return Err(SpiffeIdError::InvalidPath {
                    id: id.to_string(),
                    reason,
                });
            }
        }

        Ok(Self {
            trust_domain: trust_domain.to_string(),
            path: path.to_string(),
        })
    }

    pub fn trust_domain(&self) -> &str {
        &self.trust_domain
    }

    /// The path component, empty for a trust domain ID.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_trust_domain_id(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_workload(&self) -> bool {
        !self.path.is_empty() && !self.path.starts_with(RESERVED_PREFIX)
    }
}

impl fmt::Display for SpiffeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}{}", self.trust_domain, self.path)
    }
}

/// Checks that `trust_domain` is a bare, lowercase host name.
pub fn validate_trust_domain(trust_domain: &str) -> Result<(), SpiffeIdError> {
    if TRUST_DOMAIN_RE.is_match(trust_domain) {
        Ok(())
    } else {
        Err(SpiffeIdError::InvalidTrustDomain(trust_domain.to_string()))
    }
}

/// How an identifier must relate to a trust domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode<'a> {
    /// Any syntactically valid SPIFFE ID.
    AnyTrustDomain,
    /// Exactly `spiffe://<trust domain>`.
    TrustDomainId(&'a str),
    /// A workload ID inside the trust domain.
    TrustDomainWorkload(&'a str),
}

/// Parses `id` and checks it against `mode`.
pub fn validate(id: &str, mode: ValidationMode<'_>) -> Result<SpiffeId, SpiffeIdError> {
    let parsed = SpiffeId::parse(id)?;
    let expect_domain = |trust_domain: &str| {
        if parsed.trust_domain == trust_domain {
            Ok(())
        } else {
            Err(SpiffeIdError::TrustDomainMismatch {
                id: id.to_string(),
                expected: trust_domain.to_string(),
            })
        }
    };

    match mode {
        ValidationMode::AnyTrustDomain => {}
        ValidationMode::TrustDomainId(trust_domain) => {
            expect_domain(trust_domain)?;
            if !parsed.is_trust_domain_id() {
                return Err(SpiffeIdError::NotTrustDomainId(id.to_string()));
            }
        }
        ValidationMode::TrustDomainWorkload(trust_domain) => {
            expect_domain(trust_domain)?;
            if !parsed.is_workload() {
                return Err(SpiffeIdError::NotWorkload(id.to_string()));
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_workload_ids() {
        let id = SpiffeId::parse("spiffe://example.org/ns/prod/web").unwrap();
        assert_eq!(id.trust_domain(), "example.org");
        assert_eq!(id.path(), "/ns/prod/web");
        assert!(id.is_workload());
        assert_eq!(id.to_string(), "spiffe://example.org/ns/prod/web");
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "http://example.org/web",
            "spiffe://Example.org/web",
            "spiffe://example.org:8080/web",
            "spiffe://user@example.org/web",
            "spiffe://example.org/web/",
            "spiffe://example.org//web",
            "spiffe://example.org/../web",
            "spiffe://example.org/web?x=1",
            "spiffe:///web",
        ] {
            assert!(SpiffeId::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn workload_mode_scopes_to_trust_domain() {
        let mode = ValidationMode::TrustDomainWorkload("example.org");
        assert!(validate("spiffe://example.org/web", mode).is_ok());
        assert!(matches!(
            validate("spiffe://evil.org/web", mode),
            Err(SpiffeIdError::TrustDomainMismatch { .. })
        ));
        assert!(matches!(
            validate("spiffe://example.org", mode),
            Err(SpiffeIdError::NotWorkload(_))
        ));
        assert!(matches!(
            validate("spiffe://example.org/spire/agent/x", mode),
            Err(SpiffeIdError::NotWorkload(_))
        ));
    }

    #[test]
    fn trust_domain_mode_requires_empty_path() {
        let mode = ValidationMode::TrustDomainId("example.org");
        assert!(validate("spiffe://example.org", mode).is_ok());
        assert!(matches!(
            validate("spiffe://example.org/web", mode),
            Err(SpiffeIdError::NotTrustDomainId(_))
        ));
    }
}
