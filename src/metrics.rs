//! Counter sink used by the issuance authority.
//!
//! Counters are keyed by a path of static segments (for example
//! `["ca", "sign", "x509_svid"]`) and carry free-form labels. The authority
//! only emits counters after a credential has been produced.

use std::sync::{Mutex, PoisonError};

pub const CA: &str = "ca";
pub const SERVER_CA: &str = "server_ca";
pub const SIGN: &str = "sign";
pub const X509_SVID: &str = "x509_svid";
pub const X509_CA_SVID: &str = "x509_ca_svid";
pub const JWT_SVID: &str = "jwt_svid";

pub const SPIFFE_ID: &str = "spiffe_id";
pub const AUDIENCE: &str = "audience";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: &'static str,
    pub value: String,
}

impl Label {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

pub trait Metrics: Send + Sync {
    fn incr_counter_with_labels(&self, key: &[&'static str], value: f32, labels: &[Label]);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn incr_counter_with_labels(&self, _key: &[&'static str], _value: f32, _labels: &[Label]) {}
}

/// One recorded counter increment.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSample {
    pub key: Vec<&'static str>,
    pub value: f32,
    pub labels: Vec<Label>,
}

/// Keeps every increment in memory, in emission order.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    samples: Mutex<Vec<CounterSample>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<CounterSample> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Samples recorded under exactly `key`.
    pub fn samples_for(&self, key: &[&str]) -> Vec<CounterSample> {
        self.samples()
            .into_iter()
            .filter(|sample| sample.key == key)
            .collect()
    }
}

impl Metrics for InMemoryMetrics {
    fn incr_counter_with_labels(&self, key: &[&'static str], value: f32, labels: &[Label]) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CounterSample {
                key: key.to_vec(),
                value,
                labels: labels.to_vec(),
            });
    }
}
