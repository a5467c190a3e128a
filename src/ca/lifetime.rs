use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::cert::params::Validity;
use crate::clock::Clock;

/// Skew allowance subtracted from `not_before`.
pub const DEFAULT_BACKDATE: Duration = Duration::seconds(10);

/// Bounds credential lifetimes by the lifetime of the signing key.
#[derive(Clone)]
pub struct LifetimeCapper {
    clock: Arc<dyn Clock>,
    backdate: Duration,
}

impl LifetimeCapper {
    pub fn new(clock: Arc<dyn Clock>, backdate: Duration) -> Self {
        Self { clock, backdate }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Returns `[now - backdate, min(now + ttl, expiration_cap)]`.
    ///
    /// The window is never rejected here, even when `expiration_cap` is
    /// already in the past.
    pub fn cap(&self, ttl: Duration, expiration_cap: OffsetDateTime) -> Validity {
        let now = self.clock.now();
        Validity {
            not_before: now - self.backdate,
            not_after: (now + ttl).min(expiration_cap),
        }
    }
}
