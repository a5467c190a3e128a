use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Certificate serial number handed out by [`SerialAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(pub u64);

impl Serial {
    /// Big-endian bytes without leading zeros (at least one byte).
    pub fn to_be_bytes_trimmed(self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let start = bytes
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(bytes.len() - 1);
        bytes[start..].to_vec()
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide monotonic serial counter.
///
/// The first serial handed out is 1. A `u64` does not wrap at any realistic
/// issuance rate.
#[derive(Debug, Default)]
pub struct SerialAllocator {
    last: AtomicU64,
}

impl SerialAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Serial {
        Serial(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
