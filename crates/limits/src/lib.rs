#![forbid(unsafe_code)]

//! Default, shareable limits for the clustering engine's in-memory state.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Cluster count above which each ingestion's O(K) comparisons are
    /// considered operationally expensive. Crossing it only logs a warning.
    pub cluster_soft_cap: usize,
    /// Maximum notifications retained in the event log before the oldest are
    /// folded into the base digest.
    pub max_events_retained: usize,
    /// Maximum pending decryption requests returned by a listing call.
    pub max_pending_listed: usize,
}

/// Default limits used throughout the engine components.
pub const DEFAULT_LIMITS: EngineLimits = EngineLimits {
    cluster_soft_cap: 32,
    max_events_retained: 4096,
    max_pending_listed: 128,
};

impl Default for EngineLimits {
    fn default() -> Self {
        default_limits()
    }
}

/// Convenience helper returning the default engine limits.
pub const fn default_limits() -> EngineLimits {
    DEFAULT_LIMITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_const() {
        assert_eq!(EngineLimits::default(), DEFAULT_LIMITS);
        assert!(DEFAULT_LIMITS.max_events_retained > 0);
    }
}
