use limits::EngineLimits;
use oblivious::DivisionRounding;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub rounding: DivisionRounding,
    /// Refuse every mutating call after the first adapter fault.
    pub seal_on_adapter_fault: bool,
    pub limits: EngineLimits,
}

impl EngineConfig {
    pub fn dev() -> Self {
        Self {
            rounding: DivisionRounding::Truncate,
            seal_on_adapter_fault: false,
            limits: EngineLimits::default(),
        }
    }

    pub fn production() -> Self {
        Self {
            rounding: DivisionRounding::Truncate,
            seal_on_adapter_fault: true,
            limits: EngineLimits::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::dev()
    }
}
