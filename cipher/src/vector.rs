#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of feature dimensions in a behavior vector.
pub const DIMENSIONS: usize = 3;

/// Encrypted financial-behavior feature vector.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedVector<C> {
    pub amount: C,
    pub frequency: C,
    pub counterparty_risk: C,
}

impl<C> EncryptedVector<C> {
    pub fn new(amount: C, frequency: C, counterparty_risk: C) -> Self {
        Self {
            amount,
            frequency,
            counterparty_risk,
        }
    }

    /// Components in wire order: amount, frequency, counterparty risk.
    pub fn dims(&self) -> [&C; DIMENSIONS] {
        [&self.amount, &self.frequency, &self.counterparty_risk]
    }

    pub fn try_map<D, E>(
        &self,
        mut f: impl FnMut(&C) -> Result<D, E>,
    ) -> Result<EncryptedVector<D>, E> {
        Ok(EncryptedVector {
            amount: f(&self.amount)?,
            frequency: f(&self.frequency)?,
            counterparty_risk: f(&self.counterparty_risk)?,
        })
    }

    /// Combine two vectors component-wise.
    pub fn try_zip_with<D, E>(
        &self,
        other: &Self,
        mut f: impl FnMut(&C, &C) -> Result<D, E>,
    ) -> Result<EncryptedVector<D>, E> {
        Ok(EncryptedVector {
            amount: f(&self.amount, &other.amount)?,
            frequency: f(&self.frequency, &other.frequency)?,
            counterparty_risk: f(&self.counterparty_risk, &other.counterparty_risk)?,
        })
    }
}
