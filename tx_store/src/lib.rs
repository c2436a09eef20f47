#![forbid(unsafe_code)]

use cipher::EncryptedVector;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single ingested, still-encrypted feature vector.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord<C> {
    pub id: u64,
    pub vector: EncryptedVector<C>,
    pub created_at_ms: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxStoreError {
    #[error("transaction id space exhausted")]
    IdExhausted,
}

/// Append-only transaction registry. Ids start at 1 and increase by one per
/// append; records are never mutated or removed.
#[derive(Debug, Clone)]
pub struct TransactionStore<C> {
    records: Vec<TransactionRecord<C>>,
}

impl<C> Default for TransactionStore<C> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<C: Clone> TransactionStore<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next append will receive.
    pub fn next_id(&self) -> Result<u64, TxStoreError> {
        u64::try_from(self.records.len())
            .ok()
            .and_then(|len| len.checked_add(1))
            .ok_or(TxStoreError::IdExhausted)
    }

    pub fn append(
        &mut self,
        vector: EncryptedVector<C>,
        created_at_ms: u64,
    ) -> Result<&TransactionRecord<C>, TxStoreError> {
        let id = self.next_id()?;
        self.records.push(TransactionRecord {
            id,
            vector,
            created_at_ms,
        });
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn get(&self, id: u64) -> Option<&TransactionRecord<C>> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.records.get(index)
    }

    pub fn latest(&self) -> Option<&TransactionRecord<C>> {
        self.records.last()
    }

    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord<C>> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(seed: u64) -> EncryptedVector<u64> {
        EncryptedVector::new(seed, seed + 1, seed + 2)
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut store = TransactionStore::new();
        assert_eq!(store.next_id(), Ok(1));

        let ids: Vec<u64> = (0..5)
            .map(|i| store.append(vector(i), 100 + i).unwrap().id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.len(), 5);
        assert_eq!(store.latest().unwrap().created_at_ms, 104);
    }

    #[test]
    fn lookup_by_id() {
        let mut store = TransactionStore::new();
        store.append(vector(10), 1).unwrap();
        store.append(vector(20), 2).unwrap();

        assert_eq!(store.get(2).unwrap().vector, vector(20));
        assert!(store.get(0).is_none());
        assert!(store.get(3).is_none());
    }
}
