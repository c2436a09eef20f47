#![forbid(unsafe_code)]

//! Data-oblivious nearest-cluster assignment and centroid maintenance.
//!
//! Nothing in this crate branches on, indexes by, or exits early because of a
//! ciphertext value. For a fixed cluster count every call issues the same
//! sequence of backend operations whatever the encrypted inputs are.

use cipher::{CipherBackend, CipherError, EncryptedVector};
use cluster_registry::ClusterCenter;
use thiserror::Error;

pub mod distance;
pub mod selector;
pub mod updater;

pub use distance::squared_distance;
pub use selector::{select_nearest, Selection};
pub use updater::{fold_all, fold_into, DivisionRounding};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObliviousError {
    #[error("no clusters to select from")]
    NoClusters,
    #[error("indicator count {indicators} does not match cluster count {clusters}")]
    IndicatorMismatch { indicators: usize, clusters: usize },
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Encrypted constants shared by the selector and the updater.
#[derive(Debug, Clone)]
pub struct Constants<I> {
    pub zero: I,
    pub one: I,
    pub two: I,
}

impl<I> Constants<I> {
    pub fn new<B: CipherBackend<Int = I>>(backend: &B) -> Result<Self, CipherError> {
        Ok(Self {
            zero: backend.constant(0)?,
            one: backend.constant(1)?,
            two: backend.constant(2)?,
        })
    }
}

/// Result of folding one vector into the whole registry.
#[derive(Debug, Clone)]
pub struct Assignment<I> {
    pub indicators: Vec<I>,
    pub states: Vec<ClusterCenter<I>>,
}

/// Select the nearest cluster and compute every cluster's next state.
///
/// Nothing is written anywhere; the caller commits `states` as a unit.
pub fn assign<B: CipherBackend>(
    backend: &B,
    clusters: &[ClusterCenter<B::Int>],
    vector: &EncryptedVector<B::Int>,
    rounding: DivisionRounding,
) -> Result<Assignment<B::Int>, ObliviousError> {
    let constants = Constants::new(backend)?;
    let selection = select_nearest(
        backend,
        &constants,
        vector,
        clusters.iter().map(|c| &c.centroid),
    )?;
    let states = fold_all(
        backend,
        &constants,
        clusters,
        &selection.indicators,
        vector,
        rounding,
    )?;

    Ok(Assignment {
        indicators: selection.indicators,
        states,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use cipher::{ClearBackend, ClearCiphertext, ClearKey, Decryptor, EncryptedVector, Encryptor};
    use cluster_registry::ClusterCenter;

    pub fn setup() -> (ClearKey, ClearBackend) {
        let key = ClearKey::new(42);
        let backend = key.backend();
        (key, backend)
    }

    pub fn vector(key: &ClearKey, a: u64, f: u64, r: u64) -> EncryptedVector<ClearCiphertext> {
        key.encrypt_vector(a, f, r)
    }

    pub fn cluster(key: &ClearKey, c: [u64; 3], count: u64) -> ClusterCenter<ClearCiphertext> {
        ClusterCenter {
            centroid: key.encrypt_vector(c[0], c[1], c[2]),
            member_count: key.encrypt(count),
        }
    }

    pub fn open_cluster(
        key: &ClearKey,
        cluster: &ClusterCenter<ClearCiphertext>,
    ) -> ([u64; 3], u64) {
        let c = &cluster.centroid;
        (
            [
                key.decrypt(&c.amount).unwrap(),
                key.decrypt(&c.frequency).unwrap(),
                key.decrypt(&c.counterparty_risk).unwrap(),
            ],
            key.decrypt(&cluster.member_count).unwrap(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use cipher::{ClearKey, Decryptor};

    #[test]
    fn assign_updates_only_the_nearest_cluster() {
        let (key, be) = setup();
        let clusters = vec![cluster(&key, [0, 0, 0], 0), cluster(&key, [100, 100, 100], 0)];

        let v = vector(&key, 0, 0, 0);
        let out = assign(&be, &clusters, &v, DivisionRounding::Truncate).unwrap();
        let opened: Vec<u64> = out
            .indicators
            .iter()
            .map(|i| key.decrypt(i).unwrap())
            .collect();
        assert_eq!(opened, vec![1, 0]);
        assert_eq!(open_cluster(&key, &out.states[0]), ([0, 0, 0], 1));
        assert_eq!(open_cluster(&key, &out.states[1]), ([100, 100, 100], 0));
    }

    #[test]
    fn assign_on_empty_registry_fails() {
        let (key, be) = setup();
        let res = assign(&be, &[], &vector(&key, 1, 1, 1), DivisionRounding::Truncate);
        assert_eq!(res.unwrap_err(), ObliviousError::NoClusters);
    }

    #[test]
    fn operation_sequence_does_not_depend_on_outcome() {
        let key = ClearKey::new(7);
        let be = key.backend().with_trace();
        let clusters = vec![
            cluster(&key, [0, 0, 0], 3),
            cluster(&key, [50, 50, 50], 0),
            cluster(&key, [100, 100, 100], 9),
        ];

        let mut traces = Vec::new();
        for target in [[1, 1, 1], [49, 50, 51], [99, 100, 120]] {
            be.clear_trace();
            let v = vector(&key, target[0], target[1], target[2]);
            let out = assign(&be, &clusters, &v, DivisionRounding::Truncate).unwrap();
            let ones = out
                .indicators
                .iter()
                .filter(|i| key.decrypt(*i).unwrap() == 1)
                .count();
            assert_eq!(ones, 1);
            traces.push(be.trace());
        }

        assert!(!traces[0].is_empty());
        assert_eq!(traces[0], traces[1]);
        assert_eq!(traces[1], traces[2]);
    }
}
