use cipher::{CipherBackend, CipherError, EncryptedVector};
use cluster_registry::ClusterCenter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Constants, ObliviousError};

/// Rounding applied by the running-mean division.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DivisionRounding {
    /// Plain truncating division; error compounds toward zero.
    #[default]
    Truncate,
    /// Add half the divisor before dividing.
    Nearest,
}

/// Fold `vector` into `cluster`, gated by its encrypted 0/1 indicator.
///
/// ```text
/// new_count = count + ind
/// x'        = select(ind != 0, x, c)
/// c'        = (c·count + ind·x') / max(new_count, 1)
/// c'        = select(ind != 0, c', c)
/// ```
/// With `ind = 1` this is the running mean `(c·n + x)/(n + 1)`; with `ind = 0`
/// it reproduces `c` exactly, even when `c·count` wraps. The same operations
/// run in both cases.
pub fn fold_into<B: CipherBackend>(
    backend: &B,
    constants: &Constants<B::Int>,
    cluster: &ClusterCenter<B::Int>,
    indicator: &B::Int,
    vector: &EncryptedVector<B::Int>,
    rounding: DivisionRounding,
) -> Result<ClusterCenter<B::Int>, CipherError> {
    let selected = backend.lt(&constants.zero, indicator)?;
    let new_count = backend.add(&cluster.member_count, indicator)?;
    let still_empty = backend.lt(&new_count, &constants.one)?;
    let divisor = backend.select(&still_empty, &constants.one, &new_count)?;
    let bias = match rounding {
        DivisionRounding::Truncate => None,
        DivisionRounding::Nearest => Some(backend.div(&divisor, &constants.two)?),
    };

    let centroid = cluster.centroid.try_zip_with(vector, |c, x| {
        let contribution = backend.select(&selected, x, c)?;
        let weighted = backend.mul(c, &cluster.member_count)?;
        let added = backend.mul(indicator, &contribution)?;
        let mut numerator = backend.add(&weighted, &added)?;
        if let Some(bias) = &bias {
            numerator = backend.add(&numerator, bias)?;
        }
        let mean = backend.div(&numerator, &divisor)?;
        backend.select(&selected, &mean, c)
    })?;

    Ok(ClusterCenter {
        centroid,
        member_count: new_count,
    })
}

/// Apply [`fold_into`] to every cluster with its own indicator.
pub fn fold_all<B: CipherBackend>(
    backend: &B,
    constants: &Constants<B::Int>,
    clusters: &[ClusterCenter<B::Int>],
    indicators: &[B::Int],
    vector: &EncryptedVector<B::Int>,
    rounding: DivisionRounding,
) -> Result<Vec<ClusterCenter<B::Int>>, ObliviousError> {
    if clusters.len() != indicators.len() {
        return Err(ObliviousError::IndicatorMismatch {
            indicators: indicators.len(),
            clusters: clusters.len(),
        });
    }

    clusters
        .iter()
        .zip(indicators)
        .map(|(cluster, indicator)| {
            fold_into(backend, constants, cluster, indicator, vector, rounding)
                .map_err(ObliviousError::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cluster, open_cluster, setup, vector};
    use cipher::{ClearBackend, ClearCiphertext, ClearKey, Encryptor};

    fn fold_sequence(
        key: &ClearKey,
        be: &ClearBackend,
        seed: [u64; 3],
        amounts: &[u64],
        rounding: DivisionRounding,
    ) -> ClusterCenter<ClearCiphertext> {
        let constants = Constants::new(be).unwrap();
        let one = key.encrypt(1);
        let mut state = cluster(key, seed, 0);
        for &a in amounts {
            let x = vector(key, a, 1, 2);
            state = fold_into(be, &constants, &state, &one, &x, rounding).unwrap();
        }
        state
    }

    fn stepwise_truncating_mean(values: &[u64]) -> u64 {
        let mut mean = 0u64;
        for (n, &x) in values.iter().enumerate() {
            mean = (mean * n as u64 + x) / (n as u64 + 1);
        }
        mean
    }

    #[test]
    fn running_mean_of_ten_twenty_thirty() {
        let (key, be) = setup();
        let state = fold_sequence(
            &key,
            &be,
            [999, 999, 999],
            &[10, 20, 30],
            DivisionRounding::Truncate,
        );
        assert_eq!(open_cluster(&key, &state), ([20, 1, 2], 3));
    }

    #[test]
    fn truncation_compounds_step_by_step() {
        let (key, be) = setup();
        let values = [1, 2, 3, 4];
        let state = fold_sequence(&key, &be, [0, 0, 0], &values, DivisionRounding::Truncate);
        let (centroid, count) = open_cluster(&key, &state);

        assert_eq!(count, 4);
        assert_eq!(centroid[0], stepwise_truncating_mean(&values));
        assert_eq!(centroid[0], 1);
        // The exact mean floors to 2; compounded truncation lands lower.
        assert_ne!(centroid[0], values.iter().sum::<u64>() / values.len() as u64);
    }

    #[test]
    fn nearest_rounding_reduces_downward_drift() {
        let (key, be) = setup();
        let state = fold_sequence(&key, &be, [0, 0, 0], &[1, 2], DivisionRounding::Nearest);
        assert_eq!(open_cluster(&key, &state).0[0], 2);

        let state = fold_sequence(&key, &be, [0, 0, 0], &[1, 2], DivisionRounding::Truncate);
        assert_eq!(open_cluster(&key, &state).0[0], 1);
    }

    #[test]
    fn zero_indicator_is_identity() {
        let (key, be) = setup();
        let constants = Constants::new(&be).unwrap();
        let zero = key.encrypt(0);
        let x = vector(&key, 7, 8, 9);

        for rounding in [DivisionRounding::Truncate, DivisionRounding::Nearest] {
            for (seed, count) in [([13, 17, 19], 5), ([40, 0, 3], 1), ([1, 2, 3], 0)] {
                let before = cluster(&key, seed, count);
                let after = fold_into(&be, &constants, &before, &zero, &x, rounding).unwrap();
                assert_eq!(open_cluster(&key, &after), (seed, count));
            }
        }
    }

    #[test]
    fn wrapping_product_leaves_unselected_cluster_intact() {
        let (key, be) = setup();
        let constants = Constants::new(&be).unwrap();
        let zero = key.encrypt(0);
        let x = vector(&key, 7, 8, 9);
        let seed = [1 << 40, 5, 7];
        let count = 1 << 24;

        for rounding in [DivisionRounding::Truncate, DivisionRounding::Nearest] {
            let before = cluster(&key, seed, count);
            let after = fold_into(&be, &constants, &before, &zero, &x, rounding).unwrap();
            assert_eq!(open_cluster(&key, &after), (seed, count));
        }
    }

    #[test]
    fn first_member_replaces_seed() {
        let (key, be) = setup();
        let state = fold_sequence(&key, &be, [500, 500, 500], &[42], DivisionRounding::Truncate);
        // seed is discarded, not averaged in
        assert_eq!(open_cluster(&key, &state), ([42, 1, 2], 1));
    }

    #[test]
    fn fold_all_rejects_length_mismatch() {
        let (key, be) = setup();
        let constants = Constants::new(&be).unwrap();
        let clusters = vec![cluster(&key, [0, 0, 0], 0)];
        let res = fold_all(
            &be,
            &constants,
            &clusters,
            &[],
            &vector(&key, 1, 1, 1),
            DivisionRounding::Truncate,
        );
        assert_eq!(
            res.unwrap_err(),
            ObliviousError::IndicatorMismatch {
                indicators: 0,
                clusters: 1
            }
        );
    }
}
