use cipher::{CipherBackend, EncryptedVector};

use crate::distance::squared_distance;
use crate::{Constants, ObliviousError};

/// Encrypted one-hot assignment over the clusters, in registration order.
#[derive(Debug, Clone)]
pub struct Selection<I> {
    pub indicators: Vec<I>,
    pub best_distance: I,
}

/// Obliviously find the nearest centroid.
///
/// The running minimum starts at cluster 0. A sum of three squares is never
/// 7 mod 8, so no distance equals `u64::MAX` and this matches starting from
/// MAX with every indicator cleared. Each later cluster takes over only
/// when strictly closer, clearing every earlier indicator through `select`, so
/// ties resolve to the lowest id and exactly one indicator decrypts to 1.
/// Costs K distances, K−1 comparisons and O(K²) selects.
pub fn select_nearest<'a, B, I>(
    backend: &B,
    constants: &Constants<B::Int>,
    vector: &EncryptedVector<B::Int>,
    centroids: I,
) -> Result<Selection<B::Int>, ObliviousError>
where
    B: CipherBackend,
    B::Int: 'a,
    I: IntoIterator<Item = &'a EncryptedVector<B::Int>>,
{
    let mut centroids = centroids.into_iter();
    let first = centroids.next().ok_or(ObliviousError::NoClusters)?;

    let mut best_distance = squared_distance(backend, vector, first)?;
    let mut indicators = vec![constants.one.clone()];

    for centroid in centroids {
        let distance = squared_distance(backend, vector, centroid)?;
        let closer = backend.lt(&distance, &best_distance)?;
        best_distance = backend.select(&closer, &distance, &best_distance)?;

        for indicator in indicators.iter_mut() {
            *indicator = backend.select(&closer, &constants.zero, indicator)?;
        }
        indicators.push(backend.select(&closer, &constants.one, &constants.zero)?);
    }

    Ok(Selection {
        indicators,
        best_distance,
    })
}
