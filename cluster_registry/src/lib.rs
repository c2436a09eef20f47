#![forbid(unsafe_code)]

use cipher::EncryptedVector;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Encrypted centroid and member count of one archetype.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCenter<C> {
    pub centroid: EncryptedVector<C>,
    pub member_count: C,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("cluster registry requires at least one cluster")]
    Empty,
    #[error("state batch covers {got} clusters, registry holds {expected}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("cluster id space exhausted")]
    IdExhausted,
}

/// Table of cluster states keyed by dense ids starting at 0. Clusters are
/// only ever appended; ids never change once assigned.
#[derive(Debug, Clone)]
pub struct ClusterRegistry<C> {
    clusters: Vec<ClusterCenter<C>>,
}

impl<C: Clone> ClusterRegistry<C> {
    /// Build the registry from its initial centroids, each with the supplied
    /// encrypted zero as member count.
    pub fn with_initial(
        centroids: Vec<EncryptedVector<C>>,
        zero: &C,
    ) -> Result<Self, RegistryError> {
        if centroids.is_empty() {
            return Err(RegistryError::Empty);
        }
        if u32::try_from(centroids.len()).is_err() {
            return Err(RegistryError::IdExhausted);
        }

        let clusters = centroids
            .into_iter()
            .map(|centroid| ClusterCenter {
                centroid,
                member_count: zero.clone(),
            })
            .collect();
        Ok(Self { clusters })
    }

    pub fn push(&mut self, centroid: EncryptedVector<C>, zero: C) -> Result<u32, RegistryError> {
        let id = u32::try_from(self.clusters.len()).map_err(|_| RegistryError::IdExhausted)?;
        self.clusters.push(ClusterCenter {
            centroid,
            member_count: zero,
        });
        Ok(id)
    }

    pub fn get(&self, id: u32) -> Option<&ClusterCenter<C>> {
        self.clusters.get(id as usize)
    }

    pub fn contains(&self, id: u32) -> bool {
        (id as usize) < self.clusters.len()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterCenter<C>> {
        self.clusters.iter()
    }

    pub fn as_slice(&self) -> &[ClusterCenter<C>] {
        &self.clusters
    }

    /// Overwrite every cluster in one step. The batch must cover the whole
    /// registry in id order.
    pub fn replace_all(&mut self, states: Vec<ClusterCenter<C>>) -> Result<(), RegistryError> {
        if states.len() != self.clusters.len() {
            return Err(RegistryError::LengthMismatch {
                expected: self.clusters.len(),
                got: states.len(),
            });
        }
        self.clusters = states;
        Ok(())
    }
}
