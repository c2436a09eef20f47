#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use archetype_protocol::archetype::v1::{DecryptedSnapshot, SnapshotField, SNAPSHOT_ARITY};
use attestation::{cleartext_digest, verify_decryption_proof, ProofError};
use cluster_registry::ClusterCenter;
use keys::AuthorityKeys;
use log::{info, warn};
use prost::Message;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Fulfilled,
}

/// Outstanding or completed reveal of one cluster snapshot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionRequest<C> {
    pub request_id: u64,
    pub cluster_id: u32,
    pub status: RequestStatus,
    pub requested_at_ms: u64,
    /// Handles as they were when the request was opened.
    pub snapshot: ClusterCenter<C>,
}

/// Plain aggregates of a fulfilled request. Handed to the caller only.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterReveal {
    pub request_id: u64,
    pub cluster_id: u32,
    pub centroid_amount: u64,
    pub centroid_frequency: u64,
    pub centroid_risk: u64,
    pub member_count: u64,
    pub oracle_epoch: u64,
    pub cleartext_digest: [u8; 32],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevealError {
    #[error("unknown decryption request {0}")]
    UnknownRequest(u64),
    #[error("decryption request {0} already fulfilled")]
    AlreadyFulfilled(u64),
    #[error("proof verification failed: {0}")]
    ProofVerification(#[from] ProofError),
    #[error("malformed cleartext: {0}")]
    MalformedCleartext(String),
    #[error("request id space exhausted")]
    IdExhausted,
}

/// Per-request `Pending -> Fulfilled` state machine.
///
/// A request that fails to fulfil keeps its state, so the oracle may retry
/// with a corrected proof. Fulfilled requests stay on record and reject any
/// further callback.
#[derive(Debug, Clone)]
pub struct RevealCoordinator<C> {
    requests: BTreeMap<u64, DecryptionRequest<C>>,
    next_request_id: u64,
}

impl<C> Default for RevealCoordinator<C> {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
            next_request_id: 1,
        }
    }
}

impl<C: Clone> RevealCoordinator<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.next_request_id
    }

    /// Record a pending request over `snapshot` and return its id.
    pub fn open(
        &mut self,
        cluster_id: u32,
        snapshot: ClusterCenter<C>,
        requested_at_ms: u64,
    ) -> Result<u64, RevealError> {
        let request_id = self.next_request_id;
        let next = request_id
            .checked_add(1)
            .ok_or(RevealError::IdExhausted)?;

        self.requests.insert(
            request_id,
            DecryptionRequest {
                request_id,
                cluster_id,
                status: RequestStatus::Pending,
                requested_at_ms,
                snapshot,
            },
        );
        self.next_request_id = next;
        Ok(request_id)
    }

    /// Drop a request that was opened but never handed to the oracle.
    pub fn withdraw(&mut self, request_id: u64) -> Option<DecryptionRequest<C>> {
        match self.requests.get(&request_id) {
            Some(req) if req.status == RequestStatus::Pending => self.requests.remove(&request_id),
            _ => None,
        }
    }

    /// Check the oracle's answer and complete the request.
    pub fn fulfill(
        &mut self,
        request_id: u64,
        cleartext: &[u8],
        proof: &[u8],
        authority: &AuthorityKeys,
    ) -> Result<ClusterReveal, RevealError> {
        let request = self
            .requests
            .get(&request_id)
            .ok_or(RevealError::UnknownRequest(request_id))?;
        if request.status == RequestStatus::Fulfilled {
            warn!("duplicate callback for decryption request {request_id}");
            return Err(RevealError::AlreadyFulfilled(request_id));
        }

        let proof = verify_decryption_proof(request_id, cleartext, proof, authority)
            .map_err(|err| {
                warn!("rejected proof for decryption request {request_id}: {err}");
                RevealError::from(err)
            })?;
        let reveal = decode_reveal(request, cleartext, proof.epoch_id)?;

        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = RequestStatus::Fulfilled;
        }
        info!(
            "decryption request {request_id} fulfilled for cluster {} (oracle epoch {})",
            reveal.cluster_id, reveal.oracle_epoch
        );
        Ok(reveal)
    }

    pub fn get(&self, request_id: u64) -> Option<&DecryptionRequest<C>> {
        self.requests.get(&request_id)
    }

    /// `None` means the id was never issued.
    pub fn status(&self, request_id: u64) -> Option<RequestStatus> {
        self.requests.get(&request_id).map(|r| r.status)
    }

    /// Pending requests in id order, at most `limit` of them.
    pub fn pending(&self, limit: usize) -> Vec<&DecryptionRequest<C>> {
        self.requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

fn decode_reveal<C>(
    request: &DecryptionRequest<C>,
    cleartext: &[u8],
    oracle_epoch: u64,
) -> Result<ClusterReveal, RevealError> {
    let malformed = |reason: String| {
        warn!(
            "malformed cleartext for decryption request {}: {reason}",
            request.request_id
        );
        RevealError::MalformedCleartext(reason)
    };

    let snapshot = DecryptedSnapshot::decode(cleartext).map_err(|err| malformed(err.to_string()))?;
    if snapshot.request_id != request.request_id {
        return Err(malformed(format!(
            "cleartext names request {}",
            snapshot.request_id
        )));
    }
    if snapshot.cluster_id != request.cluster_id {
        return Err(malformed(format!(
            "cleartext names cluster {}, request targets {}",
            snapshot.cluster_id, request.cluster_id
        )));
    }
    if snapshot.values.len() != SNAPSHOT_ARITY {
        return Err(malformed(format!(
            "expected {SNAPSHOT_ARITY} values, got {}",
            snapshot.values.len()
        )));
    }

    let value = |field: SnapshotField| snapshot.values[field.index()];
    Ok(ClusterReveal {
        request_id: request.request_id,
        cluster_id: request.cluster_id,
        centroid_amount: value(SnapshotField::CentroidAmount),
        centroid_frequency: value(SnapshotField::CentroidFrequency),
        centroid_risk: value(SnapshotField::CentroidRisk),
        member_count: value(SnapshotField::MemberCount),
        oracle_epoch,
        cleartext_digest: cleartext_digest(cleartext),
    })
}
