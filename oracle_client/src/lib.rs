#![forbid(unsafe_code)]

use std::collections::VecDeque;

use archetype_protocol::archetype::v1::{DecryptedSnapshot, SNAPSHOT_ARITY};
use attestation::encode_decryption_proof;
use cipher::Decryptor;
use cluster_registry::ClusterCenter;
use keys::{AuthorityKeys, KeyStore};
use log::debug;
use prost::Message;
use thiserror::Error;

/// Ciphertexts handed to the oracle for one decryption request, in
/// `SnapshotField` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSubmission<C> {
    pub request_id: u64,
    pub cluster_id: u32,
    pub handles: [C; SNAPSHOT_ARITY],
}

impl<C: Clone> OracleSubmission<C> {
    pub fn from_snapshot(request_id: u64, cluster_id: u32, snapshot: &ClusterCenter<C>) -> Self {
        let c = &snapshot.centroid;
        Self {
            request_id,
            cluster_id,
            handles: [
                c.amount.clone(),
                c.frequency.clone(),
                c.counterparty_risk.clone(),
                snapshot.member_count.clone(),
            ],
        }
    }
}

/// What the oracle eventually delivers back to the engine's callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    pub request_id: u64,
    pub cleartext: Vec<u8>,
    pub proof: Vec<u8>,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum OracleClientError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle failed to decrypt request {0}")]
    Decrypt(u64),
}

/// Decryption-oracle capability. Submission only enqueues work; the answer
/// arrives later through the engine's callback.
pub trait DecryptionOracle<C> {
    fn submit(&mut self, submission: OracleSubmission<C>) -> Result<(), OracleClientError>;
}

/// In-process oracle for development and tests. Holds the client key and
/// the signing keystore, answers submissions in FIFO order.
#[derive(Debug)]
pub struct DevOracle<C, K> {
    key: K,
    keystore: KeyStore,
    queue: VecDeque<OracleSubmission<C>>,
    submit_error: Option<OracleClientError>,
}

impl<C, K: Decryptor<C>> DevOracle<C, K> {
    pub fn new(key: K, keystore: KeyStore) -> Self {
        Self {
            key,
            keystore,
            queue: VecDeque::new(),
            submit_error: None,
        }
    }

    /// Verifier-side view of every key this oracle has signed with.
    pub fn authority(&self) -> AuthorityKeys {
        AuthorityKeys::from_keystore(&self.keystore)
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    pub fn keystore_mut(&mut self) -> &mut KeyStore {
        &mut self.keystore
    }

    /// Reject every later submission with `err`, or accept again with `None`.
    pub fn set_submit_error(&mut self, err: Option<OracleClientError>) {
        self.submit_error = err;
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Decrypt and sign the oldest queued submission.
    pub fn fulfill_next(&mut self) -> Option<Result<OracleResponse, OracleClientError>> {
        let submission = self.queue.pop_front()?;
        Some(self.answer(&submission))
    }

    /// Answer every queued submission in order.
    pub fn drain(&mut self) -> Vec<Result<OracleResponse, OracleClientError>> {
        std::iter::from_fn(|| self.fulfill_next()).collect()
    }

    fn answer(
        &self,
        submission: &OracleSubmission<C>,
    ) -> Result<OracleResponse, OracleClientError> {
        let values = submission
            .handles
            .iter()
            .map(|h| self.key.decrypt(h))
            .collect::<Result<Vec<u64>, _>>()
            .map_err(|_| OracleClientError::Decrypt(submission.request_id))?;

        let cleartext = DecryptedSnapshot {
            request_id: submission.request_id,
            cluster_id: submission.cluster_id,
            values,
        }
        .encode_to_vec();
        let proof = encode_decryption_proof(submission.request_id, &cleartext, &self.keystore);

        Ok(OracleResponse {
            request_id: submission.request_id,
            cleartext,
            proof,
        })
    }
}

impl<C, K: Decryptor<C>> DecryptionOracle<C> for DevOracle<C, K> {
    fn submit(&mut self, submission: OracleSubmission<C>) -> Result<(), OracleClientError> {
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        debug!(
            "oracle queued request {} for cluster {}",
            submission.request_id, submission.cluster_id
        );
        self.queue.push_back(submission);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestation::verify_decryption_proof;
    use cipher::{ClearCiphertext, ClearKey, Encryptor};

    fn snapshot(key: &ClearKey) -> ClusterCenter<ClearCiphertext> {
        ClusterCenter {
            centroid: key.encrypt_vector(11, 22, 33),
            member_count: key.encrypt(5),
        }
    }

    #[test]
    fn answers_in_submission_order_with_valid_proofs() {
        let key = ClearKey::new(1);
        let mut oracle: DevOracle<ClearCiphertext, _> =
            DevOracle::new(key.clone(), KeyStore::new_dev_keystore(1));
        let authority = oracle.authority();

        oracle
            .submit(OracleSubmission::from_snapshot(1, 0, &snapshot(&key)))
            .unwrap();
        oracle
            .submit(OracleSubmission::from_snapshot(2, 4, &snapshot(&key)))
            .unwrap();
        assert_eq!(oracle.queued(), 2);

        let responses: Vec<OracleResponse> =
            oracle.drain().into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].request_id, 1);

        let decoded = DecryptedSnapshot::decode(responses[1].cleartext.as_slice()).unwrap();
        assert_eq!(decoded.cluster_id, 4);
        assert_eq!(decoded.values, vec![11, 22, 33, 5]);
        for r in &responses {
            let verified =
                verify_decryption_proof(r.request_id, &r.cleartext, &r.proof, &authority);
            assert!(verified.is_ok());
        }
        assert!(oracle.fulfill_next().is_none());
    }

    #[test]
    fn submit_error_is_surfaced() {
        let key = ClearKey::new(1);
        let mut oracle: DevOracle<ClearCiphertext, _> =
            DevOracle::new(key.clone(), KeyStore::new_dev_keystore(1));
        let err = OracleClientError::Unavailable("offline".into());
        oracle.set_submit_error(Some(err.clone()));

        let res = oracle.submit(OracleSubmission::from_snapshot(1, 0, &snapshot(&key)));
        assert_eq!(res, Err(err));
        assert_eq!(oracle.queued(), 0);
    }

    #[test]
    fn foreign_ciphertexts_fail_to_decrypt() {
        let mut oracle: DevOracle<ClearCiphertext, _> =
            DevOracle::new(ClearKey::new(1), KeyStore::new_dev_keystore(1));
        let other = ClearKey::new(2);
        oracle
            .submit(OracleSubmission::from_snapshot(7, 0, &snapshot(&other)))
            .unwrap();

        assert_eq!(
            oracle.fulfill_next(),
            Some(Err(OracleClientError::Decrypt(7)))
        );
    }
}
