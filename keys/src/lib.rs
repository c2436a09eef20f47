#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::OsRng;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEpoch {
    pub epoch_id: u64,
    pub key_id: String,
    pub public_key: [u8; 32],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("epoch {0} already trusted")]
    DuplicateEpoch(u64),
    #[error("public key for epoch {0} is not a valid ed25519 point")]
    InvalidPublicKey(u64),
}

/// In-memory keystore held by the decryption oracle, tracking the current
/// signing key and historical epochs.
#[derive(Debug, Clone)]
pub struct KeyStore {
    pub current_epoch: u64,
    pub current_key_id: String,
    pub secret_key: SigningKey,
    pub epochs: Vec<KeyEpoch>,
}

impl KeyStore {
    /// Construct a new developer keystore with a freshly generated signing key.
    pub fn new_dev_keystore(epoch_id: u64) -> Self {
        let mut rng = OsRng;
        let secret_key = SigningKey::generate(&mut rng);

        Self {
            current_epoch: epoch_id,
            current_key_id: oracle_key_id(epoch_id),
            secret_key,
            epochs: Vec::new(),
        }
    }

    /// Return the current epoch identifier.
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    /// Return the identifier for the current signing key.
    pub fn current_key_id(&self) -> &str {
        &self.current_key_id
    }

    /// Describe the current epoch for publication to verifiers.
    pub fn current_key_epoch(&self) -> KeyEpoch {
        KeyEpoch {
            epoch_id: self.current_epoch,
            key_id: self.current_key_id.clone(),
            public_key: self.secret_key.verifying_key().to_bytes(),
        }
    }

    /// Rotate to a new epoch, retaining the previous public key for verification.
    pub fn rotate(&mut self, new_epoch_id: u64) -> KeyEpoch {
        let archived = self.current_key_epoch();
        self.epochs.push(archived);

        let mut rng = OsRng;
        self.secret_key = SigningKey::generate(&mut rng);
        self.current_epoch = new_epoch_id;
        self.current_key_id = oracle_key_id(new_epoch_id);

        self.current_key_epoch()
    }

    /// Expose the current signing key for attestation routines.
    pub fn signing_key(&self) -> &SigningKey {
        &self.secret_key
    }
}

/// Verifier-side set of oracle keys the engine accepts proofs from.
#[derive(Debug, Clone, Default)]
pub struct AuthorityKeys {
    epochs: BTreeMap<u64, KeyEpoch>,
}

impl AuthorityKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust every epoch the given keystore has ever signed with.
    pub fn from_keystore(keystore: &KeyStore) -> Self {
        let mut authority = Self::new();
        for epoch in keystore
            .epochs
            .iter()
            .cloned()
            .chain(std::iter::once(keystore.current_key_epoch()))
        {
            authority.epochs.insert(epoch.epoch_id, epoch);
        }
        authority
    }

    pub fn trust(&mut self, epoch: KeyEpoch) -> Result<(), AuthorityError> {
        if self.epochs.contains_key(&epoch.epoch_id) {
            return Err(AuthorityError::DuplicateEpoch(epoch.epoch_id));
        }
        if VerifyingKey::from_bytes(&epoch.public_key).is_err() {
            return Err(AuthorityError::InvalidPublicKey(epoch.epoch_id));
        }
        self.epochs.insert(epoch.epoch_id, epoch);
        Ok(())
    }

    pub fn revoke(&mut self, epoch_id: u64) -> Option<KeyEpoch> {
        self.epochs.remove(&epoch_id)
    }

    /// Look up the verifying key for an epoch, checking the advertised key id.
    pub fn verifying_key(&self, epoch_id: u64, key_id: &str) -> Option<VerifyingKey> {
        let epoch = self.epochs.get(&epoch_id)?;
        if epoch.key_id != key_id {
            return None;
        }
        VerifyingKey::from_bytes(&epoch.public_key).ok()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}

fn oracle_key_id(epoch_id: u64) -> String {
    format!("oracle-epoch-{epoch_id}")
}
