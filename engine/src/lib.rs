#![forbid(unsafe_code)]

//! Encrypted archetype clustering engine.
//!
//! Every call takes `&mut self` and either commits completely or leaves the
//! engine untouched. Ciphertexts are only ever combined through the
//! [`CipherBackend`]; plaintext leaves the engine only as the return value of
//! [`ArchetypeEngine::on_decrypted`].

use std::time::{SystemTime, UNIX_EPOCH};

use cipher::{CipherBackend, EncryptedVector};
use cluster_registry::{ClusterCenter, ClusterRegistry, RegistryError};
use event_log::{EngineEvent, EventLog};
use keys::AuthorityKeys;
use log::{debug, error, info, warn};
use oblivious::ObliviousError;
use oracle_client::{DecryptionOracle, OracleSubmission};
use reveal::{ClusterReveal, DecryptionRequest, RequestStatus, RevealCoordinator};
use tx_store::{TransactionRecord, TransactionStore};

pub mod config;
pub mod error;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind};

pub struct ArchetypeEngine<B: CipherBackend, O> {
    backend: B,
    oracle: O,
    authority: AuthorityKeys,
    config: EngineConfig,
    transactions: TransactionStore<B::Int>,
    registry: ClusterRegistry<B::Int>,
    reveals: RevealCoordinator<B::Int>,
    events: EventLog,
    zero: B::Int,
    sealed: bool,
}

impl<B, O> ArchetypeEngine<B, O>
where
    B: CipherBackend,
    O: DecryptionOracle<B::Int>,
{
    /// Build the engine over a non-empty initial cluster set. Each initial
    /// cluster starts with an encrypted zero member count and is announced
    /// with a `ClusterUpdated` event.
    pub fn new(
        backend: B,
        oracle: O,
        authority: AuthorityKeys,
        config: EngineConfig,
        initial_centroids: Vec<EncryptedVector<B::Int>>,
    ) -> Result<Self, EngineError> {
        for centroid in &initial_centroids {
            validate_vector(&backend, centroid)?;
        }
        let zero = backend
            .constant(0)
            .map_err(|err| EngineError::AdapterFault(err.into()))?;
        let registry = ClusterRegistry::with_initial(initial_centroids, &zero)?;

        let mut events = EventLog::new(config.limits);
        let cluster_count =
            u32::try_from(registry.len()).map_err(|_| RegistryError::IdExhausted)?;
        for cluster_id in 0..cluster_count {
            events.append(EngineEvent::ClusterUpdated { cluster_id });
        }
        info!("archetype engine started with {} clusters", registry.len());

        Ok(Self {
            backend,
            oracle,
            authority,
            config,
            transactions: TransactionStore::new(),
            registry,
            reveals: RevealCoordinator::new(),
            events,
            zero,
            sealed: false,
        })
    }

    /// Ingest an encrypted feature vector stamped with the current time.
    pub fn ingest(&mut self, vector: EncryptedVector<B::Int>) -> Result<u64, EngineError> {
        self.ingest_at(vector, now_ms())
    }

    /// Assign `vector` to its nearest cluster and fold it in.
    ///
    /// Every cluster is rewritten on every call; which one actually moved is
    /// visible only after decryption.
    pub fn ingest_at(
        &mut self,
        vector: EncryptedVector<B::Int>,
        timestamp_ms: u64,
    ) -> Result<u64, EngineError> {
        self.ensure_live()?;
        validate_vector(&self.backend, &vector)?;
        let transaction_id = self.transactions.next_id()?;

        let assignment = oblivious::assign(
            &self.backend,
            self.registry.as_slice(),
            &vector,
            self.config.rounding,
        )
        .map_err(|err| self.adapter_fault(err))?;

        self.registry.replace_all(assignment.states)?;
        self.transactions.append(vector, timestamp_ms)?;
        self.events.append(EngineEvent::TransactionProcessed {
            transaction_id,
            timestamp_ms,
        });
        debug!(
            "transaction {transaction_id} folded across {} clusters",
            self.registry.len()
        );
        Ok(transaction_id)
    }

    /// Register a new archetype seeded at `centroid` with zero members.
    pub fn add_cluster(&mut self, centroid: EncryptedVector<B::Int>) -> Result<u32, EngineError> {
        self.ensure_live()?;
        validate_vector(&self.backend, &centroid)?;

        let cluster_id = self.registry.push(centroid, self.zero.clone())?;
        self.events.append(EngineEvent::ClusterUpdated { cluster_id });
        info!("cluster {cluster_id} created");

        if self.registry.len() > self.config.limits.cluster_soft_cap {
            warn!(
                "cluster count {} exceeds soft cap {}; ingestion cost grows with every cluster",
                self.registry.len(),
                self.config.limits.cluster_soft_cap
            );
        }
        Ok(cluster_id)
    }

    pub fn request_decryption(&mut self, cluster_id: u32) -> Result<u64, EngineError> {
        self.request_decryption_at(cluster_id, now_ms())
    }

    /// Snapshot a cluster's handles and hand them to the oracle.
    ///
    /// The snapshot is fixed here; later ingestions do not change what this
    /// request reveals.
    pub fn request_decryption_at(
        &mut self,
        cluster_id: u32,
        requested_at_ms: u64,
    ) -> Result<u64, EngineError> {
        self.ensure_live()?;
        let snapshot = self
            .registry
            .get(cluster_id)
            .cloned()
            .ok_or(EngineError::UnknownCluster(cluster_id))?;

        let submission = OracleSubmission::from_snapshot(
            self.reveals.next_id(),
            cluster_id,
            &snapshot,
        );
        let request_id = self.reveals.open(cluster_id, snapshot, requested_at_ms)?;
        if let Err(err) = self.oracle.submit(submission) {
            self.reveals.withdraw(request_id);
            warn!("oracle rejected decryption request {request_id}: {err}");
            return Err(err.into());
        }

        self.events.append(EngineEvent::DecryptionRequested {
            request_id,
            cluster_id,
        });
        info!("decryption request {request_id} opened for cluster {cluster_id}");
        Ok(request_id)
    }

    /// Oracle callback. Returns the revealed aggregates to the caller; the
    /// engine keeps only the event carrying ids and the cleartext digest.
    pub fn on_decrypted(
        &mut self,
        request_id: u64,
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<ClusterReveal, EngineError> {
        self.ensure_live()?;
        let reveal = self
            .reveals
            .fulfill(request_id, cleartext, proof, &self.authority)?;

        self.events.append(EngineEvent::ClusterDecrypted {
            request_id,
            cluster_id: reveal.cluster_id,
            cleartext_digest: reveal.cleartext_digest,
        });
        Ok(reveal)
    }

    pub fn transaction_count(&self) -> u64 {
        self.transactions.len()
    }

    pub fn transaction(&self, id: u64) -> Option<&TransactionRecord<B::Int>> {
        self.transactions.get(id)
    }

    pub fn cluster(&self, id: u32) -> Option<&ClusterCenter<B::Int>> {
        self.registry.get(id)
    }

    pub fn cluster_count(&self) -> usize {
        self.registry.len()
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterCenter<B::Int>> {
        self.registry.iter()
    }

    pub fn request_status(&self, request_id: u64) -> Option<RequestStatus> {
        self.reveals.status(request_id)
    }

    pub fn decryption_request(&self, request_id: u64) -> Option<&DecryptionRequest<B::Int>> {
        self.reveals.get(request_id)
    }

    /// Pending requests in id order, capped at `max_pending_listed`.
    pub fn pending_requests(&self) -> Vec<&DecryptionRequest<B::Int>> {
        self.reveals.pending(self.config.limits.max_pending_listed)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn authority(&self) -> &AuthorityKeys {
        &self.authority
    }

    /// Trusted oracle keys, for publishing a rotated epoch.
    pub fn authority_mut(&mut self) -> &mut AuthorityKeys {
        &mut self.authority
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.sealed {
            return Err(EngineError::Sealed);
        }
        Ok(())
    }

    fn adapter_fault(&mut self, err: ObliviousError) -> EngineError {
        error!("ciphertext adapter fault: {err}");
        if self.config.seal_on_adapter_fault {
            self.sealed = true;
            error!("engine sealed");
        }
        EngineError::AdapterFault(err)
    }
}

fn validate_vector<B: CipherBackend>(
    backend: &B,
    vector: &EncryptedVector<B::Int>,
) -> Result<(), EngineError> {
    for handle in vector.dims() {
        backend.validate(handle).map_err(EngineError::InvalidInput)?;
    }
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
