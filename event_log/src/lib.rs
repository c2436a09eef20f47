#![forbid(unsafe_code)]

use std::collections::VecDeque;

use blake3::Hasher;
use limits::EngineLimits;
use log::debug;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const EVENT_DOMAIN: &[u8] = b"ARCH:EVENT";

/// Notifications emitted by the engine. Ids and digests only, never
/// plaintext or ciphertext contents.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    TransactionProcessed {
        transaction_id: u64,
        timestamp_ms: u64,
    },
    ClusterUpdated {
        cluster_id: u32,
    },
    DecryptionRequested {
        request_id: u64,
        cluster_id: u32,
    },
    ClusterDecrypted {
        request_id: u64,
        cluster_id: u32,
        cleartext_digest: [u8; 32],
    },
}

impl EngineEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineEvent::TransactionProcessed { .. } => "EV_TRANSACTION_PROCESSED",
            EngineEvent::ClusterUpdated { .. } => "EV_CLUSTER_UPDATED",
            EngineEvent::DecryptionRequested { .. } => "EV_DECRYPTION_REQUESTED",
            EngineEvent::ClusterDecrypted { .. } => "EV_CLUSTER_DECRYPTED",
        }
    }

    fn hash_payload(&self, hasher: &mut Hasher) {
        match self {
            EngineEvent::TransactionProcessed {
                transaction_id,
                timestamp_ms,
            } => {
                hasher.update(&transaction_id.to_le_bytes());
                hasher.update(&timestamp_ms.to_le_bytes());
            }
            EngineEvent::ClusterUpdated { cluster_id } => {
                hasher.update(&cluster_id.to_le_bytes());
            }
            EngineEvent::DecryptionRequested {
                request_id,
                cluster_id,
            } => {
                hasher.update(&request_id.to_le_bytes());
                hasher.update(&cluster_id.to_le_bytes());
            }
            EngineEvent::ClusterDecrypted {
                request_id,
                cluster_id,
                cleartext_digest,
            } => {
                hasher.update(&request_id.to_le_bytes());
                hasher.update(&cluster_id.to_le_bytes());
                hasher.update(cleartext_digest);
            }
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub seq: u64,
    pub event: EngineEvent,
    pub prev_event_digest: [u8; 32],
    pub event_digest: [u8; 32],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventLogError {
    #[error("event chain broken at seq {0}")]
    ChainBroken(u64),
}

/// Append-only, hash-chained notification log.
///
/// Only the newest `max_events_retained` events are kept. When an event is
/// evicted its digest becomes the base the first retained event chains from.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<LoggedEvent>,
    base_digest: [u8; 32],
    next_seq: u64,
    limits: EngineLimits,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

impl EventLog {
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            events: VecDeque::new(),
            base_digest: [0u8; 32],
            next_seq: 0,
            limits,
        }
    }

    /// Append an event, computing its chained digest.
    pub fn append(&mut self, event: EngineEvent) -> LoggedEvent {
        let prev_event_digest = self.head_digest();
        let seq = self.next_seq;
        let event_digest = compute_event_digest(seq, &event, prev_event_digest);
        let logged = LoggedEvent {
            seq,
            event,
            prev_event_digest,
            event_digest,
        };

        self.next_seq = self.next_seq.wrapping_add(1);
        self.events.push_back(logged.clone());
        self.evict_overflow();
        logged
    }

    /// Digest of the newest event, or of the base when nothing is retained.
    pub fn head_digest(&self) -> [u8; 32] {
        self.events
            .back()
            .map(|e| e.event_digest)
            .unwrap_or(self.base_digest)
    }

    pub fn base_digest(&self) -> [u8; 32] {
        self.base_digest
    }

    /// Number of events ever appended, evicted ones included.
    pub fn total_appended(&self) -> u64 {
        self.next_seq
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoggedEvent> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&LoggedEvent> {
        self.events.back()
    }

    /// Retained events with `seq >= from`.
    pub fn since(&self, from: u64) -> impl Iterator<Item = &LoggedEvent> {
        self.events.iter().filter(move |e| e.seq >= from)
    }

    /// Validate the retained chain for tamper evidence.
    pub fn validate_chain(&self) -> Result<(), EventLogError> {
        let mut prev = self.base_digest;
        for event in &self.events {
            if event.prev_event_digest != prev {
                return Err(EventLogError::ChainBroken(event.seq));
            }
            let computed = compute_event_digest(event.seq, &event.event, event.prev_event_digest);
            if computed != event.event_digest {
                return Err(EventLogError::ChainBroken(event.seq));
            }
            prev = event.event_digest;
        }
        Ok(())
    }

    fn evict_overflow(&mut self) {
        while self.events.len() > self.limits.max_events_retained {
            let Some(evicted) = self.events.pop_front() else {
                break;
            };
            debug!("event log full, folding seq {} into base digest", evicted.seq);
            self.base_digest = evicted.event_digest;
        }
    }
}

fn compute_event_digest(seq: u64, event: &EngineEvent, prev_event_digest: [u8; 32]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(EVENT_DOMAIN);
    hasher.update(&seq.to_le_bytes());
    hasher.update(event.as_str().as_bytes());
    event.hash_payload(&mut hasher);
    hasher.update(&prev_event_digest);
    *hasher.finalize().as_bytes()
}
