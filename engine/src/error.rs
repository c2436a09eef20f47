use archetype_protocol::archetype::v1::ReasonCodes;
use cipher::CipherError;
use cluster_registry::RegistryError;
use oblivious::ObliviousError;
use oracle_client::OracleClientError;
use reveal::RevealError;
use thiserror::Error;
use tx_store::TxStoreError;

/// Coarse failure class callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown cluster, or unknown or consumed request id.
    InvalidReference,
    ProofVerificationFailure,
    MalformedCleartext,
    /// A caller-supplied ciphertext failed structural validation.
    InvalidInput,
    /// The oracle refused or could not take the request.
    Collaborator,
    /// Adapter fault, exhausted id space, or a sealed engine.
    Fatal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown cluster {0}")]
    UnknownCluster(u32),
    #[error("invalid ciphertext input: {0}")]
    InvalidInput(CipherError),
    #[error("ciphertext adapter fault: {0}")]
    AdapterFault(ObliviousError),
    #[error("engine sealed after an adapter fault")]
    Sealed,
    #[error(transparent)]
    Reveal(#[from] RevealError),
    #[error("oracle submission failed: {0}")]
    Oracle(#[from] OracleClientError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    TxStore(#[from] TxStoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownCluster(_) => ErrorKind::InvalidReference,
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Reveal(err) => match err {
                RevealError::UnknownRequest(_) | RevealError::AlreadyFulfilled(_) => {
                    ErrorKind::InvalidReference
                }
                RevealError::ProofVerification(_) => ErrorKind::ProofVerificationFailure,
                RevealError::MalformedCleartext(_) => ErrorKind::MalformedCleartext,
                RevealError::IdExhausted => ErrorKind::Fatal,
            },
            EngineError::Oracle(_) => ErrorKind::Collaborator,
            EngineError::Registry(RegistryError::Empty) => ErrorKind::InvalidInput,
            EngineError::AdapterFault(_)
            | EngineError::Sealed
            | EngineError::Registry(_)
            | EngineError::TxStore(_) => ErrorKind::Fatal,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::UnknownCluster(_) => ReasonCodes::RV_REF_UNKNOWN_CLUSTER,
            EngineError::InvalidInput(_) => ReasonCodes::IN_CIPHERTEXT_INVALID,
            EngineError::Reveal(RevealError::UnknownRequest(_)) => {
                ReasonCodes::RV_REF_UNKNOWN_REQUEST
            }
            EngineError::Reveal(RevealError::AlreadyFulfilled(_)) => {
                ReasonCodes::RV_REF_REQUEST_CONSUMED
            }
            EngineError::Reveal(RevealError::ProofVerification(_)) => ReasonCodes::RV_PROOF_INVALID,
            EngineError::Reveal(RevealError::MalformedCleartext(_)) => {
                ReasonCodes::RV_CLEARTEXT_MALFORMED
            }
            EngineError::Oracle(_) => ReasonCodes::CO_ORACLE_UNAVAILABLE,
            EngineError::Sealed => ReasonCodes::RE_ENGINE_SEALED,
            EngineError::Registry(RegistryError::Empty) => ReasonCodes::RE_REGISTRY_EMPTY,
            EngineError::AdapterFault(_)
            | EngineError::Reveal(RevealError::IdExhausted)
            | EngineError::Registry(_)
            | EngineError::TxStore(_) => ReasonCodes::RE_ADAPTER_FAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestation::ProofError;

    #[test]
    fn kinds_follow_taxonomy() {
        let cases = [
            (EngineError::UnknownCluster(3), ErrorKind::InvalidReference),
            (
                EngineError::Reveal(RevealError::AlreadyFulfilled(1)),
                ErrorKind::InvalidReference,
            ),
            (
                EngineError::Reveal(RevealError::ProofVerification(ProofError::Malformed)),
                ErrorKind::ProofVerificationFailure,
            ),
            (
                EngineError::Reveal(RevealError::MalformedCleartext("arity".into())),
                ErrorKind::MalformedCleartext,
            ),
            (
                EngineError::InvalidInput(CipherError::Runtime("bad".into())),
                ErrorKind::InvalidInput,
            ),
            (
                EngineError::Oracle(OracleClientError::Unavailable("down".into())),
                ErrorKind::Collaborator,
            ),
            (EngineError::Sealed, ErrorKind::Fatal),
            (EngineError::Registry(RegistryError::Empty), ErrorKind::InvalidInput),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn reason_codes_are_distinct_per_reference_failure() {
        let unknown = EngineError::Reveal(RevealError::UnknownRequest(1)).reason_code();
        let consumed = EngineError::Reveal(RevealError::AlreadyFulfilled(1)).reason_code();
        assert_eq!(unknown, ReasonCodes::RV_REF_UNKNOWN_REQUEST);
        assert_eq!(consumed, ReasonCodes::RV_REF_REQUEST_CONSUMED);
        assert_eq!(EngineError::Sealed.reason_code(), ReasonCodes::RE_ENGINE_SEALED);
    }
}
