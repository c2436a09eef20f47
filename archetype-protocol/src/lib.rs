#![forbid(unsafe_code)]

/// Protocol-level types exchanged between the clustering engine and the
/// decryption oracle.
pub mod archetype {
    pub mod v1 {
        use prost::Message;
        #[cfg(feature = "serde")]
        use serde::{Deserialize, Serialize};

        /// Number of plaintext values carried by a cluster snapshot.
        pub const SNAPSHOT_ARITY: usize = 4;

        /// Position of each plaintext value inside `DecryptedSnapshot::values`.
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[repr(usize)]
        pub enum SnapshotField {
            CentroidAmount = 0,
            CentroidFrequency = 1,
            CentroidRisk = 2,
            MemberCount = 3,
        }

        impl SnapshotField {
            pub const ALL: [SnapshotField; SNAPSHOT_ARITY] = [
                SnapshotField::CentroidAmount,
                SnapshotField::CentroidFrequency,
                SnapshotField::CentroidRisk,
                SnapshotField::MemberCount,
            ];

            pub fn index(self) -> usize {
                self as usize
            }
        }

        /// Cleartext produced by the oracle for a single decryption request.
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[derive(Clone, PartialEq, Eq, Message)]
        pub struct DecryptedSnapshot {
            #[prost(uint64, tag = "1")]
            pub request_id: u64,
            #[prost(uint32, tag = "2")]
            pub cluster_id: u32,
            #[prost(uint64, repeated, tag = "3")]
            pub values: Vec<u64>,
        }

        /// Oracle attestation over a `(request_id, cleartext)` pair.
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[derive(Clone, PartialEq, Eq, Message)]
        pub struct OracleProof {
            #[prost(uint64, tag = "1")]
            pub epoch_id: u64,
            #[prost(string, tag = "2")]
            pub key_id: String,
            #[prost(bytes = "vec", tag = "3")]
            pub signature: Vec<u8>,
        }

        /// Reason codes attached to engine failures.
        pub struct ReasonCodes;

        impl ReasonCodes {
            pub const RV_REF_UNKNOWN_CLUSTER: &'static str = "RC.RV.REF.UNKNOWN_CLUSTER";
            pub const RV_REF_UNKNOWN_REQUEST: &'static str = "RC.RV.REF.UNKNOWN_REQUEST";
            pub const RV_REF_REQUEST_CONSUMED: &'static str = "RC.RV.REF.REQUEST_CONSUMED";
            pub const RV_PROOF_INVALID: &'static str = "RC.RV.PROOF.INVALID";
            pub const RV_CLEARTEXT_MALFORMED: &'static str = "RC.RV.CLEARTEXT.MALFORMED";
            pub const IN_CIPHERTEXT_INVALID: &'static str = "RC.IN.CIPHERTEXT.INVALID";
            pub const RE_ADAPTER_FAULT: &'static str = "RC.RE.ADAPTER.FAULT";
            pub const RE_ENGINE_SEALED: &'static str = "RC.RE.ENGINE.SEALED";
            pub const RE_REGISTRY_EMPTY: &'static str = "RC.RE.REGISTRY.EMPTY";
            pub const CO_ORACLE_UNAVAILABLE: &'static str = "RC.CO.ORACLE.UNAVAILABLE";
        }
    }
}

#[cfg(test)]
mod tests {
    use super::archetype::v1::*;
    use prost::Message;

    #[test]
    fn snapshot_fields_follow_wire_order() {
        let indices: Vec<usize> = SnapshotField::ALL.iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn truncated_snapshot_fails_to_decode() {
        let snapshot = DecryptedSnapshot {
            request_id: 7,
            cluster_id: 2,
            values: vec![10, 20, 30, 4],
        };
        let bytes = snapshot.encode_to_vec();
        assert!(DecryptedSnapshot::decode(&bytes[..bytes.len() - 1]).is_err());
        assert_eq!(DecryptedSnapshot::decode(bytes.as_slice()).unwrap(), snapshot);
    }
}
