#![forbid(unsafe_code)]

use std::convert::TryInto;

use archetype_protocol::archetype::v1::OracleProof;
use common::{blake3_digest, encode_deterministic, DOMAIN};
use ed25519_dalek::{Signature, Signer, Verifier};
use keys::{AuthorityKeys, KeyStore};
use prost::Message;
use thiserror::Error;

const DECRYPTION_SIGN_DOMAIN: &[u8] = b"ARCH:SIGN:DECRYPTION";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("proof bytes are not a valid oracle proof")]
    Malformed,
    #[error("no trusted oracle key for epoch {epoch_id} ({key_id})")]
    UnknownKey { epoch_id: u64, key_id: String },
    #[error("signature does not match request {0}")]
    BadSignature(u64),
}

/// Digest of the raw cleartext bytes returned by the oracle.
pub fn cleartext_digest(cleartext: &[u8]) -> [u8; 32] {
    blake3_digest(DOMAIN, "CLEARTEXT", "v1", cleartext)
}

/// Attest to a decryption result, binding the signature to the exact
/// `(request_id, cleartext)` pair.
pub fn sign_decryption(request_id: u64, cleartext: &[u8], keystore: &KeyStore) -> OracleProof {
    let epoch_id = keystore.current_epoch();
    let signature = keystore
        .signing_key()
        .sign(&decryption_preimage(epoch_id, request_id, cleartext));

    OracleProof {
        epoch_id,
        key_id: keystore.current_key_id().to_string(),
        signature: signature.to_bytes().to_vec(),
    }
}

/// Sign and encode a proof into the bytes carried by the oracle callback.
pub fn encode_decryption_proof(request_id: u64, cleartext: &[u8], keystore: &KeyStore) -> Vec<u8> {
    encode_deterministic(&sign_decryption(request_id, cleartext, keystore))
}

/// Verify callback proof bytes against the trusted oracle authority.
pub fn verify_decryption_proof(
    request_id: u64,
    cleartext: &[u8],
    proof_bytes: &[u8],
    authority: &AuthorityKeys,
) -> Result<OracleProof, ProofError> {
    let proof = OracleProof::decode(proof_bytes).map_err(|_| ProofError::Malformed)?;

    let verifying_key = authority
        .verifying_key(proof.epoch_id, &proof.key_id)
        .ok_or_else(|| ProofError::UnknownKey {
            epoch_id: proof.epoch_id,
            key_id: proof.key_id.clone(),
        })?;

    let signature_bytes: [u8; 64] = proof
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| ProofError::Malformed)?;
    let signature = Signature::from_bytes(&signature_bytes);

    verifying_key
        .verify(
            &decryption_preimage(proof.epoch_id, request_id, cleartext),
            &signature,
        )
        .map_err(|_| ProofError::BadSignature(request_id))?;

    Ok(proof)
}

fn decryption_preimage(epoch_id: u64, request_id: u64, cleartext: &[u8]) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(DECRYPTION_SIGN_DOMAIN.len() + 48);
    preimage.extend_from_slice(DECRYPTION_SIGN_DOMAIN);
    preimage.extend_from_slice(&epoch_id.to_le_bytes());
    preimage.extend_from_slice(&request_id.to_le_bytes());
    preimage.extend_from_slice(&cleartext_digest(cleartext));
    preimage
}
