use blake3::Hasher;
use prost::Message;

/// Top-level domain shared by every digest in the workspace.
pub const DOMAIN: &str = "ARCH";

/// Compute a Blake3 digest with a fully-qualified domain prefix to avoid collisions.
pub fn blake3_digest(domain: &str, schema: &str, version: &str, bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(b":");
    hasher.update(schema.as_bytes());
    hasher.update(b":");
    hasher.update(version.as_bytes());
    hasher.update(bytes);
    *hasher.finalize().as_bytes()
}

/// Encode a prost message deterministically. Avoid maps to guarantee ordering.
pub fn encode_deterministic<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}
