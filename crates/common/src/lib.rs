#![forbid(unsafe_code)]

pub mod digest;

pub use digest::{blake3_digest, encode_deterministic, DOMAIN};
