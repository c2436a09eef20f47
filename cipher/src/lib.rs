#![forbid(unsafe_code)]

//! Ciphertext arithmetic adapter.
//!
//! Every homomorphic operation the engine performs goes through
//! [`CipherBackend`]. Implementations mirror the encrypted integer type of the
//! runtime they wrap: unsigned 64-bit values, wrapping `add`/`sub`/`mul`,
//! truncating `div` with `u64::MAX` as the quotient of a zero divisor.

use thiserror::Error;

pub mod clear;
#[cfg(feature = "tfhe")]
pub mod fhe;
pub mod vector;

pub use clear::{CipherOp, ClearBackend, ClearBool, ClearCiphertext, ClearKey};
#[cfg(feature = "tfhe")]
pub use fhe::TfheBackend;
pub use vector::{EncryptedVector, DIMENSIONS};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("ciphertext bound to key {found:#018x}, backend expects {expected:#018x}")]
    KeyMismatch { expected: u64, found: u64 },
    #[error("runtime fault: {0}")]
    Runtime(String),
}

/// Homomorphic integer capability consumed by the engine.
///
/// All methods are total over valid handles; an `Err` is an adapter fault,
/// never a data-dependent outcome.
pub trait CipherBackend {
    /// Opaque handle to an encrypted integer.
    type Int: Clone;
    /// Opaque handle to an encrypted boolean.
    type Bool: Clone;

    fn constant(&self, value: u64) -> Result<Self::Int, CipherError>;
    fn add(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError>;
    fn sub(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError>;
    fn mul(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError>;
    fn div(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError>;
    fn lt(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Bool, CipherError>;

    /// Oblivious multiplexer: both inputs are always consumed.
    fn select(
        &self,
        cond: &Self::Bool,
        then: &Self::Int,
        otherwise: &Self::Int,
    ) -> Result<Self::Int, CipherError>;

    /// Structural validation of a caller-supplied handle.
    fn validate(&self, _value: &Self::Int) -> Result<(), CipherError> {
        Ok(())
    }
}

/// Client-side encryption under the shared key.
pub trait Encryptor<C> {
    fn encrypt(&self, value: u64) -> C;

    fn encrypt_vector(&self, amount: u64, frequency: u64, risk: u64) -> EncryptedVector<C> {
        EncryptedVector::new(
            self.encrypt(amount),
            self.encrypt(frequency),
            self.encrypt(risk),
        )
    }
}

/// Decryption, available only to the oracle and to tests.
pub trait Decryptor<C> {
    fn decrypt(&self, value: &C) -> Result<u64, CipherError>;
}
