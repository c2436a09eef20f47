use cipher::{CipherBackend, CipherError, EncryptedVector};

/// Squared Euclidean distance `Σ (v_i − c_i)^2`, evaluated homomorphically.
///
/// Subtraction and multiplication wrap exactly like the backend's integer
/// type. Since `(−d)^2 ≡ d^2` modulo 2^64 the result does not depend on the
/// operand order; per-dimension gaps above 2^32 overflow the square.
pub fn squared_distance<B: CipherBackend>(
    backend: &B,
    vector: &EncryptedVector<B::Int>,
    centroid: &EncryptedVector<B::Int>,
) -> Result<B::Int, CipherError> {
    let squares = vector.try_zip_with(centroid, |v, c| {
        let diff = backend.sub(v, c)?;
        backend.mul(&diff, &diff)
    })?;

    let partial = backend.add(&squares.amount, &squares.frequency)?;
    backend.add(&partial, &squares.counterparty_risk)
}
