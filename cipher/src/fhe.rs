//! TFHE-backed runtime over `FheUint64`.

use tfhe::prelude::*;
use tfhe::{ClientKey, FheBool, FheUint64, ServerKey};

use crate::{CipherBackend, CipherError, Decryptor, Encryptor};

/// Evaluation backend for `tfhe` ciphertexts.
///
/// The server key is installed on the constructing thread; the engine must be
/// driven from that thread.
#[derive(Debug, Default)]
pub struct TfheBackend;

impl TfheBackend {
    pub fn new(server_key: ServerKey) -> Self {
        tfhe::set_server_key(server_key);
        Self
    }
}

impl CipherBackend for TfheBackend {
    type Int = FheUint64;
    type Bool = FheBool;

    fn constant(&self, value: u64) -> Result<FheUint64, CipherError> {
        FheUint64::try_encrypt_trivial(value).map_err(|err| CipherError::Runtime(err.to_string()))
    }

    fn add(&self, lhs: &FheUint64, rhs: &FheUint64) -> Result<FheUint64, CipherError> {
        Ok(lhs + rhs)
    }

    fn sub(&self, lhs: &FheUint64, rhs: &FheUint64) -> Result<FheUint64, CipherError> {
        Ok(lhs - rhs)
    }

    fn mul(&self, lhs: &FheUint64, rhs: &FheUint64) -> Result<FheUint64, CipherError> {
        Ok(lhs * rhs)
    }

    fn div(&self, lhs: &FheUint64, rhs: &FheUint64) -> Result<FheUint64, CipherError> {
        Ok(lhs / rhs)
    }

    fn lt(&self, lhs: &FheUint64, rhs: &FheUint64) -> Result<FheBool, CipherError> {
        Ok(lhs.lt(rhs))
    }

    fn select(
        &self,
        cond: &FheBool,
        then: &FheUint64,
        otherwise: &FheUint64,
    ) -> Result<FheUint64, CipherError> {
        Ok(cond.if_then_else(then, otherwise))
    }
}

impl Encryptor<FheUint64> for ClientKey {
    fn encrypt(&self, value: u64) -> FheUint64 {
        FheUint64::encrypt(value, self)
    }
}

impl Decryptor<FheUint64> for ClientKey {
    fn decrypt(&self, value: &FheUint64) -> Result<u64, CipherError> {
        Ok(FheDecrypt::<u64>::decrypt(value, self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfhe::{generate_keys, ConfigBuilder};

    #[test]
    fn division_by_zero_and_select_match_clear_runtime() {
        let (client_key, server_key) = generate_keys(ConfigBuilder::default().build());
        let backend = TfheBackend::new(server_key);
        let seven = Encryptor::<FheUint64>::encrypt(&client_key, 7);
        let zero = Encryptor::<FheUint64>::encrypt(&client_key, 0);
        let open = |v: &FheUint64| Decryptor::<FheUint64>::decrypt(&client_key, v).unwrap();

        let quotient = backend.div(&seven, &zero).unwrap();
        assert_eq!(open(&quotient), u64::MAX);

        let wrapped = backend.sub(&zero, &seven).unwrap();
        assert_eq!(open(&wrapped), u64::MAX - 6);

        let zero_lt_seven = backend.lt(&zero, &seven).unwrap();
        let picked = backend.select(&zero_lt_seven, &seven, &zero).unwrap();
        assert_eq!(open(&picked), 7);

        let seven_lt_seven = backend.lt(&seven, &seven).unwrap();
        let picked = backend.select(&seven_lt_seven, &seven, &zero).unwrap();
        assert_eq!(open(&picked), 0);
    }
}
