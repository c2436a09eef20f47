//! Transparent development runtime.
//!
//! Handles carry their plaintext alongside the tag of the key they were
//! produced under. Nothing outside this module can read the value without a
//! [`ClearKey`], so engine code written against [`CipherBackend`] cannot
//! observe it. Integer semantics match the FHE runtime exactly.

use std::cell::RefCell;
use std::fmt;

use rand_core::{OsRng, RngCore};

use crate::{CipherBackend, CipherError, Decryptor, Encryptor};

/// Dev-runtime handle. It carries its plaintext, so it has no serde impls.
#[derive(Clone, PartialEq, Eq)]
pub struct ClearCiphertext {
    key_tag: u64,
    value: u64,
}

impl fmt::Debug for ClearCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClearCiphertext(key={:#018x})", self.key_tag)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ClearBool {
    key_tag: u64,
    value: bool,
}

impl fmt::Debug for ClearBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClearBool(key={:#018x})", self.key_tag)
    }
}

/// Operation kinds recorded by a tracing backend. Values are never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherOp {
    Constant,
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Select,
    Validate,
}

/// Client key for the development runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearKey {
    tag: u64,
}

impl ClearKey {
    pub fn new(tag: u64) -> Self {
        Self { tag }
    }

    /// Generate a key with a random tag.
    pub fn generate() -> Self {
        Self::new(OsRng.next_u64())
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Server-side evaluation capability bound to this key.
    pub fn backend(&self) -> ClearBackend {
        ClearBackend {
            key_tag: self.tag,
            trace: None,
        }
    }
}

impl Encryptor<ClearCiphertext> for ClearKey {
    fn encrypt(&self, value: u64) -> ClearCiphertext {
        ClearCiphertext {
            key_tag: self.tag,
            value,
        }
    }
}

impl Decryptor<ClearCiphertext> for ClearKey {
    fn decrypt(&self, value: &ClearCiphertext) -> Result<u64, CipherError> {
        if value.key_tag != self.tag {
            return Err(CipherError::KeyMismatch {
                expected: self.tag,
                found: value.key_tag,
            });
        }
        Ok(value.value)
    }
}

#[derive(Debug)]
pub struct ClearBackend {
    key_tag: u64,
    trace: Option<RefCell<Vec<CipherOp>>>,
}

impl ClearBackend {
    /// Record the kind of every operation evaluated from now on.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(RefCell::new(Vec::new()));
        self
    }

    pub fn trace(&self) -> Vec<CipherOp> {
        self.trace
            .as_ref()
            .map(|t| t.borrow().clone())
            .unwrap_or_default()
    }

    pub fn clear_trace(&self) {
        if let Some(trace) = &self.trace {
            trace.borrow_mut().clear();
        }
    }

    fn record(&self, op: CipherOp) {
        if let Some(trace) = &self.trace {
            trace.borrow_mut().push(op);
        }
    }

    fn open(&self, value: &ClearCiphertext) -> Result<u64, CipherError> {
        if value.key_tag != self.key_tag {
            return Err(CipherError::KeyMismatch {
                expected: self.key_tag,
                found: value.key_tag,
            });
        }
        Ok(value.value)
    }

    fn seal(&self, value: u64) -> ClearCiphertext {
        ClearCiphertext {
            key_tag: self.key_tag,
            value,
        }
    }

    fn binary(
        &self,
        op: CipherOp,
        lhs: &ClearCiphertext,
        rhs: &ClearCiphertext,
        f: impl FnOnce(u64, u64) -> u64,
    ) -> Result<ClearCiphertext, CipherError> {
        self.record(op);
        let l = self.open(lhs)?;
        let r = self.open(rhs)?;
        Ok(self.seal(f(l, r)))
    }
}

impl CipherBackend for ClearBackend {
    type Int = ClearCiphertext;
    type Bool = ClearBool;

    fn constant(&self, value: u64) -> Result<Self::Int, CipherError> {
        self.record(CipherOp::Constant);
        Ok(self.seal(value))
    }

    fn add(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError> {
        self.binary(CipherOp::Add, lhs, rhs, u64::wrapping_add)
    }

    fn sub(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError> {
        self.binary(CipherOp::Sub, lhs, rhs, u64::wrapping_sub)
    }

    fn mul(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError> {
        self.binary(CipherOp::Mul, lhs, rhs, u64::wrapping_mul)
    }

    fn div(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Int, CipherError> {
        self.binary(CipherOp::Div, lhs, rhs, |l, r| l.checked_div(r).unwrap_or(u64::MAX))
    }

    fn lt(&self, lhs: &Self::Int, rhs: &Self::Int) -> Result<Self::Bool, CipherError> {
        self.record(CipherOp::Lt);
        let l = self.open(lhs)?;
        let r = self.open(rhs)?;
        Ok(ClearBool {
            key_tag: self.key_tag,
            value: l < r,
        })
    }

    fn select(
        &self,
        cond: &ClearBool,
        then: &ClearCiphertext,
        otherwise: &ClearCiphertext,
    ) -> Result<ClearCiphertext, CipherError> {
        self.record(CipherOp::Select);
        if cond.key_tag != self.key_tag {
            return Err(CipherError::KeyMismatch {
                expected: self.key_tag,
                found: cond.key_tag,
            });
        }
        let t = self.open(then)?;
        let o = self.open(otherwise)?;
        Ok(self.seal(if cond.value { t } else { o }))
    }

    fn validate(&self, value: &ClearCiphertext) -> Result<(), CipherError> {
        self.record(CipherOp::Validate);
        self.open(value).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ClearKey, ClearBackend) {
        let key = ClearKey::new(0xA11CE);
        let backend = key.backend();
        (key, backend)
    }

    #[test]
    fn arithmetic_wraps_like_the_runtime() {
        let (key, be) = setup();
        let small = key.encrypt(5);
        let big = key.encrypt(u64::MAX);

        let diff = be.sub(&small, &key.encrypt(10)).unwrap();
        assert_eq!(key.decrypt(&diff).unwrap(), u64::MAX - 4);

        let sq = be.mul(&diff, &diff).unwrap();
        assert_eq!(key.decrypt(&sq).unwrap(), 25);

        let sum = be.add(&big, &small).unwrap();
        assert_eq!(key.decrypt(&sum).unwrap(), 4);
    }

    #[test]
    fn division_truncates_and_zero_divisor_saturates() {
        let (key, be) = setup();
        let q = be.div(&key.encrypt(7), &key.encrypt(2)).unwrap();
        assert_eq!(key.decrypt(&q).unwrap(), 3);

        let z = be.div(&key.encrypt(7), &key.encrypt(0)).unwrap();
        assert_eq!(key.decrypt(&z).unwrap(), u64::MAX);
    }

    #[test]
    fn select_materializes_chosen_branch() {
        let (key, be) = setup();
        let a = key.encrypt(1);
        let b = key.encrypt(2);
        let yes = be.lt(&a, &b).unwrap();
        let no = be.lt(&b, &a).unwrap();
        assert_eq!(key.decrypt(&be.select(&yes, &a, &b).unwrap()).unwrap(), 1);
        assert_eq!(key.decrypt(&be.select(&no, &a, &b).unwrap()).unwrap(), 2);
    }

    #[test]
    fn foreign_key_handles_are_rejected() {
        let (_, be) = setup();
        let other = ClearKey::new(7);
        let foreign = other.encrypt(1);
        assert_eq!(
            be.validate(&foreign),
            Err(CipherError::KeyMismatch {
                expected: 0xA11CE,
                found: 7
            })
        );
        assert!(be.add(&foreign, &foreign).is_err());
    }

    #[test]
    fn trace_records_kinds_only_when_enabled() {
        let (key, be) = setup();
        let _ = be.add(&key.encrypt(1), &key.encrypt(2)).unwrap();
        assert!(be.trace().is_empty());

        let be = be.with_trace();
        let one = be.constant(1).unwrap();
        let flag = be.lt(&one, &one).unwrap();
        let _ = be.select(&flag, &one, &one).unwrap();
        assert_eq!(
            be.trace(),
            vec![CipherOp::Constant, CipherOp::Lt, CipherOp::Select]
        );
        be.clear_trace();
        assert!(be.trace().is_empty());
    }

    #[test]
    fn debug_output_hides_values() {
        let key = ClearKey::new(1);
        let rendered = format!("{:?}", key.encrypt(123_456));
        assert!(!rendered.contains("123456"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn handles_have_no_serde_impls() {
        trait Fallback {
            const SERIALIZABLE: bool = false;
        }
        struct Check<T>(std::marker::PhantomData<T>);
        impl<T> Fallback for Check<T> {}
        impl<T: serde::Serialize> Check<T> {
            const SERIALIZABLE: bool = true;
        }

        assert!(Check::<u64>::SERIALIZABLE);
        assert!(!Check::<ClearCiphertext>::SERIALIZABLE);
    }
}
