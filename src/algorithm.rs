use crate::header_map::{parameters::label, Error as HeaderError, Header, HeaderValue, Label};
use serde_cbor::Value;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::borrow::Cow;
use std::fmt;

/// Trait to represent the signature algorithm of a signer or verifier.
pub trait SignatureAlgorithm {
    fn algorithm(&self) -> Algorithm;
}

/// Errors that can occur when resolving or reconciling an algorithm.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("algorithm not found")]
    NotFound,
    #[error("invalid algorithm")]
    Invalid,
    #[error("hash function is not available")]
    UnavailableHashFunction,
    #[error("algorithm mismatch: {role} {operative}: header {header}")]
    Mismatch {
        role: Role,
        operative: Algorithm,
        header: Algorithm,
    },
    #[error("{algorithm} cannot be used with a {curve} key")]
    IncompatibleKey {
        algorithm: Algorithm,
        curve: &'static str,
    },
}

/// Side of the exchange that holds the operative algorithm in a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Signer,
    Verifier,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Signer => f.write_str("signer"),
            Role::Verifier => f.write_str("verifier"),
        }
    }
}

/// COSE signature algorithm identifier, as registered in the
/// [IANA COSE Algorithms registry](https://www.iana.org/assignments/cose/cose.xhtml#algorithms).
///
/// Any `i64` is representable. Values outside the registry are kept as-is and only fail
/// once a hash function is requested for them.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct Algorithm(i64);

impl Algorithm {
    pub const PS512: Algorithm = Algorithm(-39);
    pub const PS384: Algorithm = Algorithm(-38);
    pub const PS256: Algorithm = Algorithm(-37);
    pub const ES512: Algorithm = Algorithm(-36);
    pub const ES384: Algorithm = Algorithm(-35);
    pub const EdDSA: Algorithm = Algorithm(-8);
    pub const ES256: Algorithm = Algorithm(-7);

    /// Name of the algorithm according to the IANA COSE Algorithms registry.
    pub fn name(&self) -> Cow<'static, str> {
        match self.entry() {
            Some(entry) => Cow::Borrowed(entry.name),
            None => Cow::Owned(format!("unknown algorithm value {}", self.0)),
        }
    }

    /// Description of the algorithm according to the IANA COSE Algorithms registry.
    pub fn description(&self) -> Option<&'static str> {
        self.entry().map(|entry| entry.description)
    }

    /// CBOR representation of the algorithm according to the IANA COSE Algorithms registry.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_registered(&self) -> bool {
        self.entry().is_some()
    }

    /// Hash function used to digest the signing input before signing or verification.
    ///
    /// Algorithms that sign the message directly, such as EdDSA, have none.
    pub fn hash_function(&self) -> Result<HashFunction, Error> {
        self.entry()
            .and_then(|entry| entry.hash)
            .ok_or(Error::UnavailableHashFunction)
    }

    /// Digest `data` with the hash function of this algorithm.
    pub fn compute_hash(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.hash_function()?.digest(data))
    }

    fn entry(&self) -> Option<&'static Entry> {
        REGISTRY.iter().find(|entry| entry.algorithm == *self)
    }
}

struct Entry {
    algorithm: Algorithm,
    name: &'static str,
    description: &'static str,
    hash: Option<HashFunction>,
}

static REGISTRY: [Entry; 7] = [
    Entry {
        algorithm: Algorithm::PS512,
        name: "PS512",
        description: "RSASSA-PSS w/ SHA-512",
        hash: Some(HashFunction::Sha512),
    },
    Entry {
        algorithm: Algorithm::PS384,
        name: "PS384",
        description: "RSASSA-PSS w/ SHA-384",
        hash: Some(HashFunction::Sha384),
    },
    Entry {
        algorithm: Algorithm::PS256,
        name: "PS256",
        description: "RSASSA-PSS w/ SHA-256",
        hash: Some(HashFunction::Sha256),
    },
    Entry {
        algorithm: Algorithm::ES512,
        name: "ES512",
        description: "ECDSA w/ SHA-512",
        hash: Some(HashFunction::Sha512),
    },
    Entry {
        algorithm: Algorithm::ES384,
        name: "ES384",
        description: "ECDSA w/ SHA-384",
        hash: Some(HashFunction::Sha384),
    },
    Entry {
        algorithm: Algorithm::EdDSA,
        name: "EdDSA",
        description: "EdDSA",
        hash: None,
    },
    Entry {
        algorithm: Algorithm::ES256,
        name: "ES256",
        description: "ECDSA w/ SHA-256",
        hash: Some(HashFunction::Sha256),
    },
];

/// Hash functions used to pre-hash the signing input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashFunction {
    Sha256,
    Sha384,
    Sha512,
}

impl HashFunction {
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashFunction::Sha256 => Sha256::digest(data).to_vec(),
            HashFunction::Sha384 => Sha384::digest(data).to_vec(),
            HashFunction::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Size of the digest in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            HashFunction::Sha256 => 32,
            HashFunction::Sha384 => 48,
            HashFunction::Sha512 => 64,
        }
    }
}

impl From<i64> for Algorithm {
    fn from(value: i64) -> Self {
        Algorithm(value)
    }
}

impl From<Algorithm> for i64 {
    fn from(alg: Algorithm) -> Self {
        alg.0
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Header for Algorithm {
    fn label() -> Label {
        Label::Integer(label::ALGORITHM)
    }
}

impl From<Algorithm> for HeaderValue {
    fn from(alg: Algorithm) -> Self {
        HeaderValue::Algorithm(alg)
    }
}

impl TryFrom<HeaderValue> for Algorithm {
    type Error = HeaderError;

    fn try_from(value: HeaderValue) -> Result<Self, Self::Error> {
        match value {
            HeaderValue::Algorithm(alg) => Ok(alg),
            HeaderValue::Integer(i) => i64::try_from(i)
                .map(Algorithm)
                .map_err(|_| HeaderError::InvalidValue("alg", format!("{}", i))),
            v => Err(HeaderError::InvalidValue("alg", format!("{:?}", v))),
        }
    }
}

impl From<Algorithm> for Value {
    fn from(alg: Algorithm) -> Self {
        Value::Integer(alg.0.into())
    }
}

#[cfg(feature = "p256")]
mod p256 {
    use super::{Algorithm, SignatureAlgorithm};
    use p256::ecdsa::{SigningKey, VerifyingKey};

    impl SignatureAlgorithm for SigningKey {
        fn algorithm(&self) -> Algorithm {
            Algorithm::ES256
        }
    }

    impl SignatureAlgorithm for VerifyingKey {
        fn algorithm(&self) -> Algorithm {
            Algorithm::ES256
        }
    }
}

#[cfg(feature = "p384")]
mod p384 {
    use super::{Algorithm, SignatureAlgorithm};
    use p384::ecdsa::{SigningKey, VerifyingKey};

    impl SignatureAlgorithm for SigningKey {
        fn algorithm(&self) -> Algorithm {
            Algorithm::ES384
        }
    }

    impl SignatureAlgorithm for VerifyingKey {
        fn algorithm(&self) -> Algorithm {
            Algorithm::ES384
        }
    }
}
