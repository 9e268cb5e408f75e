//! ECDSA [`Signer`] and [`Verifier`] backed by RustCrypto keys.
use super::{decode_asn1_signature, decode_signature, encode_signature};
use crate::algorithm::{self, Algorithm, SignatureAlgorithm};
use crate::signer::{Signer, Verifier};
use num_bigint::BigInt;
use rand_core::CryptoRngCore;

/// Elliptic curve usable for COSE ECDSA signatures.
pub trait EcdsaCurve {
    /// Curve name, e.g. `P-256`.
    const NAME: &'static str;
    /// Size of the curve's field in bits.
    const BIT_SIZE: usize;

    type SigningKey: SignatureAlgorithm;
    type VerifyingKey: SignatureAlgorithm;

    /// Sign a pre-hashed message, returning `(r, s)`.
    fn sign_digest(
        key: &Self::SigningKey,
        rng: &mut impl CryptoRngCore,
        digest: &[u8],
    ) -> Result<(BigInt, BigInt), signature::Error>;

    /// Verify `(r, s)` over a pre-hashed message.
    fn verify_digest(
        key: &Self::VerifyingKey,
        digest: &[u8],
        r: &BigInt,
        s: &BigInt,
    ) -> Result<(), signature::Error>;

    fn verifying_key(key: &Self::SigningKey) -> Self::VerifyingKey;
}

/// A signing capability producing ASN.1 DER encoded ECDSA signatures over a digest,
/// such as a hardware token or a remote key service.
pub trait Asn1Signer {
    fn sign_asn1(
        &self,
        rng: &mut impl CryptoRngCore,
        digest: &[u8],
    ) -> Result<Vec<u8>, signature::Error>;
}

fn check_key<K: SignatureAlgorithm, C: EcdsaCurve>(
    alg: Algorithm,
    key: &K,
) -> Result<(), algorithm::Error> {
    if key.algorithm() != alg {
        return Err(algorithm::Error::IncompatibleKey {
            algorithm: alg,
            curve: C::NAME,
        });
    }
    Ok(())
}

/// ECDSA signer holding a native private key.
pub struct EcdsaKeySigner<C: EcdsaCurve> {
    alg: Algorithm,
    key: C::SigningKey,
}

impl<C: EcdsaCurve> EcdsaKeySigner<C> {
    /// Bind `key` to `alg`. Fails if the key's curve is not the one `alg` requires.
    pub fn new(alg: Algorithm, key: C::SigningKey) -> Result<Self, algorithm::Error> {
        check_key::<_, C>(alg, &key)?;
        Ok(Self { alg, key })
    }

    /// Verifier for the public half of the key.
    pub fn verifier(&self) -> EcdsaVerifier<C> {
        EcdsaVerifier {
            alg: self.alg,
            key: C::verifying_key(&self.key),
        }
    }
}

impl<C: EcdsaCurve> SignatureAlgorithm for EcdsaKeySigner<C> {
    fn algorithm(&self) -> Algorithm {
        self.alg
    }
}

impl<C: EcdsaCurve> Signer for EcdsaKeySigner<C> {
    #[tracing::instrument(skip_all, fields(alg = %self.alg))]
    fn sign(
        &self,
        rng: &mut impl CryptoRngCore,
        digest: &[u8],
    ) -> Result<Vec<u8>, signature::Error> {
        let (r, s) = C::sign_digest(&self.key, rng, digest)?;
        encode_signature(C::BIT_SIZE, &r, &s).map_err(signature::Error::from_source)
    }
}

/// ECDSA signer holding a public key and an opaque [`Asn1Signer`] for the private half.
pub struct EcdsaCryptoSigner<C: EcdsaCurve, S> {
    alg: Algorithm,
    key: C::VerifyingKey,
    signer: S,
}

impl<C: EcdsaCurve, S: Asn1Signer> EcdsaCryptoSigner<C, S> {
    /// Bind `signer` and its public `key` to `alg`. Fails if the key's curve is not the
    /// one `alg` requires.
    pub fn new(alg: Algorithm, key: C::VerifyingKey, signer: S) -> Result<Self, algorithm::Error> {
        check_key::<_, C>(alg, &key)?;
        Ok(Self { alg, key, signer })
    }

    pub fn public_key(&self) -> &C::VerifyingKey {
        &self.key
    }
}

impl<C: EcdsaCurve, S> SignatureAlgorithm for EcdsaCryptoSigner<C, S> {
    fn algorithm(&self) -> Algorithm {
        self.alg
    }
}

impl<C: EcdsaCurve, S: Asn1Signer> Signer for EcdsaCryptoSigner<C, S> {
    #[tracing::instrument(skip_all, fields(alg = %self.alg))]
    fn sign(
        &self,
        rng: &mut impl CryptoRngCore,
        digest: &[u8],
    ) -> Result<Vec<u8>, signature::Error> {
        let der = self.signer.sign_asn1(rng, digest)?;
        let (r, s) = decode_asn1_signature(&der).map_err(signature::Error::from_source)?;
        encode_signature(C::BIT_SIZE, &r, &s).map_err(signature::Error::from_source)
    }
}

/// ECDSA verifier holding a native public key.
pub struct EcdsaVerifier<C: EcdsaCurve> {
    alg: Algorithm,
    key: C::VerifyingKey,
}

impl<C: EcdsaCurve> EcdsaVerifier<C> {
    /// Bind `key` to `alg`. Fails if the key's curve is not the one `alg` requires.
    pub fn new(alg: Algorithm, key: C::VerifyingKey) -> Result<Self, algorithm::Error> {
        check_key::<_, C>(alg, &key)?;
        Ok(Self { alg, key })
    }
}

impl<C: EcdsaCurve> SignatureAlgorithm for EcdsaVerifier<C> {
    fn algorithm(&self) -> Algorithm {
        self.alg
    }
}

impl<C: EcdsaCurve> Verifier for EcdsaVerifier<C> {
    #[tracing::instrument(skip_all, fields(alg = %self.alg))]
    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<(), signature::Error> {
        // Malformed and inauthentic signatures are reported identically.
        let verified = decode_signature(C::BIT_SIZE, signature)
            .ok()
            .and_then(|(r, s)| C::verify_digest(&self.key, digest, &r, &s).ok());
        match verified {
            Some(()) => Ok(()),
            None => {
                tracing::debug!("signature rejected");
                Err(signature::Error::new())
            }
        }
    }
}

macro_rules! impl_ecdsa_curve {
    ($feature:literal, $module:ident, $krate:ident, $curve:ident, $name:literal, $bits:literal) => {
        #[cfg(feature = $feature)]
        mod $module {
            use super::{Asn1Signer, EcdsaCurve};
            use crate::ecdsa::encode_signature;
            use crate::integer::os2ip;
            use num_bigint::BigInt;
            use rand_core::CryptoRngCore;
            use signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
            use $krate::ecdsa::{Signature, SigningKey, VerifyingKey};

            impl EcdsaCurve for $krate::$curve {
                const NAME: &'static str = $name;
                const BIT_SIZE: usize = $bits;

                type SigningKey = SigningKey;
                type VerifyingKey = VerifyingKey;

                fn sign_digest(
                    key: &SigningKey,
                    rng: &mut impl CryptoRngCore,
                    digest: &[u8],
                ) -> Result<(BigInt, BigInt), signature::Error> {
                    let sig: Signature = key.sign_prehash_with_rng(rng, digest)?;
                    let (r, s) = sig.split_bytes();
                    Ok((os2ip(&r), os2ip(&s)))
                }

                fn verify_digest(
                    key: &VerifyingKey,
                    digest: &[u8],
                    r: &BigInt,
                    s: &BigInt,
                ) -> Result<(), signature::Error> {
                    let bytes = encode_signature(Self::BIT_SIZE, r, s)
                        .map_err(signature::Error::from_source)?;
                    let sig = Signature::from_slice(&bytes)?;
                    key.verify_prehash(digest, &sig)
                }

                fn verifying_key(key: &SigningKey) -> VerifyingKey {
                    VerifyingKey::from(key)
                }
            }

            impl Asn1Signer for SigningKey {
                fn sign_asn1(
                    &self,
                    rng: &mut impl CryptoRngCore,
                    digest: &[u8],
                ) -> Result<Vec<u8>, signature::Error> {
                    let sig: Signature = self.sign_prehash_with_rng(rng, digest)?;
                    Ok(sig.to_der().as_bytes().to_vec())
                }
            }
        }
    };
}

impl_ecdsa_curve!("p256", nist_p256, p256, NistP256, "P-256", 256);
impl_ecdsa_curve!("p384", nist_p384, p384, NistP384, "P-384", 384);
