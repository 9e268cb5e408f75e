use crate::algorithm::SignatureAlgorithm;
use rand_core::CryptoRngCore;

/// Sign a digest using [`Self`] (e.g., a private key or a connection to an `HSM`),
/// returning the signature in its COSE wire form.
///
/// The digest is the output of the hash function of [`SignatureAlgorithm::algorithm`].
pub trait Signer: SignatureAlgorithm {
    /// Sign `digest`, possibly drawing entropy from `rng`.
    fn sign(&self, rng: &mut impl CryptoRngCore, digest: &[u8])
        -> Result<Vec<u8>, signature::Error>;

    /// Hash `message` with the bound algorithm, then sign the digest.
    fn sign_message(
        &self,
        rng: &mut impl CryptoRngCore,
        message: &[u8],
    ) -> Result<Vec<u8>, signature::Error> {
        let digest = self
            .algorithm()
            .compute_hash(message)
            .map_err(signature::Error::from_source)?;
        self.sign(rng, &digest)
    }
}

/// Verify a COSE signature over a digest using `Self` (e.g., a public key).
pub trait Verifier: SignatureAlgorithm {
    /// Returns an opaque error if the signature is malformed or inauthentic.
    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<(), signature::Error>;

    /// Hash `message` with the bound algorithm, then verify `signature` over the digest.
    fn verify_message(&self, message: &[u8], signature: &[u8]) -> Result<(), signature::Error> {
        let digest = self
            .algorithm()
            .compute_hash(message)
            .map_err(signature::Error::from_source)?;
        self.verify(&digest, signature)
    }
}
