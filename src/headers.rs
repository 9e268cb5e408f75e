//! Protected and unprotected header buckets of a COSE message, and the rules binding the
//! protected `alg` parameter to the algorithm of a signer or verifier.
use crate::algorithm::{self, Algorithm, Role};
use crate::header_map::Error;
use crate::protected::ProtectedHeader;
use crate::unprotected::UnprotectedHeader;

/// A header bucket, either built in memory or received as encoded bytes.
///
/// The bytes of an unparsed bucket are always used as-is for encoding. Its structured view
/// is only available after [`Headers::materialize`], and is never re-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Bucket<T> {
    Parsed(T),
    Unparsed { raw: Vec<u8>, header: Option<T> },
}

impl<T> Bucket<T> {
    /// Structured view of the bucket, if any.
    pub fn header(&self) -> Option<&T> {
        match self {
            Bucket::Parsed(header) => Some(header),
            Bucket::Unparsed { header, .. } => header.as_ref(),
        }
    }

    /// Encoded bytes of an unparsed bucket.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Bucket::Parsed(_) => None,
            Bucket::Unparsed { raw, .. } => Some(raw),
        }
    }
}

impl<T: Default> Default for Bucket<T> {
    fn default() -> Self {
        Bucket::Parsed(T::default())
    }
}

/// Headers of a COSE message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    protected: Bucket<ProtectedHeader>,
    unprotected: Bucket<UnprotectedHeader>,
}

impl Headers {
    pub fn new(protected: ProtectedHeader, unprotected: UnprotectedHeader) -> Self {
        Self {
            protected: Bucket::Parsed(protected),
            unprotected: Bucket::Parsed(unprotected),
        }
    }

    /// Headers as received: the encoded protected byte string and the encoded unprotected map.
    pub fn from_raw(protected: Vec<u8>, unprotected: Vec<u8>) -> Self {
        Self {
            protected: Bucket::Unparsed {
                raw: protected,
                header: None,
            },
            unprotected: Bucket::Unparsed {
                raw: unprotected,
                header: None,
            },
        }
    }

    pub fn protected(&self) -> &Bucket<ProtectedHeader> {
        &self.protected
    }

    pub fn unprotected(&self) -> &Bucket<UnprotectedHeader> {
        &self.unprotected
    }

    /// Mutable access to a protected header built in memory.
    pub fn protected_mut(&mut self) -> Option<&mut ProtectedHeader> {
        match &mut self.protected {
            Bucket::Parsed(header) => Some(header),
            Bucket::Unparsed { .. } => None,
        }
    }

    /// Mutable access to an unprotected header built in memory.
    pub fn unprotected_mut(&mut self) -> Option<&mut UnprotectedHeader> {
        match &mut self.unprotected {
            Bucket::Parsed(header) => Some(header),
            Bucket::Unparsed { .. } => None,
        }
    }

    /// Encoded protected header, the received bytes if there are any.
    pub fn marshal_protected(&self) -> Result<Vec<u8>, Error> {
        match &self.protected {
            Bucket::Parsed(header) => header.to_vec(),
            Bucket::Unparsed { raw, .. } => Ok(raw.clone()),
        }
    }

    /// Encoded unprotected header, the received bytes if there are any.
    pub fn marshal_unprotected(&self) -> Result<Vec<u8>, Error> {
        match &self.unprotected {
            Bucket::Parsed(header) => header.to_vec(),
            Bucket::Unparsed { raw, .. } => Ok(raw.clone()),
        }
    }

    /// Decode the structured view of every unparsed bucket.
    ///
    /// Either both buckets are decoded or neither is updated.
    pub fn materialize(&mut self) -> Result<(), Error> {
        let protected = self
            .protected
            .raw()
            .map(ProtectedHeader::from_slice)
            .transpose()?;
        let unprotected = self
            .unprotected
            .raw()
            .map(UnprotectedHeader::from_slice)
            .transpose()?;

        if let Bucket::Unparsed { header, .. } = &mut self.protected {
            *header = protected;
        }
        if let Bucket::Unparsed { header, .. } = &mut self.unprotected {
            *header = unprotected;
        }
        Ok(())
    }

    /// Ensure the protected `alg` parameter agrees with the signer's algorithm, adding it
    /// when absent unless `external` data is supplied
    /// ([RFC-8152 Section 4.4](https://datatracker.ietf.org/doc/html/rfc8152#section-4.4)).
    ///
    /// A protected header received as bytes is never modified.
    pub fn ensure_signing_algorithm(
        &mut self,
        alg: Algorithm,
        external: &[u8],
    ) -> Result<(), algorithm::Error> {
        match self.check_algorithm(Role::Signer, alg, external) {
            Err(algorithm::Error::NotFound) => match &mut self.protected {
                Bucket::Parsed(header) => {
                    tracing::debug!(%alg, "adding alg to protected header");
                    header.set_algorithm(alg);
                    Ok(())
                }
                Bucket::Unparsed { .. } => Err(algorithm::Error::NotFound),
            },
            result => result,
        }
    }

    /// Ensure the protected `alg` parameter agrees with the verifier's algorithm. It may only
    /// be absent if `external` data is supplied.
    pub fn ensure_verification_algorithm(
        &self,
        alg: Algorithm,
        external: &[u8],
    ) -> Result<(), algorithm::Error> {
        self.check_algorithm(Role::Verifier, alg, external)
    }

    fn check_algorithm(
        &self,
        role: Role,
        alg: Algorithm,
        external: &[u8],
    ) -> Result<(), algorithm::Error> {
        let candidate = self
            .protected
            .header()
            .map_or(Err(algorithm::Error::NotFound), ProtectedHeader::algorithm);
        match candidate {
            Ok(header) if header == alg => Ok(()),
            Ok(header) => Err(algorithm::Error::Mismatch {
                role,
                operative: alg,
                header,
            }),
            Err(algorithm::Error::NotFound) if !external.is_empty() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header_map::{parameters::label, HeaderValue};

    const EXTERNAL: &[u8] = b"external";

    #[test]
    fn signing_adds_missing_algorithm() {
        let mut headers = Headers::default();
        headers
            .ensure_signing_algorithm(Algorithm::ES256, &[])
            .unwrap();
        let protected = headers.protected().header().unwrap();
        assert_eq!(protected.algorithm(), Ok(Algorithm::ES256));
        assert_eq!(hex::encode(headers.marshal_protected().unwrap()), "43a10126");

        // Idempotent for the same algorithm.
        headers
            .ensure_signing_algorithm(Algorithm::ES256, &[])
            .unwrap();

        let err = headers
            .ensure_signing_algorithm(Algorithm::ES384, &[])
            .unwrap_err();
        assert_eq!(
            err,
            algorithm::Error::Mismatch {
                role: Role::Signer,
                operative: Algorithm::ES384,
                header: Algorithm::ES256,
            }
        );
        assert_eq!(
            err.to_string(),
            "algorithm mismatch: signer ES384: header ES256"
        );
    }

    #[test]
    fn signing_with_external_data_leaves_algorithm_absent() {
        let mut headers = Headers::default();
        headers
            .ensure_signing_algorithm(Algorithm::PS256, EXTERNAL)
            .unwrap();
        assert!(headers.protected().header().unwrap().is_empty());
        assert_eq!(headers.marshal_protected().unwrap(), vec![0x40]);
    }

    #[test]
    fn signing_does_not_modify_received_bytes() {
        let mut headers = Headers::from_raw(vec![0x40], vec![0xa0]);
        assert_eq!(
            headers.ensure_signing_algorithm(Algorithm::ES256, &[]),
            Err(algorithm::Error::NotFound)
        );
        headers.materialize().unwrap();
        assert_eq!(
            headers.ensure_signing_algorithm(Algorithm::ES256, &[]),
            Err(algorithm::Error::NotFound)
        );
        assert_eq!(headers.marshal_protected().unwrap(), vec![0x40]);
        assert!(headers.protected_mut().is_none());
    }

    #[test]
    fn invalid_algorithm() {
        let mut protected = ProtectedHeader::default();
        protected.insert_i(label::ALGORITHM, "ES256");
        let mut headers = Headers::new(protected, UnprotectedHeader::default());
        assert_eq!(
            headers.ensure_signing_algorithm(Algorithm::ES256, EXTERNAL),
            Err(algorithm::Error::Invalid)
        );
        assert_eq!(
            headers.ensure_verification_algorithm(Algorithm::ES256, EXTERNAL),
            Err(algorithm::Error::Invalid)
        );
    }

    #[test]
    fn verification() {
        let mut headers = Headers::default();
        assert_eq!(
            headers.ensure_verification_algorithm(Algorithm::ES256, &[]),
            Err(algorithm::Error::NotFound)
        );
        headers
            .ensure_verification_algorithm(Algorithm::ES256, EXTERNAL)
            .unwrap();
        assert!(headers.protected().header().unwrap().is_empty());

        headers
            .protected_mut()
            .unwrap()
            .set_algorithm(Algorithm::ES512);
        headers
            .ensure_verification_algorithm(Algorithm::ES512, &[])
            .unwrap();
        let err = headers
            .ensure_verification_algorithm(Algorithm::ES256, EXTERNAL)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "algorithm mismatch: verifier ES256: header ES512"
        );
    }

    #[test]
    fn raw_bytes_are_authoritative() {
        // Non-canonical order: {4: h'31', 1: -7}.
        let raw_protected = hex::decode("46a20441310126").unwrap();
        let raw_unprotected = hex::decode("a1617801").unwrap();
        let mut headers = Headers::from_raw(raw_protected.clone(), raw_unprotected.clone());
        assert!(headers.protected().header().is_none());

        headers.materialize().unwrap();
        let protected = headers.protected().header().unwrap();
        assert_eq!(protected.algorithm(), Ok(Algorithm::ES256));
        assert_ne!(protected.to_vec().unwrap(), raw_protected);
        assert_eq!(
            headers.unprotected().header().unwrap().get_t("x"),
            Some(&HeaderValue::Integer(1))
        );

        assert_eq!(headers.marshal_protected().unwrap(), raw_protected);
        assert_eq!(headers.marshal_unprotected().unwrap(), raw_unprotected);
        headers
            .ensure_verification_algorithm(Algorithm::ES256, &[])
            .unwrap();
    }

    #[test]
    fn failed_materialize_changes_nothing() {
        let mut headers = Headers::from_raw(vec![0x43, 0xa1, 0x01, 0x26], vec![0x80]);
        let before = headers.clone();
        assert!(matches!(
            headers.materialize(),
            Err(Error::RequireMapType("unprotected"))
        ));
        assert_eq!(headers, before);
        assert!(headers.protected().header().is_none());
    }

    #[test]
    fn marshal_checks_critical() {
        let mut headers = Headers::default();
        headers
            .protected_mut()
            .unwrap()
            .insert_i(label::CRITICAL, vec![HeaderValue::from("missing")]);
        assert!(matches!(
            headers.marshal_protected(),
            Err(Error::MissingCritical(_))
        ));
        assert_eq!(headers.marshal_unprotected().unwrap(), vec![0xa0]);
    }

    #[cfg(feature = "p256")]
    #[test]
    fn sign_and_verify_with_headers() {
        use crate::algorithm::SignatureAlgorithm;
        use crate::ecdsa::EcdsaKeySigner;
        use crate::header_map::parameters::KeyId;
        use crate::signer::{Signer, Verifier};
        use rand_core::OsRng;

        let payload = b"This is the content.";
        let key = p256::ecdsa::SigningKey::random(&mut OsRng);
        let signer = EcdsaKeySigner::<p256::NistP256>::new(Algorithm::ES256, key).unwrap();

        let mut unprotected = UnprotectedHeader::default();
        unprotected.insert_header(KeyId::new(b"11".to_vec())).unwrap();
        let mut headers = Headers::new(ProtectedHeader::default(), unprotected);
        headers
            .ensure_signing_algorithm(signer.algorithm(), &[])
            .unwrap();
        let protected = headers.marshal_protected().unwrap();
        let unprotected = headers.marshal_unprotected().unwrap();
        let to_be_signed = [protected.as_slice(), payload].concat();
        let sig = signer.sign_message(&mut OsRng, &to_be_signed).unwrap();

        let mut received = Headers::from_raw(protected, unprotected);
        received.materialize().unwrap();
        let verifier = signer.verifier();
        received
            .ensure_verification_algorithm(verifier.algorithm(), &[])
            .unwrap();
        let key_id = received
            .unprotected()
            .header()
            .unwrap()
            .get_header::<KeyId>()
            .unwrap()
            .unwrap();
        assert_eq!(key_id.as_bytes(), b"11");

        let to_be_verified = [received.marshal_protected().unwrap().as_slice(), payload].concat();
        verifier.verify_message(&to_be_verified, &sig).unwrap();
    }
}
