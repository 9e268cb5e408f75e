use crate::algorithm::{self, Algorithm};
use crate::header_map::{is_map, parameters::label, Error, HeaderMap, HeaderValue, Label};
use serde::{
    de::{self, Error as DeError},
    ser::{self, Error as SerError},
};
use serde_cbor::Value;
use std::ops::{Deref, DerefMut};

/// Header parameters covered by the signature.
///
/// Encoded as `empty_or_serialized_map`: a byte string wrapping the canonical header map,
/// or a zero-length byte string when there are no parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtectedHeader(HeaderMap);

impl ProtectedHeader {
    /// The `alg` parameter.
    ///
    /// Fails with [`algorithm::Error::NotFound`] if absent, or
    /// [`algorithm::Error::Invalid`] if the value is not an integer.
    pub fn algorithm(&self) -> Result<Algorithm, algorithm::Error> {
        match self.0.get_i(label::ALGORITHM) {
            None => Err(algorithm::Error::NotFound),
            Some(HeaderValue::Algorithm(alg)) => Ok(*alg),
            Some(HeaderValue::Integer(i)) => i64::try_from(*i)
                .map(Algorithm::from)
                .map_err(|_| algorithm::Error::Invalid),
            Some(_) => Err(algorithm::Error::Invalid),
        }
    }

    pub fn set_algorithm(&mut self, alg: Algorithm) {
        self.0.insert_i(label::ALGORITHM, alg);
    }

    /// The labels a recipient is required to understand
    /// ([RFC-8152 Section 3.1](https://datatracker.ietf.org/doc/html/rfc8152#section-3.1)).
    ///
    /// Returns `None` if there is no `crit` parameter. If present it must be a non-empty array.
    pub fn critical(&self) -> Result<Option<&[HeaderValue]>, Error> {
        match self.0.get_i(label::CRITICAL) {
            None => Ok(None),
            Some(HeaderValue::Array(labels)) if labels.is_empty() => Err(Error::EmptyCritical),
            Some(HeaderValue::Array(labels)) => Ok(Some(labels)),
            Some(_) => Err(Error::InvalidCritical),
        }
    }

    /// Check that every label listed as critical is present in this header.
    pub fn ensure_critical(&self) -> Result<(), Error> {
        for value in self.critical()?.unwrap_or_default() {
            let label = match value {
                HeaderValue::Integer(i) => {
                    Label::Integer(i64::try_from(*i).map_err(|_| Error::LabelOverflow(*i))?)
                }
                HeaderValue::Text(t) => Label::Text(t.clone()),
                _ => return Err(Error::InvalidCritical),
            };
            if !self.0.contains_key(&label) {
                return Err(Error::MissingCritical(label));
            }
        }
        Ok(())
    }

    /// Encode the byte string wrapping this header.
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        let inner = self.encode_map()?;
        serde_cbor::to_vec(&serde_bytes::Bytes::new(&inner)).map_err(Error::Encoding)
    }

    /// Decode a protected header from its byte string encoding.
    pub fn from_slice(data: &[u8]) -> Result<Self, Error> {
        if data.is_empty() {
            return Err(Error::MissingType("protected"));
        }
        let decoded = match serde_cbor::from_slice(data).map_err(Error::Decoding)? {
            Value::Bytes(inner) => Self::decode_map(&inner),
            v => Err(Error::ExpectedByteString(format!("{:?}", v))),
        };
        decoded.map_err(|e| {
            tracing::debug!(error = %e, "rejected protected header");
            e
        })
    }

    /// The contents of the byte string: nothing if empty, otherwise the canonical map.
    fn encode_map(&self) -> Result<Vec<u8>, Error> {
        if self.0.is_empty() {
            return Ok(vec![]);
        }
        self.ensure_critical()?;
        self.0.to_vec()
    }

    fn decode_map(inner: &[u8]) -> Result<Self, Error> {
        if inner.is_empty() {
            return Ok(Self::default());
        }
        if !is_map(inner) {
            return Err(Error::RequireMapType("protected"));
        }
        let candidate = Self(HeaderMap::from_map_bytes(inner)?);
        candidate.ensure_critical()?;
        Ok(candidate.normalize_algorithm())
    }

    fn normalize_algorithm(mut self) -> Self {
        if let Ok(alg) = self.algorithm() {
            self.set_algorithm(alg);
        }
        self
    }
}

impl ser::Serialize for ProtectedHeader {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        let inner = self.encode_map().map_err(S::Error::custom)?;
        s.serialize_bytes(&inner)
    }
}

impl<'de> de::Deserialize<'de> for ProtectedHeader {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        match Value::deserialize(d)? {
            Value::Bytes(inner) => Self::decode_map(&inner).map_err(D::Error::custom),
            v => Err(D::Error::custom(format!(
                "expected byte str, found: {:?}",
                v
            ))),
        }
    }
}

impl AsRef<HeaderMap> for ProtectedHeader {
    fn as_ref(&self) -> &HeaderMap {
        &self.0
    }
}

impl AsMut<HeaderMap> for ProtectedHeader {
    fn as_mut(&mut self) -> &mut HeaderMap {
        &mut self.0
    }
}

impl Deref for ProtectedHeader {
    type Target = HeaderMap;

    fn deref(&self) -> &HeaderMap {
        &self.0
    }
}

impl DerefMut for ProtectedHeader {
    fn deref_mut(&mut self) -> &mut HeaderMap {
        &mut self.0
    }
}

impl From<HeaderMap> for ProtectedHeader {
    fn from(h: HeaderMap) -> Self {
        Self(h)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header_map::parameters::KeyId;

    fn decode(hex: &str) -> Result<ProtectedHeader, Error> {
        ProtectedHeader::from_slice(&hex::decode(hex).expect("invalid test vector"))
    }

    #[test]
    fn empty() {
        let header = ProtectedHeader::default();
        assert_eq!(header.to_vec().unwrap(), vec![0x40]);
        assert_eq!(decode("40").unwrap(), header);
    }

    #[test]
    fn empty_map_is_not_emitted() {
        // A wrapped empty map decodes, but re-encodes as the empty byte string.
        let header = decode("41a0").unwrap();
        assert!(header.is_empty());
        assert_eq!(hex::encode(header.to_vec().unwrap()), "40");
    }

    #[test]
    fn algorithm_roundtrip() {
        let mut header = ProtectedHeader::default();
        assert_eq!(header.algorithm(), Err(algorithm::Error::NotFound));
        header.set_algorithm(Algorithm::ES256);
        let bytes = header.to_vec().unwrap();
        assert_eq!(hex::encode(&bytes), "43a10126");

        let decoded = ProtectedHeader::from_slice(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.algorithm(), Ok(Algorithm::ES256));
    }

    #[test]
    fn integer_algorithm_is_normalized() {
        // An unregistered value is still an algorithm, in the unknown state.
        let decoded = decode("43a10100").unwrap();
        assert_eq!(
            decoded.get_i(label::ALGORITHM),
            Some(&HeaderValue::Algorithm(Algorithm::from(0)))
        );
        assert_eq!(
            decoded.algorithm().unwrap().compute_hash(b""),
            Err(algorithm::Error::UnavailableHashFunction)
        );
    }

    #[test]
    fn text_algorithm_is_invalid() {
        let decoded = decode("44a1016178").unwrap();
        assert_eq!(decoded.algorithm(), Err(algorithm::Error::Invalid));
        assert_eq!(hex::encode(decoded.to_vec().unwrap()), "44a1016178");
    }

    #[test]
    fn reencoding_is_stable() {
        let mut header = ProtectedHeader::default();
        header.set_algorithm(Algorithm::PS384);
        header.insert_header(KeyId::new(b"kid".to_vec())).unwrap();
        header.insert_t("custom", vec![HeaderValue::Integer(-1), "x".into()]);
        header.insert_i(label::CRITICAL, vec![HeaderValue::from("custom")]);

        let bytes = header.to_vec().unwrap();
        let decoded = ProtectedHeader::from_slice(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.to_vec().unwrap(), bytes);
        assert_eq!(
            decoded.critical().unwrap(),
            Some(&[HeaderValue::Text("custom".into())][..])
        );
    }

    #[test]
    fn critical_label_must_be_present() {
        let mut header = ProtectedHeader::default();
        header.set_algorithm(Algorithm::ES256);
        header.insert_i(label::CRITICAL, vec![HeaderValue::from(label::KEY_ID)]);
        assert!(matches!(
            header.to_vec(),
            Err(Error::MissingCritical(Label::Integer(4)))
        ));
        assert!(matches!(
            decode("46a20126028104"),
            Err(Error::MissingCritical(Label::Integer(4)))
        ));

        header.insert_header(KeyId::new(vec![1])).unwrap();
        header.to_vec().unwrap();
    }

    #[test]
    fn critical_list_must_be_non_empty_array() {
        let mut header = ProtectedHeader::default();
        header.insert_i(label::CRITICAL, Vec::<HeaderValue>::new());
        assert!(matches!(header.to_vec(), Err(Error::EmptyCritical)));
        assert!(matches!(decode("43a10280"), Err(Error::EmptyCritical)));

        header.insert_i(label::CRITICAL, 1);
        assert!(matches!(header.to_vec(), Err(Error::InvalidCritical)));
        assert!(matches!(decode("43a10201"), Err(Error::InvalidCritical)));
    }

    #[test]
    fn rejects_malformed() {
        let cases = vec![
            ("text string", "60"),
            ("bare map", "a10126"),
            ("array inside", "4180"),
            ("duplicate label", "45a201010102"),
            ("bstr label", "44a1410001"),
            ("label overflow", "4ba11bffffffffffffffff01"),
            ("truncated", "43a101"),
            ("empty input", ""),
        ];
        for (case, bytes) in cases {
            let err = decode(bytes).expect_err(case);
            let expected = match case {
                "text string" | "bare map" => matches!(err, Error::ExpectedByteString(_)),
                "array inside" => matches!(err, Error::RequireMapType("protected")),
                "duplicate label" => matches!(err, Error::DuplicateLabel(Label::Integer(1))),
                "bstr label" => matches!(err, Error::InvalidLabelType("bstr")),
                "label overflow" => matches!(err, Error::LabelOverflow(_)),
                "truncated" => matches!(err, Error::Decoding(_)),
                _ => matches!(err, Error::MissingType("protected")),
            };
            assert!(expected, "case: {}, error: {}", case, err);
        }
    }

    #[test]
    fn serde_embedding() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Envelope(ProtectedHeader, u8);

        let mut header = ProtectedHeader::default();
        header.set_algorithm(Algorithm::ES384);
        let bytes = serde_cbor::to_vec(&Envelope(header.clone(), 7)).unwrap();
        assert_eq!(hex::encode(&bytes), "8244a101382207");
        let Envelope(decoded, _) = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded, header);

        assert!(serde_cbor::from_slice::<Envelope>(&hex::decode("826007").unwrap()).is_err());
    }
}
