//! Standard COSE header parameters, as specified in the
//! [COSE Header Parameters registry](https://www.iana.org/assignments/cose/cose.xhtml).
use super::{Error, Header, HeaderValue, Label};

/// Registered header parameter labels.
pub mod label {
    pub const ALGORITHM: i64 = 1;
    pub const CRITICAL: i64 = 2;
    pub const CONTENT_TYPE: i64 = 3;
    pub const KEY_ID: i64 = 4;
    pub const COUNTER_SIGNATURE: i64 = 7;
    pub const COUNTER_SIGNATURE0: i64 = 9;
    pub const X5_BAG: i64 = 32;
    pub const X5_CHAIN: i64 = 33;
    pub const X5_T: i64 = 34;
    pub const X5_U: i64 = 35;
}

/// X.509 chain header.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub enum X5Chain {
    One(Vec<u8>),
    Many(Vec<Vec<u8>>),
}

impl Header for X5Chain {
    fn label() -> Label {
        Label::Integer(label::X5_CHAIN)
    }
}

impl From<X5Chain> for HeaderValue {
    fn from(value: X5Chain) -> Self {
        match value {
            X5Chain::One(v) => HeaderValue::Bytes(v),
            X5Chain::Many(v) => HeaderValue::Array(v.into_iter().map(HeaderValue::Bytes).collect()),
        }
    }
}

impl TryFrom<HeaderValue> for X5Chain {
    type Error = Error;

    fn try_from(value: HeaderValue) -> Result<Self, Self::Error> {
        match value {
            HeaderValue::Bytes(v) => Ok(X5Chain::One(v)),
            HeaderValue::Array(v) => v
                .into_iter()
                .map(|cert| match cert {
                    HeaderValue::Bytes(b) => Ok(b),
                    other => Err(Error::InvalidValue("x5chain", format!("{:?}", other))),
                })
                .collect::<Result<Vec<Vec<u8>>, Error>>()
                .map(X5Chain::Many),
            v => Err(Error::InvalidValue("x5chain", format!("{:?}", v))),
        }
    }
}

/// Key ID header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    pub fn new(value: impl Into<Vec<u8>>) -> KeyId {
        KeyId(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Header for KeyId {
    fn label() -> Label {
        Label::Integer(label::KEY_ID)
    }
}

impl From<KeyId> for HeaderValue {
    fn from(value: KeyId) -> Self {
        HeaderValue::Bytes(value.0)
    }
}

impl TryFrom<HeaderValue> for KeyId {
    type Error = Error;

    fn try_from(value: HeaderValue) -> Result<Self, Self::Error> {
        if let HeaderValue::Bytes(bytes) = value {
            Ok(KeyId(bytes))
        } else {
            Err(Error::InvalidValue("kid", format!("{:?}", value)))
        }
    }
}

/// Content type header: either a CoAP Content-Format number or a media type string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentType {
    CoapFormat(u16),
    MediaType(String),
}

impl Header for ContentType {
    fn label() -> Label {
        Label::Integer(label::CONTENT_TYPE)
    }
}

impl From<ContentType> for HeaderValue {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::CoapFormat(i) => HeaderValue::Integer(i.into()),
            ContentType::MediaType(t) => HeaderValue::Text(t),
        }
    }
}

impl TryFrom<HeaderValue> for ContentType {
    type Error = Error;

    fn try_from(value: HeaderValue) -> Result<Self, Self::Error> {
        match value {
            HeaderValue::Integer(i) => u16::try_from(i)
                .map(ContentType::CoapFormat)
                .map_err(|_| Error::InvalidValue("content type", i.to_string())),
            HeaderValue::Text(t) => Ok(ContentType::MediaType(t)),
            v => Err(Error::InvalidValue("content type", format!("{:?}", v))),
        }
    }
}
