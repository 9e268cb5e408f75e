use crate::header_map::{is_map, Error, HeaderMap};
use serde::ser;
use std::ops::{Deref, DerefMut};

/// Header parameters carried alongside the signature but not covered by it.
///
/// Encoded as the canonical header map itself; no parameters encode as `0xa0`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnprotectedHeader(HeaderMap);

impl UnprotectedHeader {
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        self.0.to_vec()
    }

    /// Decode an unprotected header from its map encoding.
    pub fn from_slice(data: &[u8]) -> Result<Self, Error> {
        if data.is_empty() {
            return Err(Error::MissingType("unprotected"));
        }
        if !is_map(data) {
            return Err(Error::RequireMapType("unprotected"));
        }
        HeaderMap::from_map_bytes(data).map(Self).map_err(|e| {
            tracing::debug!(error = %e, "rejected unprotected header");
            e
        })
    }
}

impl ser::Serialize for UnprotectedHeader {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        self.0.serialize(s)
    }
}

impl AsRef<HeaderMap> for UnprotectedHeader {
    fn as_ref(&self) -> &HeaderMap {
        &self.0
    }
}

impl AsMut<HeaderMap> for UnprotectedHeader {
    fn as_mut(&mut self) -> &mut HeaderMap {
        &mut self.0
    }
}

impl Deref for UnprotectedHeader {
    type Target = HeaderMap;

    fn deref(&self) -> &HeaderMap {
        &self.0
    }
}

impl DerefMut for UnprotectedHeader {
    fn deref_mut(&mut self) -> &mut HeaderMap {
        &mut self.0
    }
}

impl From<HeaderMap> for UnprotectedHeader {
    fn from(h: HeaderMap) -> Self {
        Self(h)
    }
}
