use crate::algorithm::Algorithm;
use serde::{
    de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor},
    ser::{self, Error as _, SerializeMap},
    Deserialize, Serialize,
};
use serde_cbor::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Deref;

pub mod parameters;

/// Errors that can occur encoding, decoding or accessing COSE headers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to encode header: {0}")]
    Encoding(serde_cbor::Error),
    #[error("unable to decode header: {0}")]
    Decoding(serde_cbor::Error),
    #[error("protected header: expected byte str, found: {0}")]
    ExpectedByteString(String),
    #[error("{0} header: missing type")]
    MissingType(&'static str),
    #[error("{0} header: require map type")]
    RequireMapType(&'static str),
    #[error("header label: require int / tstr type, found {0}")]
    InvalidLabelType(&'static str),
    #[error("header label: int key must fit in a 64-bit signed integer, found {0}")]
    LabelOverflow(i128),
    #[error("header label: duplicated label: {0}")]
    DuplicateLabel(Label),
    #[error("header value: unsupported type: {0}")]
    UnsupportedValue(String),
    #[error("invalid {0} header value: {1}")]
    InvalidValue(&'static str, String),
    #[error("invalid crit header")]
    InvalidCritical,
    #[error("empty crit header")]
    EmptyCritical,
    #[error("missing critical header: {0}")]
    MissingCritical(Label),
}

/// Label of a header parameter, restricted to integers and text strings per
/// [RFC-8152 Section 1.4](https://datatracker.ietf.org/doc/html/rfc8152#section-1.4).
///
/// `Integer(5)` and `Text("5")` are different labels.
#[derive(Debug, Clone, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub enum Label {
    Integer(i64),
    Text(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Label::Integer(i) => write!(f, "{}", i),
            Label::Text(t) => write!(f, "{:?}", t),
        }
    }
}

impl From<i64> for Label {
    fn from(i: i64) -> Self {
        Label::Integer(i)
    }
}

impl From<&str> for Label {
    fn from(t: &str) -> Self {
        Label::Text(t.into())
    }
}

impl From<String> for Label {
    fn from(t: String) -> Self {
        Label::Text(t)
    }
}

impl From<Label> for Value {
    fn from(label: Label) -> Value {
        match label {
            Label::Integer(i) => Value::Integer(i.into()),
            Label::Text(t) => Value::Text(t),
        }
    }
}

impl TryFrom<Value> for Label {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(i) => i64::try_from(i)
                .map(Label::Integer)
                .map_err(|_| Error::LabelOverflow(i)),
            Value::Text(t) => Ok(Label::Text(t)),
            v => Err(Error::InvalidLabelType(value_kind(&v))),
        }
    }
}

impl Serialize for Label {
    fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Label::Integer(i) => s.serialize_i64(*i),
            Label::Text(t) => s.serialize_str(t),
        }
    }
}

/// Value of a header parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Integer(i128),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Array(Vec<HeaderValue>),
    /// Encoded as its integer identifier.
    Algorithm(Algorithm),
}

impl Serialize for HeaderValue {
    fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            HeaderValue::Integer(i) => s.serialize_i128(*i),
            HeaderValue::Text(t) => s.serialize_str(t),
            HeaderValue::Bytes(b) => s.serialize_bytes(b),
            HeaderValue::Bool(b) => s.serialize_bool(*b),
            HeaderValue::Array(items) => items.serialize(s),
            HeaderValue::Algorithm(alg) => s.serialize_i64(alg.value()),
        }
    }
}

impl TryFrom<Value> for HeaderValue {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Integer(i) => HeaderValue::Integer(i),
            Value::Text(t) => HeaderValue::Text(t),
            Value::Bytes(b) => HeaderValue::Bytes(b),
            Value::Bool(b) => HeaderValue::Bool(b),
            Value::Array(items) => HeaderValue::Array(
                items
                    .into_iter()
                    .map(HeaderValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            v => return Err(Error::UnsupportedValue(value_kind(&v).into())),
        })
    }
}

impl From<HeaderValue> for Value {
    fn from(value: HeaderValue) -> Value {
        match value {
            HeaderValue::Integer(i) => Value::Integer(i),
            HeaderValue::Text(t) => Value::Text(t),
            HeaderValue::Bytes(b) => Value::Bytes(b),
            HeaderValue::Bool(b) => Value::Bool(b),
            HeaderValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            HeaderValue::Algorithm(alg) => alg.into(),
        }
    }
}

macro_rules! header_value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for HeaderValue {
                fn from(i: $t) -> Self {
                    HeaderValue::Integer(i.into())
                }
            }
        )*
    };
}

header_value_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<&str> for HeaderValue {
    fn from(t: &str) -> Self {
        HeaderValue::Text(t.into())
    }
}

impl From<String> for HeaderValue {
    fn from(t: String) -> Self {
        HeaderValue::Text(t)
    }
}

impl From<Vec<u8>> for HeaderValue {
    fn from(b: Vec<u8>) -> Self {
        HeaderValue::Bytes(b)
    }
}

impl From<bool> for HeaderValue {
    fn from(b: bool) -> Self {
        HeaderValue::Bool(b)
    }
}

impl From<Vec<HeaderValue>> for HeaderValue {
    fn from(items: Vec<HeaderValue>) -> Self {
        HeaderValue::Array(items)
    }
}

impl From<Label> for HeaderValue {
    fn from(label: Label) -> Self {
        match label {
            Label::Integer(i) => HeaderValue::Integer(i.into()),
            Label::Text(t) => HeaderValue::Text(t),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Integer(_) => "int",
        Value::Float(_) => "float",
        Value::Bytes(_) => "bstr",
        Value::Text(_) => "tstr",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Tag(..) => "tag",
        _ => "unknown",
    }
}

/// A typed COSE header parameter.
pub trait Header: Into<HeaderValue> + TryFrom<HeaderValue, Error = Error> {
    fn label() -> Label;
}

/// COSE headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap(BTreeMap<Label, HeaderValue>);

impl HeaderMap {
    /// Insert a defined header parameter.
    /// Returns an error if the previous value found cannot be parsed
    /// into the expected header structure.
    pub fn insert_header<T: Header>(&mut self, header: T) -> Result<Option<T>, Error> {
        match self.0.insert(T::label(), header.into()) {
            None => Ok(None),
            Some(v) => v.try_into().map(Some),
        }
    }

    /// Retrieve a defined header parameter.
    /// Returns an error if the label is found but the value cannot be parsed
    /// into the expected header structure.
    /// N.B. This method clones the underlying data.
    pub fn get_header<T: Header>(&self) -> Result<Option<T>, Error> {
        match self.0.get(&T::label()) {
            None => Ok(None),
            Some(v) => v.clone().try_into().map(Some),
        }
    }

    /// Remove a defined header parameter.
    /// Returns an error if the removed value cannot be parsed into
    /// the expected header structure.
    pub fn remove_header<T: Header>(&mut self) -> Result<Option<T>, Error> {
        match self.0.remove(&T::label()) {
            None => Ok(None),
            Some(v) => v.try_into().map(Some),
        }
    }

    /// Insert a header with a given label.
    pub fn insert<L: Into<Label>, V: Into<HeaderValue>>(
        &mut self,
        label: L,
        value: V,
    ) -> Option<HeaderValue> {
        self.0.insert(label.into(), value.into())
    }

    /// Insert a header with an integer label.
    pub fn insert_i<L: Into<i64>, V: Into<HeaderValue>>(
        &mut self,
        label: L,
        value: V,
    ) -> Option<HeaderValue> {
        self.0.insert(Label::Integer(label.into()), value.into())
    }

    /// Insert a header with a text label.
    pub fn insert_t<L: Into<String>, V: Into<HeaderValue>>(
        &mut self,
        label: L,
        value: V,
    ) -> Option<HeaderValue> {
        self.0.insert(Label::Text(label.into()), value.into())
    }

    /// Retrieve a header value with a given label.
    pub fn get<L: Into<Label>>(&self, label: L) -> Option<&HeaderValue> {
        self.0.get(&label.into())
    }

    /// Retrieve a header value with an integer label.
    pub fn get_i<L: Into<i64>>(&self, label: L) -> Option<&HeaderValue> {
        self.0.get(&Label::Integer(label.into()))
    }

    /// Retrieve a header value with a text label.
    pub fn get_t<L: Into<String>>(&self, label: L) -> Option<&HeaderValue> {
        self.0.get(&Label::Text(label.into()))
    }

    /// Remove a header value with a given label.
    pub fn remove<L: Into<Label>>(&mut self, label: L) -> Option<HeaderValue> {
        self.0.remove(&label.into())
    }

    /// Remove a header value with an integer label.
    pub fn remove_i<L: Into<i64>>(&mut self, label: L) -> Option<HeaderValue> {
        self.0.remove(&Label::Integer(label.into()))
    }

    /// Remove a header value with a text label.
    pub fn remove_t<L: Into<String>>(&mut self, label: L) -> Option<HeaderValue> {
        self.0.remove(&Label::Text(label.into()))
    }

    /// Encode as a canonical CBOR map.
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        serde_cbor::to_vec(self).map_err(Error::Encoding)
    }

    /// Decode a CBOR map, checking every label before any value is decoded.
    ///
    /// The caller is responsible for checking that `data` starts with a map.
    pub(crate) fn from_map_bytes(data: &[u8]) -> Result<Self, Error> {
        validate_labels(data)?;
        match serde_cbor::from_slice(data).map_err(Error::Decoding)? {
            Value::Map(m) => m
                .into_iter()
                .map(|(k, v)| Ok((Label::try_from(k)?, HeaderValue::try_from(v)?)))
                .collect(),
            v => Err(Error::UnsupportedValue(value_kind(&v).into())),
        }
    }
}

/// Whether `data` starts with a CBOR map (major type 5).
pub(crate) fn is_map(data: &[u8]) -> bool {
    matches!(data.first(), Some(b) if b >> 5 == 5)
}

/// Entries are ordered by their encoded label, shorter encodings first, as required for
/// canonical CBOR ([RFC-7049 Section 3.9](https://datatracker.ietf.org/doc/html/rfc7049#section-3.9)).
impl Serialize for HeaderMap {
    fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut entries = self
            .0
            .iter()
            .map(|(label, value)| {
                serde_cbor::to_vec(label)
                    .map(|key| (key, label, value))
                    .map_err(S::Error::custom)
            })
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by(|(a, _, _), (b, _, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let mut map = s.serialize_map(Some(entries.len()))?;
        for (_, label, value) in entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// A map key as found on the wire, before it is checked against the label rules.
enum ScannedLabel {
    Integer(i128),
    Text(String),
    Other(&'static str),
}

impl<'de> Deserialize<'de> for ScannedLabel {
    fn deserialize<D: de::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(ScannedLabelVisitor)
    }
}

struct ScannedLabelVisitor;

impl<'de> Visitor<'de> for ScannedLabelVisitor {
    type Value = ScannedLabel;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a header label")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Other("bool"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Integer(v.into()))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Integer(v.into()))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
        Ok(i128::try_from(v)
            .map(ScannedLabel::Integer)
            .unwrap_or(ScannedLabel::Other("bignum")))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Other("float"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Text(v.into()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, _: &[u8]) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Other("bstr"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Other("null"))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ScannedLabel::Other("null"))
    }

    fn visit_newtype_struct<D: de::Deserializer<'de>>(
        self,
        d: D,
    ) -> Result<Self::Value, D::Error> {
        IgnoredAny::deserialize(d)?;
        Ok(ScannedLabel::Other("tag"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(ScannedLabel::Other("array"))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(ScannedLabel::Other("map"))
    }
}

/// Labels of a CBOR map, in wire order, with the values skipped.
struct LabelScan(Vec<ScannedLabel>);

impl<'de> Deserialize<'de> for LabelScan {
    fn deserialize<D: de::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_map(LabelScanVisitor)
    }
}

struct LabelScanVisitor;

impl<'de> Visitor<'de> for LabelScanVisitor {
    type Value = LabelScan;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a header map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut labels = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(label) = map.next_key::<ScannedLabel>()? {
            map.next_value::<IgnoredAny>()?;
            labels.push(label);
        }
        Ok(LabelScan(labels))
    }
}

/// Check that every label of the CBOR map in `data` is an integer within the range of
/// `i64` or a text string, and that no label repeats.
fn validate_labels(data: &[u8]) -> Result<(), Error> {
    let LabelScan(labels) = serde_cbor::from_slice(data).map_err(Error::Decoding)?;
    let mut seen = BTreeSet::new();
    for label in labels {
        let label = match label {
            ScannedLabel::Integer(i) => {
                Label::Integer(i64::try_from(i).map_err(|_| Error::LabelOverflow(i))?)
            }
            ScannedLabel::Text(t) => Label::Text(t),
            ScannedLabel::Other(kind) => return Err(Error::InvalidLabelType(kind)),
        };
        if seen.contains(&label) {
            return Err(Error::DuplicateLabel(label));
        }
        seen.insert(label);
    }
    Ok(())
}

impl AsRef<BTreeMap<Label, HeaderValue>> for HeaderMap {
    fn as_ref(&self) -> &BTreeMap<Label, HeaderValue> {
        &self.0
    }
}

impl Deref for HeaderMap {
    type Target = BTreeMap<Label, HeaderValue>;

    fn deref(&self) -> &BTreeMap<Label, HeaderValue> {
        &self.0
    }
}

impl FromIterator<(Label, HeaderValue)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item = (Label, HeaderValue)>>(iter: T) -> Self {
        Self(BTreeMap::from_iter(iter))
    }
}

impl From<BTreeMap<Label, HeaderValue>> for HeaderMap {
    fn from(m: BTreeMap<Label, HeaderValue>) -> Self {
        Self(m)
    }
}

impl IntoIterator for HeaderMap {
    type Item = (Label, HeaderValue);

    type IntoIter = <BTreeMap<Label, HeaderValue> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
