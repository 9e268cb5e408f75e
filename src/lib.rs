//! Cbor Object Signing and Encryption (COSE) headers and ECDSA signatures
//!
//! Protected and unprotected header buckets as specified in
//! [RFC-8152](https://www.rfc-editor.org/info/rfc8152), the signing algorithm registry, and
//! conversion of ECDSA signatures between the fixed-width COSE form and ASN.1 DER. Signing
//! back-ends are abstracted with RustCrypto's `signature` crate.

/// COSE algorithms.
#[allow(non_upper_case_globals)]
pub mod algorithm;
pub mod ecdsa;
pub mod header_map;
pub mod headers;
pub mod integer;
pub mod protected;
pub mod signer;
pub mod unprotected;

pub use algorithm::{Algorithm, SignatureAlgorithm};
pub use header_map::{HeaderMap, HeaderValue, Label};
pub use headers::{Bucket, Headers};
pub use protected::ProtectedHeader;
pub use signer::{Signer, Verifier};
pub use unprotected::UnprotectedHeader;
