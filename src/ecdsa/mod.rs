//! ECDSA signature encoding, as specified in
//! [RFC-8152 Section 8.1](https://datatracker.ietf.org/doc/html/rfc8152#section-8.1).
//!
//! COSE carries an ECDSA signature as the fixed-width concatenation `r || s`, each half
//! being the size of the curve's field. Generic signing back-ends usually produce the
//! ASN.1 DER `Ecdsa-Sig-Value` instead, so both directions are provided here.
use crate::integer::{self, i2osp_into, os2ip};
use der::{asn1::UintRef, Decode, Sequence};
use num_bigint::{BigInt, Sign};

pub mod signer;

pub use signer::{Asn1Signer, EcdsaCryptoSigner, EcdsaCurve, EcdsaKeySigner, EcdsaVerifier};

/// Errors that can occur converting ECDSA signatures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid signature length: {0}")]
    InvalidLength(usize),
    #[error("ecdsa: invalid signature: invalid ASN.1 encoding: {0}")]
    InvalidAsn1(der::Error),
    #[error("unable to encode signature component: {0}")]
    Integer(#[from] integer::Error),
}

/// `Ecdsa-Sig-Value` from [RFC-3279](https://datatracker.ietf.org/doc/html/rfc3279#section-2.2.3).
///
/// ```text
/// Ecdsa-Sig-Value ::= SEQUENCE {
///     r     INTEGER,
///     s     INTEGER
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct EcdsaSigValue<'a> {
    r: UintRef<'a>,
    s: UintRef<'a>,
}

/// Length in bytes of each signature component for a curve of `curve_bits` bits.
pub fn component_len(curve_bits: usize) -> usize {
    (curve_bits + 7) / 8
}

/// Encode `(r, s)` as the fixed-width `r || s` signature for a curve of `curve_bits` bits.
pub fn encode_signature(curve_bits: usize, r: &BigInt, s: &BigInt) -> Result<Vec<u8>, Error> {
    let n = component_len(curve_bits);
    let mut sig = vec![0u8; n * 2];
    let (r_buf, s_buf) = sig.split_at_mut(n);
    i2osp_into(r, r_buf)?;
    i2osp_into(s, s_buf)?;
    Ok(sig)
}

/// Decode `(r, s)` from a fixed-width `r || s` signature for a curve of `curve_bits` bits.
pub fn decode_signature(curve_bits: usize, sig: &[u8]) -> Result<(BigInt, BigInt), Error> {
    let n = component_len(curve_bits);
    if sig.len() != n * 2 {
        return Err(Error::InvalidLength(sig.len()));
    }
    let (r, s) = sig.split_at(n);
    Ok((os2ip(r), os2ip(s)))
}

/// Decode `(r, s)` from a DER encoded `Ecdsa-Sig-Value`.
///
/// Exactly two nonnegative INTEGERs are accepted, with no data following the SEQUENCE.
pub fn decode_asn1_signature(der: &[u8]) -> Result<(BigInt, BigInt), Error> {
    let value = EcdsaSigValue::from_der(der).map_err(Error::InvalidAsn1)?;
    Ok((
        BigInt::from_bytes_be(Sign::Plus, value.r.as_bytes()),
        BigInt::from_bytes_be(Sign::Plus, value.s.as_bytes()),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    fn asn1(hex: &str) -> Vec<u8> {
        hex::decode(hex).expect("invalid test vector")
    }

    #[test]
    fn component_lengths() {
        assert_eq!(component_len(256), 32);
        assert_eq!(component_len(384), 48);
        assert_eq!(component_len(521), 66);
        assert_eq!(component_len(0), 0);
    }

    #[test]
    fn signature_roundtrip() {
        for curve_bits in [256usize, 384, 521] {
            let n = component_len(curve_bits);
            let max: BigInt = (BigInt::from(1) << (8 * n)) - 1;
            let cases = vec![
                (BigInt::from(1), BigInt::from(2)),
                (BigInt::from(0), max.clone()),
                (max.clone(), BigInt::from(0x0102_0304)),
            ];
            for (r, s) in cases {
                let sig = encode_signature(curve_bits, &r, &s).unwrap();
                assert_eq!(sig.len(), 2 * n);
                let (r2, s2) = decode_signature(curve_bits, &sig).unwrap();
                assert_eq!((r2, s2), (r, s), "curve bits: {}", curve_bits);
            }
        }
    }

    #[test]
    fn signature_layout_is_big_endian_and_padded() {
        let sig = encode_signature(256, &BigInt::from(1), &BigInt::from(0x0203)).unwrap();
        let mut expected = vec![0u8; 64];
        expected[31] = 0x01;
        expected[62] = 0x02;
        expected[63] = 0x03;
        assert_eq!(sig, expected);
    }

    #[test]
    fn encode_rejects_out_of_range_components() {
        let too_large = BigInt::from(1) << 256;
        assert!(matches!(
            encode_signature(256, &too_large, &BigInt::from(1)),
            Err(Error::Integer(integer::Error::IntegerTooLarge { .. }))
        ));
        assert!(matches!(
            encode_signature(256, &BigInt::from(1), &BigInt::from(-1)),
            Err(Error::Integer(integer::Error::NegativeInteger))
        ));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        for len in [0usize, 63, 65, 96] {
            let sig = vec![1u8; len];
            assert!(
                matches!(decode_signature(256, &sig), Err(Error::InvalidLength(l)) if l == len),
                "length: {}",
                len
            );
        }
    }

    #[test]
    fn asn1_signature() {
        let (r, s) = decode_asn1_signature(&asn1("3006020101020102")).unwrap();
        assert_eq!(r, BigInt::from(1));
        assert_eq!(s, BigInt::from(2));

        // High bit set in the first content byte requires a leading zero.
        let (r, s) = decode_asn1_signature(&asn1("300702020080020100")).unwrap();
        assert_eq!(r, BigInt::from(0x80));
        assert_eq!(s, BigInt::from(0));
    }

    #[test]
    fn asn1_signature_rejects_malformed() {
        let cases = vec![
            ("three integers", "3009020101020102020103"),
            ("one integer", "3003020101"),
            ("trailing garbage", "300602010102010200"),
            ("set instead of sequence", "3106020101020102"),
            ("octet string member", "3006040101020102"),
            ("truncated", "30060201010201"),
            ("empty", ""),
        ];
        for (case, der) in cases {
            assert!(
                matches!(
                    decode_asn1_signature(&asn1(der)),
                    Err(Error::InvalidAsn1(_))
                ),
                "case: {}",
                case
            );
        }
    }
}
