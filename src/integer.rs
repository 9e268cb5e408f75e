//! Integer/octet-string conversion primitives from
//! [RFC-8017 Section 4](https://datatracker.ietf.org/doc/html/rfc8017#section-4).

use num_bigint::{BigInt, Sign};

/// Errors that can occur converting an integer to an octet string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("I2OSP: negative integer")]
    NegativeInteger,
    #[error("I2OSP: integer too large: {required} bytes required, {available} available")]
    IntegerTooLarge { required: usize, available: usize },
}

/// Integer-to-Octet-String primitive: encode the nonnegative integer `x` as exactly
/// `len` big-endian bytes.
pub fn i2osp(x: &BigInt, len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; len];
    i2osp_into(x, &mut buf)?;
    Ok(buf)
}

/// Integer-to-Octet-String primitive writing into `buf`, zero-padded on the left.
///
/// `buf` is left untouched on error.
pub fn i2osp_into(x: &BigInt, buf: &mut [u8]) -> Result<(), Error> {
    match x.sign() {
        Sign::Minus => Err(Error::NegativeInteger),
        Sign::NoSign => {
            buf.fill(0);
            Ok(())
        }
        Sign::Plus => {
            let (_, bytes) = x.to_bytes_be();
            if bytes.len() > buf.len() {
                return Err(Error::IntegerTooLarge {
                    required: bytes.len(),
                    available: buf.len(),
                });
            }
            let offset = buf.len() - bytes.len();
            buf[..offset].fill(0);
            buf[offset..].copy_from_slice(&bytes);
            Ok(())
        }
    }
}

/// Octet-String-to-Integer primitive: interpret `x` as a nonnegative big-endian integer.
pub fn os2ip(x: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, x)
}
