//! Binary codec used for account and instruction data.
//!
//! The encoding follows Borsh conventions, which is what the program uses:
//! fixed-width little-endian integers, one-byte booleans, a `0`/`1` presence
//! byte in front of optional values and a 4-byte little-endian length in front
//! of vectors and strings.
//!
//! Values are encoded by appending to a `Vec<u8>` so writing never fails.  The
//! size of the output can be computed up front with [`Codec::byte_size`] which
//! depends on the value (an absent optional field takes one byte, a present
//! one takes one byte plus its payload).  Decoding goes through a [`Reader`]
//! which tracks the offset into the buffer and fails with
//! [`Error::BufferUnderrun`] rather than reading past its end.

use solana_program::pubkey::Pubkey;

use crate::{Error, Result};


/// Read cursor over a byte buffer.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Returns offset of the next byte to read, i.e. number of bytes consumed
    /// so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns number of bytes left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consumes `len` bytes and returns them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .buf
            .get(self.offset..)
            .and_then(|rest| rest.get(..len))
            .ok_or(Error::BufferUnderrun {
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            })?;
        self.offset += len;
        Ok(bytes)
    }

    /// Consumes `N` bytes and returns them as an array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    /// Consumes a single byte.
    pub fn byte(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }
}


/// A value with a binary representation.
///
/// `decode` must be the exact inverse of `encode`: decoding the output of
/// `encode` yields an equal value and consumes exactly `byte_size` bytes.
pub trait Codec: Sized {
    /// Returns number of bytes `encode` writes for this value.
    fn byte_size(&self) -> usize;

    /// Appends encoded value to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decodes value advancing the reader.
    fn decode(rd: &mut Reader<'_>) -> Result<Self>;
}

/// Encodes value into a freshly allocated, exactly sized vector.
pub fn to_vec<T: Codec>(value: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.byte_size());
    value.encode(&mut out);
    out
}

/// Decodes value from the front of the buffer.
///
/// Returns the value and the offset just past it so that callers can locate
/// any data which follows.
pub fn from_slice<T: Codec>(buf: &[u8]) -> Result<(T, usize)> {
    let mut rd = Reader::new(buf);
    let value = T::decode(&mut rd)?;
    Ok((value, rd.offset()))
}

/// Decodes value which must span the entire buffer.
pub fn from_slice_exact<T: Codec>(buf: &[u8]) -> Result<T> {
    let (value, consumed) = from_slice(buf)?;
    if consumed == buf.len() {
        Ok(value)
    } else {
        Err(Error::TrailingBytes { consumed, len: buf.len() })
    }
}


macro_rules! impl_int {
    ($($ty:ty),*) => {$(
        impl Codec for $ty {
            fn byte_size(&self) -> usize {
                core::mem::size_of::<$ty>()
            }

            fn encode(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes())
            }

            fn decode(rd: &mut Reader<'_>) -> Result<Self> {
                rd.array().map(<$ty>::from_le_bytes)
            }
        }
    )*}
}

impl_int!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Codec for bool {
    fn byte_size(&self) -> usize {
        1
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self))
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        let offset = rd.offset();
        match rd.byte()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(Error::InvalidBool { offset, value }),
        }
    }
}

impl<const N: usize> Codec for [u8; N] {
    fn byte_size(&self) -> usize {
        N
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self)
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        rd.array()
    }
}

impl Codec for Pubkey {
    fn byte_size(&self) -> usize {
        32
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_ref())
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        rd.array().map(Pubkey::new_from_array)
    }
}


/// Encodes an optional value: a `0` byte for `None`, a `1` byte followed by
/// the payload for `Some`.
pub fn encode_option<T>(
    value: Option<&T>,
    out: &mut Vec<u8>,
    encode: impl FnOnce(&T, &mut Vec<u8>),
) {
    match value {
        None => out.push(0),
        Some(value) => {
            out.push(1);
            encode(value, out);
        }
    }
}

/// Decodes an optional value.  The payload is decoded with `decode` only if
/// the presence byte is `1`; any value other than `0` or `1` is an error.
pub fn decode_option<'a, T>(
    rd: &mut Reader<'a>,
    decode: impl FnOnce(&mut Reader<'a>) -> Result<T>,
) -> Result<Option<T>> {
    let offset = rd.offset();
    match rd.byte()? {
        0 => Ok(None),
        1 => decode(rd).map(Some),
        tag => Err(Error::MalformedOptionTag { offset, tag }),
    }
}

impl<T: Codec> Codec for Option<T> {
    fn byte_size(&self) -> usize {
        1 + self.as_ref().map_or(0, T::byte_size)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        encode_option(self.as_ref(), out, T::encode)
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        decode_option(rd, T::decode)
    }
}


/// Decodes a 4-byte length prefix.
pub(crate) fn decode_len(rd: &mut Reader<'_>) -> Result<usize> {
    // A length which does not fit usize cannot be backed by the buffer
    // anyway so report it as underrun.
    let offset = rd.offset();
    let len = u32::decode(rd)?;
    usize::try_from(len).map_err(|_| Error::BufferUnderrun {
        offset,
        needed: usize::MAX,
        available: rd.remaining(),
    })
}

impl<T: Codec> Codec for Vec<T> {
    fn byte_size(&self) -> usize {
        4 + self.iter().map(T::byte_size).sum::<usize>()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u32).encode(out);
        for item in self {
            item.encode(out);
        }
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        let len = decode_len(rd)?;
        // The prefix is untrusted; don’t let it size the allocation beyond
        // what the buffer could possibly hold.
        let mut vec = Vec::with_capacity(len.min(rd.remaining()));
        for _ in 0..len {
            vec.push(T::decode(rd)?);
        }
        Ok(vec)
    }
}

impl Codec for String {
    fn byte_size(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u32).encode(out);
        out.extend_from_slice(self.as_bytes());
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        let len = decode_len(rd)?;
        let offset = rd.offset();
        let bytes = rd.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::InvalidUtf8 { offset })
    }
}


/// Implements [`Codec`] for a struct by encoding its fields one after another
/// in the listed order.
///
/// The struct’s size is the sum of its fields’ sizes so structs with optional
/// or otherwise variable-length fields compose naturally.  The fields must be
/// listed in wire order which is not necessarily the declaration order.
macro_rules! composite {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::codec::Codec for $ty {
            fn byte_size(&self) -> usize {
                0 $(+ $crate::codec::Codec::byte_size(&self.$field))*
            }

            #[allow(unused_variables)]
            fn encode(&self, out: &mut Vec<u8>) {
                $($crate::codec::Codec::encode(&self.$field, out);)*
            }

            #[allow(unused_variables)]
            fn decode(
                rd: &mut $crate::codec::Reader<'_>,
            ) -> $crate::Result<Self> {
                Ok(Self {
                    $($field: $crate::codec::Codec::decode(rd)?,)*
                })
            }
        }
    };
}

pub(crate) use composite;


#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample {
        flag: bool,
        amount: u64,
        owner: Option<Pubkey>,
        delta: i16,
    }

    composite!(Sample { flag, amount, owner, delta });

    #[test]
    fn test_integers_are_little_endian() {
        assert_eq!(vec![0x34u8, 0x12], to_vec(&0x1234u16));
        assert_eq!(vec![0xffu8; 8], to_vec(&-1i64));
        assert_eq!(
            (0x0403_0201u32, 4),
            from_slice::<u32>(&[1, 2, 3, 4, 5]).unwrap()
        );
    }

    #[test]
    fn test_underrun() {
        let mut rd = Reader::new(&[1, 2, 3]);
        assert_eq!(1, rd.byte().unwrap());
        match u32::decode(&mut rd) {
            Err(Error::BufferUnderrun { offset, needed, available }) => {
                assert_eq!((1, 4, 2), (offset, needed, available));
            }
            res => panic!("unexpected result: {res:?}"),
        }
        // Failed read does not advance the cursor.
        assert_eq!(1, rd.offset());
    }

    #[test]
    fn test_option() {
        assert_eq!(vec![0u8], to_vec(&None::<u16>));
        assert_eq!(vec![1u8, 7, 0], to_vec(&Some(7u16)));
        assert_eq!(1, None::<u64>.byte_size());
        assert_eq!(9, Some(0u64).byte_size());

        assert_eq!((Some(7u16), 3), from_slice(&[1, 7, 0]).unwrap());
        assert_eq!((None::<u16>, 1), from_slice(&[0, 7, 0]).unwrap());
        match from_slice::<Option<u16>>(&[2, 7, 0]) {
            Err(Error::MalformedOptionTag { offset: 0, tag: 2 }) => (),
            res => panic!("unexpected result: {res:?}"),
        }
    }

    #[test]
    fn test_bool() {
        assert_eq!((true, 1), from_slice(&[1]).unwrap());
        assert!(matches!(
            from_slice::<bool>(&[3]),
            Err(Error::InvalidBool { offset: 0, value: 3 })
        ));
    }

    #[test]
    fn test_vec_and_string() {
        let value = vec![String::from("ab"), String::new()];
        let bytes = to_vec(&value);
        assert_eq!(
            vec![2u8, 0, 0, 0, 2, 0, 0, 0, b'a', b'b', 0, 0, 0, 0],
            bytes
        );
        assert_eq!(value, from_slice_exact::<Vec<String>>(&bytes).unwrap());

        // Length prefix claiming more than there is.
        assert!(matches!(
            from_slice::<Vec<u8>>(&[0xff, 0xff, 0xff, 0xff, 1]),
            Err(Error::BufferUnderrun { .. })
        ));
        assert!(matches!(
            from_slice::<String>(&[1, 0, 0, 0, 0xff]),
            Err(Error::InvalidUtf8 { offset: 4 })
        ));
    }

    #[test]
    fn test_composite() {
        let owner = Pubkey::new_unique();
        let sample =
            Sample { flag: true, amount: 5, owner: Some(owner), delta: -2 };
        let bytes = to_vec(&sample);
        assert_eq!(1 + 8 + 33 + 2, sample.byte_size());
        assert_eq!(sample.byte_size(), bytes.len());
        assert_eq!(&[1u8, 5, 0, 0, 0, 0, 0, 0, 0, 1][..], &bytes[..10]);
        assert_eq!(owner.as_ref(), &bytes[10..42]);
        assert_eq!(&[0xfeu8, 0xff][..], &bytes[42..]);

        let (decoded, offset) = from_slice::<Sample>(&bytes).unwrap();
        assert_eq!((sample, bytes.len()), (decoded, offset));

        let absent = Sample { flag: false, amount: 0, owner: None, delta: 0 };
        assert_eq!(12, absent.byte_size());
    }

    #[test]
    fn test_trailing_bytes() {
        assert!(matches!(
            from_slice_exact::<u16>(&[1, 2, 3]),
            Err(Error::TrailingBytes { consumed: 2, len: 3 })
        ));
    }
}
