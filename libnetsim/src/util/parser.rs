use crate::util::buffer::Buffer;

use thiserror::Error;

use std::ops::{BitAnd, Shr};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Not enough data to finish parsing")]
    PacketTooShort,
    #[error("Got a version of IP other than 4")]
    WrongIPVersion,
    #[error("Header length is shorter than minimum required")]
    HeaderTooShort,
    #[error("Packet length is shorter than header claims")]
    TruncatedPacket,
    #[error("Packet uses unsupported features")]
    Unsupported,
    #[error("Payload size mismatch")]
    PayloadSizeMismatch,
    #[error("Serialized size exceeds the {0}-byte buffer")]
    Oversized(usize),
}

pub struct NetParser {
    buffer: Buffer,
    result: Result<(), ParseError>,
}

pub trait UnsignedInt:
    From<u8>
    + Copy
    + Shr<usize, Output = Self>
    + BitAnd<Self, Output = Self>
    + PartialEq
    + Sized
{
    const BYTE_MASK: Self;

    fn to_u8(self) -> u8;

    /// Builds the value from exactly `size_of::<Self>()` big-endian bytes.
    fn from_be_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_unsigned_int {
    ($($t:ty),*) => {
        $(
            impl UnsignedInt for $t {
                const BYTE_MASK: Self = 0xFF;

                fn to_u8(self) -> u8 {
                    (self & Self::BYTE_MASK) as u8
                }

                fn from_be_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    <$t>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_unsigned_int!(u8, u16, u32);

impl NetParser {
    fn check_size(&mut self, size: usize) {
        if size > self.buffer.len() {
            self.set_result(Err(ParseError::PacketTooShort));
        }
    }

    fn parse_int<T: UnsignedInt>(&mut self) -> T {
        let len = std::mem::size_of::<T>();
        self.check_size(len);

        if self.is_err() {
            return T::from(0);
        }

        let ret = T::from_be_slice(&self.buffer.as_ref()[..len]);
        self.remove_prefix(len);
        ret
    }

    pub fn new(buffer: Buffer) -> Self {
        NetParser {
            buffer,
            result: Ok(()),
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn get_result(&self) -> Result<(), ParseError> {
        self.result
    }

    pub fn set_result(&mut self, result: Result<(), ParseError>) {
        self.result = result;
    }

    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }

    pub fn parse_u32(&mut self) -> u32 {
        self.parse_int()
    }

    pub fn parse_u16(&mut self) -> u16 {
        self.parse_int()
    }

    pub fn parse_u8(&mut self) -> u8 {
        self.parse_int()
    }

    /// Reads a fixed-width byte field such as a MAC or a 16-byte address.
    pub fn parse_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut ret = [0u8; N];
        self.check_size(N);
        if self.is_err() {
            return ret;
        }
        ret.copy_from_slice(&self.buffer.as_ref()[..N]);
        self.remove_prefix(N);
        ret
    }

    /// Looks at the next big-endian `u16` without consuming it.
    pub fn peek_u16(&self) -> Option<u16> {
        match (self.buffer.try_at(0), self.buffer.try_at(1)) {
            (Some(hi), Some(lo)) => Some(u16::from_be_bytes([hi, lo])),
            _ => None,
        }
    }

    pub fn remove_prefix(&mut self, n: usize) {
        self.check_size(n);
        if self.is_err() {
            return;
        }
        if self.buffer.try_remove_prefix(n).is_err() {
            self.set_result(Err(ParseError::PacketTooShort));
        }
    }
}

pub struct NetUnparser;

impl NetUnparser {
    #[inline(always)]
    pub fn unparse_int<T: UnsignedInt>(s: &mut Vec<u8>, val: T) {
        let len = std::mem::size_of::<T>();
        for i in 0..len {
            let shift_amount = (len - i - 1) * 8;
            let the_byte: u8 = (val >> shift_amount).to_u8();
            s.push(the_byte);
        }
    }

    #[inline(always)]
    pub fn u32(s: &mut Vec<u8>, val: u32) {
        Self::unparse_int(s, val);
    }

    #[inline(always)]
    pub fn u16(s: &mut Vec<u8>, val: u16) {
        Self::unparse_int(s, val);
    }

    #[inline(always)]
    pub fn u8(s: &mut Vec<u8>, val: u8) {
        Self::unparse_int(s, val);
    }

    #[inline(always)]
    pub fn bytes(s: &mut Vec<u8>, val: &[u8]) {
        s.extend_from_slice(val);
    }
}
