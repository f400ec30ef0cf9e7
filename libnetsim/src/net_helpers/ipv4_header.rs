use std::fmt::{self, Display};
use std::net::Ipv4Addr;

use crate::{ipv4_from_field, ipv4_to_field, NetParser, NetUnparser, ParseError, IP_FIELD_LENGTH};

/// IPv4 header with 16-byte address fields. The fixed part is 44 bytes, so
/// the header length field (in 32-bit words) is at least 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IPv4Header {
    pub ver: u8,
    pub hlen: u8,
    pub tos: u8,
    pub len: u16,
    pub id: u16,
    pub df: bool,
    pub mf: bool,
    pub offset: u16,
    pub ttl: u8,
    pub proto: u8,
    pub cksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl IPv4Header {
    pub const LENGTH: usize = 12 + 2 * IP_FIELD_LENGTH;
    pub const DEFAULT_TTL: u8 = 64;
    pub const PROTO_ICMP: u8 = 1;
    pub const PROTO_IPIP: u8 = 4;
}

impl Default for IPv4Header {
    fn default() -> Self {
        Self {
            ver: 4,
            hlen: (Self::LENGTH / 4) as u8,
            tos: 0,
            len: Self::LENGTH as u16,
            id: 0,
            df: false,
            mf: false,
            offset: 0,
            ttl: Self::DEFAULT_TTL,
            proto: Self::PROTO_ICMP,
            cksum: 0,
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl IPv4Header {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, proto: u8, payload_length: usize) -> Self {
        Self {
            src,
            dst,
            proto,
            len: (Self::LENGTH + payload_length) as u16,
            ..Default::default()
        }
    }

    /// Reads the header and skips any options. The checksum is carried
    /// through but not verified.
    pub fn parse(&mut self, p: &mut NetParser) -> Result<(), ParseError> {
        let available = p.buffer().len();
        if available < Self::LENGTH {
            return Err(ParseError::PacketTooShort);
        }

        let first_byte = p.parse_u8();
        self.ver = first_byte >> 4;
        if self.ver != 4 {
            return Err(ParseError::WrongIPVersion);
        }

        self.hlen = first_byte & 0x0f;
        if (self.hlen as usize) * 4 < Self::LENGTH {
            return Err(ParseError::HeaderTooShort);
        }
        self.tos = p.parse_u8();
        self.len = p.parse_u16();
        if (self.len as usize) < self.header_length() {
            return Err(ParseError::HeaderTooShort);
        }
        if self.len as usize > available {
            return Err(ParseError::TruncatedPacket);
        }
        self.id = p.parse_u16();
        let fo_val = p.parse_u16();
        self.df = (fo_val & 0x4000) != 0;
        self.mf = (fo_val & 0x2000) != 0;
        self.offset = fo_val & 0x1fff;
        self.ttl = p.parse_u8();
        self.proto = p.parse_u8();
        self.cksum = p.parse_u16();
        self.src = ipv4_from_field(&p.parse_bytes());
        self.dst = ipv4_from_field(&p.parse_bytes());

        p.remove_prefix(self.header_length() - Self::LENGTH);
        p.get_result()
    }

    /// Serializes as-is; the checksum is whatever `cksum` holds.
    pub fn try_serialize(&self) -> Result<Vec<u8>, ParseError> {
        if self.ver != 4 {
            return Err(ParseError::WrongIPVersion);
        }
        if self.header_length() < Self::LENGTH {
            return Err(ParseError::HeaderTooShort);
        }

        let mut ret = Vec::with_capacity(self.header_length());
        NetUnparser::u8(&mut ret, (self.ver << 4) | (self.hlen & 0x0f));
        NetUnparser::u8(&mut ret, self.tos);
        NetUnparser::u16(&mut ret, self.len);
        NetUnparser::u16(&mut ret, self.id);

        let fo_val =
            (if self.df { 0x4000 } else { 0 }) | (if self.mf { 0x2000 } else { 0 }) | (self.offset & 0x1fff);
        NetUnparser::u16(&mut ret, fo_val);

        NetUnparser::u8(&mut ret, self.ttl);
        NetUnparser::u8(&mut ret, self.proto);
        NetUnparser::u16(&mut ret, self.cksum);
        NetUnparser::bytes(&mut ret, &ipv4_to_field(self.src));
        NetUnparser::bytes(&mut ret, &ipv4_to_field(self.dst));

        ret.resize(self.header_length(), 0);
        Ok(ret)
    }

    #[inline(always)]
    pub fn header_length(&self) -> usize {
        4 * self.hlen as usize
    }

    #[inline(always)]
    pub fn payload_length(&self) -> usize {
        (self.len as usize).saturating_sub(self.header_length())
    }
}

impl Display for IPv4Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv{}, len={}, protocol={}, {}src={}, dst={}",
            self.ver,
            self.len,
            self.proto,
            if self.ttl >= 10 {
                String::new()
            } else {
                format!("ttl={}, ", self.ttl)
            },
            self.src,
            self.dst
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Buffer;

    fn header() -> IPv4Header {
        IPv4Header::new(
            Ipv4Addr::new(122, 1, 1, 1),
            Ipv4Addr::new(11, 1, 1, 1),
            IPv4Header::PROTO_ICMP,
            0,
        )
    }

    #[test]
    fn fixed_layout() {
        let bytes = header().try_serialize().unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(bytes[0], 0x4b);
        assert_eq!(&bytes[2..4], &[0, 44]);
        assert_eq!(bytes[8], 64);
        assert_eq!(bytes[9], 1);
        assert_eq!(&bytes[24..28], &[122, 1, 1, 1]);
        assert_eq!(&bytes[40..44], &[11, 1, 1, 1]);
    }

    #[test]
    fn parse_reads_back_fields() {
        let mut h = header();
        h.df = true;
        h.ttl = 3;
        let mut parsed = IPv4Header::default();
        let mut p = NetParser::new(Buffer::from(h.try_serialize().unwrap()));
        parsed.parse(&mut p).unwrap();
        assert_eq!(parsed, h);
        assert!(p.buffer().is_empty());
    }

    #[test]
    fn options_are_skipped() {
        let mut h = header();
        h.hlen += 1;
        h.len += 4;
        let mut bytes = h.try_serialize().unwrap();
        assert_eq!(bytes.len(), 48);
        bytes.extend_from_slice(&[7, 7]);
        h.len += 2;
        bytes[2..4].copy_from_slice(&h.len.to_be_bytes());

        let mut parsed = IPv4Header::default();
        let mut p = NetParser::new(Buffer::from(bytes));
        parsed.parse(&mut p).unwrap();
        assert_eq!(p.buffer().as_ref(), &[7, 7]);
        assert_eq!(parsed.payload_length(), 2);
    }

    #[test]
    fn rejects_bad_version_and_truncation() {
        let mut bytes = header().try_serialize().unwrap();
        bytes[0] = 0x6b;
        let mut parsed = IPv4Header::default();
        assert_eq!(
            parsed.parse(&mut NetParser::new(Buffer::from(bytes.clone()))),
            Err(ParseError::WrongIPVersion)
        );

        bytes[0] = 0x4b;
        bytes[2..4].copy_from_slice(&100u16.to_be_bytes());
        assert_eq!(
            parsed.parse(&mut NetParser::new(Buffer::from(bytes))),
            Err(ParseError::TruncatedPacket)
        );
    }
}
