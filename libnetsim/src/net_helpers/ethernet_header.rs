use crate::{NetParser, NetUnparser, ParseError};

use itertools::Itertools;
use rand::random;
use thiserror::Error;

use std::{
    fmt::{self, Display, Formatter},
    slice::Iter,
    str::FromStr,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EthernetAddress(pub [u8; 6]);
pub const ETHERNET_BROADCAST: EthernetAddress = EthernetAddress([0xff; 6]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Malformed MAC address: {0}")]
pub struct MacParseError(String);

impl EthernetAddress {
    pub const LENGTH: usize = 6;
    pub const ZERO: EthernetAddress = EthernetAddress([0; 6]);

    pub fn iter(&self) -> Iter<'_, u8> {
        self.0.iter()
    }

    #[inline(always)]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    #[inline(always)]
    pub fn is_broadcast(&self) -> bool {
        *self == ETHERNET_BROADCAST
    }

    /// Builds an interface MAC: the first three bytes come from the
    /// interface+node name, the rest are random, and the address is marked
    /// locally administered.
    pub fn derive(interface: &str, node: &str) -> Self {
        let mut mac = [0u8; 6];
        let prefix = interface.bytes().chain(node.bytes()).take(3);
        for (slot, byte) in mac.iter_mut().zip(prefix) {
            *slot = byte;
        }
        let suffix: [u8; 3] = random();
        mac[3..].copy_from_slice(&suffix);
        mac[0] |= 0x02;
        mac[0] &= !0x01;
        EthernetAddress(mac)
    }
}

impl FromStr for EthernetAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mac = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for slot in mac.iter_mut() {
            let part = parts.next().ok_or_else(|| MacParseError(s.to_string()))?;
            *slot = u8::from_str_radix(part, 16).map_err(|_| MacParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(MacParseError(s.to_string()));
        }
        Ok(EthernetAddress(mac))
    }
}

/// 802.1Q tag. Only the low 12 bits of the TCI carry the VLAN id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    pub tpid: u16,
    pub tci: u16,
}

impl VlanTag {
    pub const LENGTH: usize = 4;
    pub const TPID_8021Q: u16 = 0x8100;
    pub const VLAN_ID_MASK: u16 = 0x0FFF;

    pub fn new(vlan_id: u16) -> Self {
        Self {
            tpid: Self::TPID_8021Q,
            tci: vlan_id & Self::VLAN_ID_MASK,
        }
    }

    #[inline(always)]
    pub fn vlan_id(&self) -> u16 {
        self.tci & Self::VLAN_ID_MASK
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: EthernetAddress,
    pub src: EthernetAddress,
    pub vlan: Option<VlanTag>,
    pub ty: u16,
}

impl Default for EthernetHeader {
    fn default() -> Self {
        Self {
            dst: EthernetAddress::ZERO,
            src: EthernetAddress::ZERO,
            vlan: None,
            ty: Self::TYPE_IPV4,
        }
    }
}

impl EthernetHeader {
    pub const LENGTH: usize = 14;
    pub const TAGGED_LENGTH: usize = Self::LENGTH + VlanTag::LENGTH;
    pub const TYPE_IPV4: u16 = 0x0800;
    pub const TYPE_ARP: u16 = 0x0806;

    pub fn new(dst: EthernetAddress, src: EthernetAddress, ty: u16) -> Self {
        Self {
            dst,
            src,
            vlan: None,
            ty,
        }
    }

    /// A header counts as tagged when the field after the source MAC holds
    /// the 802.1Q TPID; anything else is read as the EtherType.
    pub fn parse(&mut self, p: &mut NetParser) -> Result<(), ParseError> {
        if p.buffer().len() < Self::LENGTH {
            return Err(ParseError::PacketTooShort);
        }
        self.dst = EthernetAddress(p.parse_bytes());
        self.src = EthernetAddress(p.parse_bytes());
        self.vlan = match p.peek_u16() {
            Some(VlanTag::TPID_8021Q) => {
                let tpid = p.parse_u16();
                let tci = p.parse_u16();
                Some(VlanTag { tpid, tci })
            }
            _ => None,
        };
        self.ty = p.parse_u16();
        p.get_result()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut ser = Vec::with_capacity(self.length());
        NetUnparser::bytes(&mut ser, &self.dst.0);
        NetUnparser::bytes(&mut ser, &self.src.0);
        if let Some(tag) = self.vlan {
            NetUnparser::u16(&mut ser, tag.tpid);
            NetUnparser::u16(&mut ser, tag.tci);
        }
        NetUnparser::u16(&mut ser, self.ty);
        ser
    }

    #[inline(always)]
    pub fn length(&self) -> usize {
        match self.vlan {
            Some(_) => Self::TAGGED_LENGTH,
            None => Self::LENGTH,
        }
    }

    #[inline(always)]
    pub fn vlan_id(&self) -> Option<u16> {
        self.vlan.map(|tag| tag.vlan_id())
    }
}

impl Display for EthernetAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.iter()
                .format_with(":", |b, f| { f(&format_args!("{:02x}", b)) })
        )
    }
}

impl Display for EthernetHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dst={}, src={}, ", self.dst, self.src)?;
        if let Some(vlan) = self.vlan_id() {
            write!(f, "vlan={}, ", vlan)?;
        }
        write!(
            f,
            "type={}",
            match self.ty {
                Self::TYPE_IPV4 => "IPV4",
                Self::TYPE_ARP => "ARP",
                _ => return write!(f, "[unknown type {:#06x}!]", self.ty),
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Buffer;

    fn mac(last: u8) -> EthernetAddress {
        EthernetAddress([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn untagged_layout() {
        let hdr = EthernetHeader::new(ETHERNET_BROADCAST, mac(1), EthernetHeader::TYPE_ARP);
        let bytes = hdr.serialize();
        assert_eq!(bytes.len(), EthernetHeader::LENGTH);
        assert_eq!(&bytes[12..14], &[0x08, 0x06]);

        let mut parsed = EthernetHeader::default();
        parsed.parse(&mut NetParser::new(Buffer::from(bytes))).unwrap();
        assert_eq!(parsed, hdr);
        assert_eq!(parsed.vlan_id(), None);
    }

    #[test]
    fn tagged_layout_puts_tag_between_macs_and_type() {
        let mut hdr = EthernetHeader::new(mac(2), mac(1), EthernetHeader::TYPE_IPV4);
        hdr.vlan = Some(VlanTag::new(10));
        let bytes = hdr.serialize();
        assert_eq!(bytes.len(), EthernetHeader::TAGGED_LENGTH);
        assert_eq!(&bytes[12..18], &[0x81, 0x00, 0x00, 0x0a, 0x08, 0x00]);

        let mut parsed = EthernetHeader::default();
        parsed.parse(&mut NetParser::new(Buffer::from(bytes))).unwrap();
        assert_eq!(parsed.vlan_id(), Some(10));
        assert_eq!(parsed.ty, EthernetHeader::TYPE_IPV4);
    }

    #[test]
    fn vlan_id_uses_low_twelve_bits() {
        let tag = VlanTag {
            tpid: VlanTag::TPID_8021Q,
            tci: 0xE00B,
        };
        assert_eq!(tag.vlan_id(), 11);
        assert_eq!(VlanTag::new(4095).tci, 0x0FFF);
    }

    #[test]
    fn mac_display_and_parse() {
        let m: EthernetAddress = "02:1a:ff:00:0b:c0".parse().unwrap();
        assert_eq!(m.to_string(), "02:1a:ff:00:0b:c0");
        assert!("02:1a:ff:00:0b".parse::<EthernetAddress>().is_err());
        assert!(ETHERNET_BROADCAST.is_broadcast());
    }

    #[test]
    fn derived_mac_is_local_unicast_with_name_prefix() {
        let m = EthernetAddress::derive("eth0/1", "R1");
        assert_eq!(m.0[0] & 0x03, 0x02);
        assert_eq!(&m.0[1..3], b"th");
    }
}
