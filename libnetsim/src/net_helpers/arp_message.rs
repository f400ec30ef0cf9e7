use crate::{
    ipv4_from_field, ipv4_to_field, Buffer, EthernetAddress, EthernetHeader, NetParser,
    NetUnparser, ParseError, IP_FIELD_LENGTH,
};

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

/// ARP message with 16-byte protocol address fields (52 bytes on the wire).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpMessage {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_address_size: u8,
    pub protocol_address_size: u8,
    pub opcode: u16,
    pub sender_ethernet_address: EthernetAddress,
    pub sender_ip_address: Ipv4Addr,
    pub target_ethernet_address: EthernetAddress,
    pub target_ip_address: Ipv4Addr,
}

impl Default for ArpMessage {
    fn default() -> Self {
        Self {
            hardware_type: Self::TYPE_ETHERNET,
            protocol_type: EthernetHeader::TYPE_IPV4,
            hardware_address_size: EthernetAddress::LENGTH as u8,
            protocol_address_size: 4,
            opcode: 0,
            sender_ethernet_address: EthernetAddress::ZERO,
            sender_ip_address: Ipv4Addr::UNSPECIFIED,
            target_ethernet_address: EthernetAddress::ZERO,
            target_ip_address: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl ArpMessage {
    pub const LENGTH: usize = 8 + 2 * (EthernetAddress::LENGTH + IP_FIELD_LENGTH);
    pub const TYPE_ETHERNET: u16 = 1;
    pub const OPCODE_REQUEST: u16 = 1;
    pub const OPCODE_REPLY: u16 = 2;

    /// Broadcast query for `target_ip`, target MAC left unset.
    pub fn request(sender_mac: EthernetAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            opcode: Self::OPCODE_REQUEST,
            sender_ethernet_address: sender_mac,
            sender_ip_address: sender_ip,
            target_ip_address: target_ip,
            ..Default::default()
        }
    }

    /// Answer to `request`, sender and target swapped.
    pub fn reply_to(request: &ArpMessage, own_mac: EthernetAddress, own_ip: Ipv4Addr) -> Self {
        Self {
            opcode: Self::OPCODE_REPLY,
            sender_ethernet_address: own_mac,
            sender_ip_address: own_ip,
            target_ethernet_address: request.sender_ethernet_address,
            target_ip_address: request.sender_ip_address,
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn is_request(&self) -> bool {
        self.opcode == Self::OPCODE_REQUEST
    }

    #[inline(always)]
    pub fn is_reply(&self) -> bool {
        self.opcode == Self::OPCODE_REPLY
    }

    pub fn supported(&self) -> bool {
        self.hardware_type == Self::TYPE_ETHERNET
            && self.protocol_type == EthernetHeader::TYPE_IPV4
            && self.hardware_address_size as usize == EthernetAddress::LENGTH
            && (self.is_request() || self.is_reply())
    }

    pub fn parse(&mut self, buf: Buffer) -> Result<(), ParseError> {
        if buf.len() < Self::LENGTH {
            return Err(ParseError::PacketTooShort);
        }
        let mut p = NetParser::new(buf);
        self.hardware_type = p.parse_u16();
        self.protocol_type = p.parse_u16();
        self.hardware_address_size = p.parse_u8();
        self.protocol_address_size = p.parse_u8();
        self.opcode = p.parse_u16();
        self.sender_ethernet_address = EthernetAddress(p.parse_bytes());
        self.sender_ip_address = ipv4_from_field(&p.parse_bytes());
        self.target_ethernet_address = EthernetAddress(p.parse_bytes());
        self.target_ip_address = ipv4_from_field(&p.parse_bytes());
        p.get_result()?;
        if !self.supported() {
            return Err(ParseError::Unsupported);
        }
        Ok(())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut ser = Vec::with_capacity(Self::LENGTH);
        NetUnparser::u16(&mut ser, self.hardware_type);
        NetUnparser::u16(&mut ser, self.protocol_type);
        NetUnparser::u8(&mut ser, self.hardware_address_size);
        NetUnparser::u8(&mut ser, self.protocol_address_size);
        NetUnparser::u16(&mut ser, self.opcode);
        NetUnparser::bytes(&mut ser, &self.sender_ethernet_address.0);
        NetUnparser::bytes(&mut ser, &ipv4_to_field(self.sender_ip_address));
        NetUnparser::bytes(&mut ser, &self.target_ethernet_address.0);
        NetUnparser::bytes(&mut ser, &ipv4_to_field(self.target_ip_address));
        ser
    }
}

impl Display for ArpMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self.opcode {
            Self::OPCODE_REQUEST => "REQUEST",
            Self::OPCODE_REPLY => "REPLY",
            _ => "(unknown type)",
        };
        write!(
            f,
            "opcode={}, sender={}/{}, target={}/{}",
            op,
            self.sender_ethernet_address,
            self.sender_ip_address,
            self.target_ethernet_address,
            self.target_ip_address
        )
    }
}
