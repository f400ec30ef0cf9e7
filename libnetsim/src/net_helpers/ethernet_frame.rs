use crate::{Buffer, EthernetHeader, NetParser, NetUnparser, ParseError, VlanTag};

/// An Ethernet frame as it travels between interfaces: header, payload and
/// a trailing frame check sequence that is written as zero and never checked.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    header: EthernetHeader,
    payload: Vec<u8>,
}

impl EthernetFrame {
    pub const FCS_LENGTH: usize = 4;
    pub const MAX_PAYLOAD_SIZE: usize = 1500;
    pub const MAX_PACKET_SIZE: usize = 1524;

    pub fn new(header: EthernetHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    pub fn parse(&mut self, buf: Buffer) -> Result<(), ParseError> {
        let mut p = NetParser::new(buf);
        self.header.parse(&mut p)?;
        p.buffer_mut()
            .try_remove_suffix(Self::FCS_LENGTH)
            .map_err(|_| ParseError::PacketTooShort)?;
        self.payload = p.buffer_mut().take();
        p.get_result()
    }

    pub fn try_serialize(&self) -> Result<Vec<u8>, ParseError> {
        if self.payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(ParseError::Oversized(Self::MAX_PAYLOAD_SIZE));
        }
        let mut ret = self.header.serialize();
        ret.reserve(self.payload.len() + Self::FCS_LENGTH);
        NetUnparser::bytes(&mut ret, &self.payload);
        NetUnparser::u32(&mut ret, 0);
        if ret.len() > Self::MAX_PACKET_SIZE {
            return Err(ParseError::Oversized(Self::MAX_PACKET_SIZE));
        }
        Ok(ret)
    }

    /// Inserts an 802.1Q tag, replacing any tag already present.
    pub fn tag(&mut self, vlan_id: u16) {
        self.header.vlan = Some(VlanTag::new(vlan_id));
    }

    /// Strips the 802.1Q tag, handing it back if there was one.
    pub fn untag(&mut self) -> Option<VlanTag> {
        self.header.vlan.take()
    }

    #[inline(always)]
    pub fn is_tagged(&self) -> bool {
        self.header.vlan.is_some()
    }

    #[inline(always)]
    pub fn vlan_id(&self) -> Option<u16> {
        self.header.vlan_id()
    }

    pub fn header(&self) -> &EthernetHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut EthernetHeader {
        &mut self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
