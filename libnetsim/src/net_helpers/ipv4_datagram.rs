use crate::{Buffer, IPv4Header, InternetChecksum, NetParser, ParseError};

use std::net::Ipv4Addr;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IPv4Datagram {
    header: IPv4Header,
    payload: Vec<u8>,
}

impl IPv4Datagram {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, proto: u8, payload: Vec<u8>) -> Self {
        Self {
            header: IPv4Header::new(src, dst, proto, payload.len()),
            payload,
        }
    }

    pub fn parse(&mut self, buf: Buffer) -> Result<(), ParseError> {
        let mut p = NetParser::new(buf);
        self.header.parse(&mut p)?;
        self.payload = p.buffer_mut().take();
        // Anything past the advertised length is link-layer padding.
        self.payload.truncate(self.header.payload_length());
        p.get_result()
    }

    /// Serializes with a freshly computed header checksum.
    pub fn try_serialize(&self) -> Result<Vec<u8>, ParseError> {
        if self.payload.len() != self.header.payload_length() {
            return Err(ParseError::PayloadSizeMismatch);
        }

        let mut header_out = self.header;
        header_out.cksum = 0;
        let header_zero_checksum = header_out.try_serialize()?;

        let mut checksum = InternetChecksum::default();
        checksum.add(&header_zero_checksum);
        header_out.cksum = checksum.value();

        let mut ret = header_out.try_serialize()?;
        ret.extend_from_slice(&self.payload);
        Ok(ret)
    }

    pub fn header(&self) -> &IPv4Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut IPv4Header {
        &mut self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
