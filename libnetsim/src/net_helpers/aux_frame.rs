use crate::{AddressError, Buffer, BufferError, InterfaceName, NetParser, ParseError};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuxFrameError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// What crosses the simulated wire: a fixed-width interface name followed by
/// the serialized Ethernet frame. On send the name is the peer interface the
/// frame is headed for; the receiving node uses it as the ingress interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxFrame {
    pub interface: InterfaceName,
    pub frame: Vec<u8>,
}

impl AuxFrame {
    pub const AUX_LENGTH: usize = InterfaceName::FIELD_LENGTH;
    pub const MAX_BUFFER_SIZE: usize = 1540;

    pub fn new(interface: InterfaceName, frame: Vec<u8>) -> Self {
        Self { interface, frame }
    }

    pub fn try_serialize(&self) -> Result<Vec<u8>, AuxFrameError> {
        let total = Self::AUX_LENGTH + self.frame.len();
        if total > Self::MAX_BUFFER_SIZE {
            return Err(BufferError::CapacityExceeded(Self::MAX_BUFFER_SIZE).into());
        }
        let mut ret = Vec::with_capacity(total);
        ret.extend_from_slice(&self.interface.to_field());
        ret.extend_from_slice(&self.frame);
        Ok(ret)
    }

    pub fn parse(bytes: Vec<u8>) -> Result<Self, AuxFrameError> {
        let buf = Buffer::with_capacity_limit(bytes, Self::MAX_BUFFER_SIZE)?;
        let mut p = NetParser::new(buf);
        let field = p.parse_bytes::<{ InterfaceName::FIELD_LENGTH }>();
        p.get_result()?;
        let interface = InterfaceName::from_field(&field)?;
        let frame = p.buffer_mut().take();
        Ok(Self { interface, frame })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_carries_interface_name() {
        let aux = AuxFrame::new(InterfaceName::new("eth0/4").unwrap(), vec![0xaa; 30]);
        let bytes = aux.try_serialize().unwrap();
        assert_eq!(bytes.len(), 46);
        assert_eq!(&bytes[..6], b"eth0/4");
        assert_eq!(&bytes[6..16], &[0; 10]);
        assert_eq!(AuxFrame::parse(bytes).unwrap(), aux);
    }

    #[test]
    fn rejects_short_and_oversized_buffers() {
        assert_eq!(
            AuxFrame::parse(vec![b'e'; 10]),
            Err(AuxFrameError::Parse(ParseError::PacketTooShort))
        );
        assert_eq!(
            AuxFrame::parse(vec![b'e'; AuxFrame::MAX_BUFFER_SIZE + 1]),
            Err(AuxFrameError::Buffer(BufferError::CapacityExceeded(
                AuxFrame::MAX_BUFFER_SIZE
            )))
        );
        assert!(matches!(
            AuxFrame::parse(vec![0; 20]),
            Err(AuxFrameError::Address(_))
        ));
    }
}
