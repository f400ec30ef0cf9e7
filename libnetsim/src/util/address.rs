use thiserror::Error;

use std::net::Ipv4Addr;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Malformed IPv4 address: {0}")]
    MalformedIp(String),
    #[error("Address must not be 0.0.0.0")]
    Unspecified,
    #[error("Invalid prefix length {0}, expected 0..=32")]
    InvalidPrefix(u8),
    #[error("Interface name {0:?} is empty or longer than {max} bytes", max = InterfaceName::MAX_LEN)]
    InvalidInterfaceName(String),
}

/// Width of an address field on the wire. IPv4 sits in the low four bytes,
/// IPv4-mapped, so the layout leaves room without carrying IPv6 semantics.
pub const IP_FIELD_LENGTH: usize = 16;

pub const MAX_PREFIX_LEN: u8 = 32;

pub fn ipv4_to_field(ip: Ipv4Addr) -> [u8; IP_FIELD_LENGTH] {
    ip.to_ipv6_mapped().octets()
}

pub fn ipv4_from_field(field: &[u8; IP_FIELD_LENGTH]) -> Ipv4Addr {
    Ipv4Addr::new(field[12], field[13], field[14], field[15])
}

pub fn parse_ipv4(s: &str) -> Result<Ipv4Addr, AddressError> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| AddressError::MalformedIp(s.to_string()))
}

/// Like [`parse_ipv4`] but rejects 0.0.0.0, which the configuration surface
/// treats as "no address".
pub fn parse_host_ipv4(s: &str) -> Result<Ipv4Addr, AddressError> {
    check_host(parse_ipv4(s)?)
}

pub fn check_host(ip: Ipv4Addr) -> Result<Ipv4Addr, AddressError> {
    if ip.is_unspecified() {
        return Err(AddressError::Unspecified);
    }
    Ok(ip)
}

pub fn check_prefix(prefix_len: u8) -> Result<u8, AddressError> {
    if prefix_len > MAX_PREFIX_LEN {
        return Err(AddressError::InvalidPrefix(prefix_len));
    }
    Ok(prefix_len)
}

pub fn netmask(prefix_len: u8) -> u32 {
    match prefix_len.min(MAX_PREFIX_LEN) {
        0 => 0,
        n => u32::MAX << (32 - n as u32),
    }
}

pub fn apply_mask(ip: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) & netmask(prefix_len))
}

/// Interface name as carried in the fixed-width auxiliary prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterfaceName(String);

impl InterfaceName {
    pub const FIELD_LENGTH: usize = 16;
    pub const MAX_LEN: usize = Self::FIELD_LENGTH - 1;

    pub fn new(name: &str) -> Result<Self, AddressError> {
        if name.is_empty() || name.len() > Self::MAX_LEN || name.contains('\0') {
            return Err(AddressError::InvalidInterfaceName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_field(&self) -> [u8; Self::FIELD_LENGTH] {
        let mut field = [0u8; Self::FIELD_LENGTH];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    pub fn from_field(field: &[u8; Self::FIELD_LENGTH]) -> Result<Self, AddressError> {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let name = String::from_utf8_lossy(&field[..end]);
        Self::new(&name)
    }
}

impl std::fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
