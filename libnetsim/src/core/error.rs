use crate::{AddressError, AuxFrameError, EthernetAddress, ParseError};

use thiserror::Error;

use std::net::Ipv4Addr;

/// Administrative mistakes. Whatever raised one left the node untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No node named {0}")]
    UnknownNode(String),
    #[error("Node {0} already exists")]
    DuplicateNode(String),
    #[error("No topology named {0}")]
    UnknownTopology(String),
    #[error("Node {node} has no interface named {interface}")]
    UnknownInterface { node: String, interface: String },
    #[error("Node {node} already has an interface named {interface}")]
    DuplicateInterface { node: String, interface: String },
    #[error("Node {0} has no free interface slots")]
    InterfaceSlotsFull(String),
    #[error("A link cannot join an interface to its own node")]
    SelfLink,
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("Invalid VLAN id {0}, expected 1..=4095")]
    InvalidVlan(u16),
    #[error("Interface {0} has reached its VLAN membership limit")]
    VlanMembershipFull(String),
    #[error("Interface {0} is IP-configured, L2 VLANs do not apply")]
    IpModeActive(String),
    #[error("Interface {0} is in an L2 mode and cannot take an IP address")]
    L2ModeActive(String),
    #[error("Interface {0} has no L2 mode set")]
    L2ModeNotSet(String),
    #[error("Invalid L2 mode {0:?}, expected access or trunk")]
    InvalidL2Mode(String),
    #[error("Route {subnet}/{prefix_len} already exists")]
    DuplicateRoute { subnet: Ipv4Addr, prefix_len: u8 },
    #[error("No route {subnet}/{prefix_len}")]
    NoSuchRoute { subnet: Ipv4Addr, prefix_len: u8 },
}

/// Why a frame or packet was discarded. These are ordinary network events:
/// they are logged and counted, never propagated as failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DropReason {
    #[error("Unreadable wire buffer: {0}")]
    BadWireBuffer(AuxFrameError),
    #[error("Malformed frame: {0}")]
    Malformed(ParseError),
    #[error("Frame arrived on unknown interface {0}")]
    UnknownIngress(String),
    #[error("Interface is neither IP-configured nor in an L2 mode")]
    InterfaceNotConfigured,
    #[error("Frame tagged with VLAN {0} refused")]
    VlanRejected(u16),
    #[error("Untagged frame refused on trunk port")]
    UntaggedOnTrunk,
    #[error("VLAN-tagged frame refused on IP interface")]
    TaggedOnIpInterface,
    #[error("Destination {0} is not this interface")]
    NotForInterface(EthernetAddress),
    #[error("Unsupported EtherType {0:#06x}")]
    UnsupportedEtherType(u16),
    #[error("ARP request for {0} does not target the receiving interface")]
    ArpNotForUs(Ipv4Addr),
    #[error("Unsolicited ARP reply from {0}")]
    UnsolicitedArpReply(Ipv4Addr),
    #[error("No route to {0}")]
    NoRoute(Ipv4Addr),
    #[error("TTL expired on packet to {0}")]
    TtlExpired(Ipv4Addr),
    #[error("No interface on the subnet of {0}")]
    NoEgressInterface(Ipv4Addr),
    #[error("Unknown IP protocol {0}")]
    UnknownProtocol(u8),
    #[error("Transport failed to send the frame")]
    TransportFailed,
}

/// Table corruption or a logic defect. The node that hits one stops.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Node {node} tried to switch a frame out of IP interface {interface}")]
    SwitchOutOfIpInterface { node: String, interface: String },
    #[error("ARP entry for {0} is resolved where a pending entry was expected")]
    ArpEntryNotPending(Ipv4Addr),
    #[error("Pending ARP entry for {0} already exists")]
    DuplicatePendingEntry(Ipv4Addr),
}
