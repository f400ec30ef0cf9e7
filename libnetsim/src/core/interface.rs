use crate::{
    apply_mask, ConfigError, DropReason, Endpoint, EthernetAddress, EthernetFrame,
    EthernetHeader, InterfaceName, LinkId, NodeId,
};

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L2Mode {
    Unset,
    Access,
    Trunk,
}

impl Default for L2Mode {
    fn default() -> Self {
        L2Mode::Unset
    }
}

impl FromStr for L2Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(L2Mode::Access),
            "trunk" => Ok(L2Mode::Trunk),
            _ => Err(ConfigError::InvalidL2Mode(s.to_string())),
        }
    }
}

impl Display for L2Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            L2Mode::Unset => "unset",
            L2Mode::Access => "access",
            L2Mode::Trunk => "trunk",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpConfig {
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
}

impl IpConfig {
    #[inline(always)]
    pub fn subnet(&self) -> Ipv4Addr {
        apply_mask(self.ip, self.prefix_len)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        apply_mask(ip, self.prefix_len) == self.subnet()
    }
}

/// Result of checking an inbound frame against an interface's
/// configuration. `tag_with` is set when an access port adopts an untagged
/// frame into its VLAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accept { tag_with: Option<u16> },
    Reject(DropReason),
}

#[derive(Debug, Clone)]
pub struct Interface {
    name: InterfaceName,
    node: NodeId,
    link: Option<LinkId>,
    peer: Option<Endpoint>,
    mac: EthernetAddress,
    ip: Option<IpConfig>,
    ip_backup: Option<IpConfig>,
    l2_mode: L2Mode,
    vlans: Vec<u16>,
}

impl Interface {
    pub const MAX_VLAN_MEMBERSHIP: usize = 10;
    pub const MAX_VLAN_ID: u16 = 4095;

    pub fn new(name: InterfaceName, node: NodeId, mac: EthernetAddress) -> Self {
        Self {
            name,
            node,
            link: None,
            peer: None,
            mac,
            ip: None,
            ip_backup: None,
            l2_mode: L2Mode::Unset,
            vlans: Vec::with_capacity(Self::MAX_VLAN_MEMBERSHIP),
        }
    }

    pub(crate) fn attach(&mut self, link: LinkId, peer: Endpoint) {
        self.link = Some(link);
        self.peer = Some(peer);
    }

    #[inline(always)]
    pub fn name(&self) -> &InterfaceName {
        &self.name
    }

    #[inline(always)]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline(always)]
    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    /// The interface at the far end of the link.
    #[inline(always)]
    pub fn peer(&self) -> Option<&Endpoint> {
        self.peer.as_ref()
    }

    #[inline(always)]
    pub fn mac(&self) -> EthernetAddress {
        self.mac
    }

    #[inline(always)]
    pub fn ip(&self) -> Option<IpConfig> {
        self.ip
    }

    #[inline(always)]
    pub fn l2_mode(&self) -> L2Mode {
        self.l2_mode
    }

    #[inline(always)]
    pub fn vlans(&self) -> &[u16] {
        &self.vlans
    }

    #[inline(always)]
    pub fn is_ip_configured(&self) -> bool {
        self.ip.is_some()
    }

    #[inline(always)]
    pub fn is_switchport(&self) -> bool {
        self.l2_mode != L2Mode::Unset
    }

    pub fn access_vlan(&self) -> Option<u16> {
        match self.l2_mode {
            L2Mode::Access => self.vlans.first().copied(),
            _ => None,
        }
    }

    pub fn trunk_carries(&self, vlan_id: u16) -> bool {
        self.l2_mode == L2Mode::Trunk && self.vlans.contains(&vlan_id)
    }

    pub fn set_ip(&mut self, ip: Ipv4Addr, prefix_len: u8) -> Result<(), ConfigError> {
        if self.is_switchport() {
            return Err(ConfigError::L2ModeActive(self.name.to_string()));
        }
        self.ip = Some(IpConfig { ip, prefix_len });
        self.ip_backup = None;
        Ok(())
    }

    /// Moves the interface into `mode`. An IP configuration is set aside and
    /// comes back with [`Interface::clear_l2_mode`]. Leaving trunk mode for
    /// access mode forgets the VLAN membership.
    pub fn set_l2_mode(&mut self, mode: L2Mode) -> Result<(), ConfigError> {
        if mode == L2Mode::Unset {
            return Err(ConfigError::InvalidL2Mode(mode.to_string()));
        }
        if let Some(ip) = self.ip.take() {
            self.ip_backup = Some(ip);
        }
        if self.l2_mode == L2Mode::Trunk && mode == L2Mode::Access {
            self.vlans.clear();
        }
        self.l2_mode = mode;
        Ok(())
    }

    /// Leaves L2 mode and returns the IP configuration that was restored, if
    /// any had been set aside.
    pub fn clear_l2_mode(&mut self) -> Option<IpConfig> {
        self.l2_mode = L2Mode::Unset;
        self.vlans.clear();
        self.ip = self.ip_backup.take();
        self.ip
    }

    pub fn set_vlan(&mut self, vlan_id: u16) -> Result<(), ConfigError> {
        if vlan_id == 0 || vlan_id > Self::MAX_VLAN_ID {
            return Err(ConfigError::InvalidVlan(vlan_id));
        }
        match self.l2_mode {
            L2Mode::Unset if self.is_ip_configured() => {
                Err(ConfigError::IpModeActive(self.name.to_string()))
            }
            L2Mode::Unset => Err(ConfigError::L2ModeNotSet(self.name.to_string())),
            L2Mode::Access => {
                self.vlans.clear();
                self.vlans.push(vlan_id);
                Ok(())
            }
            L2Mode::Trunk => {
                if self.vlans.contains(&vlan_id) {
                    return Ok(());
                }
                if self.vlans.len() >= Self::MAX_VLAN_MEMBERSHIP {
                    return Err(ConfigError::VlanMembershipFull(self.name.to_string()));
                }
                self.vlans.push(vlan_id);
                Ok(())
            }
        }
    }

    /// Decides whether an inbound frame is meant for this interface.
    pub fn qualify(&self, header: &EthernetHeader) -> Admission {
        let tagged = header.vlan_id();
        match self.l2_mode {
            L2Mode::Access => match (self.access_vlan(), tagged) {
                (None, None) => Admission::Accept { tag_with: None },
                (Some(vlan), None) => Admission::Accept {
                    tag_with: Some(vlan),
                },
                (Some(vlan), Some(t)) if vlan == t => Admission::Accept { tag_with: None },
                (_, Some(t)) => Admission::Reject(DropReason::VlanRejected(t)),
            },
            L2Mode::Trunk => match tagged {
                None => Admission::Reject(DropReason::UntaggedOnTrunk),
                Some(t) if self.trunk_carries(t) => Admission::Accept { tag_with: None },
                Some(t) => Admission::Reject(DropReason::VlanRejected(t)),
            },
            L2Mode::Unset if !self.is_ip_configured() => {
                Admission::Reject(DropReason::InterfaceNotConfigured)
            }
            L2Mode::Unset => {
                if tagged.is_some() {
                    Admission::Reject(DropReason::TaggedOnIpInterface)
                } else if header.dst == self.mac || header.dst.is_broadcast() {
                    Admission::Accept { tag_with: None }
                } else {
                    Admission::Reject(DropReason::NotForInterface(header.dst))
                }
            }
        }
    }

    /// The outbound counterpart of [`Interface::qualify`] for switched
    /// traffic: the frame as this port would emit it, or `None` if the port
    /// does not carry it. Access ports strip their VLAN tag, trunks keep it.
    pub fn egress_frame(&self, frame: &EthernetFrame) -> Option<EthernetFrame> {
        match self.l2_mode {
            L2Mode::Access => match (self.access_vlan(), frame.vlan_id()) {
                (None, None) => Some(frame.clone()),
                (Some(vlan), Some(t)) if vlan == t => {
                    let mut out = frame.clone();
                    out.untag();
                    Some(out)
                }
                _ => None,
            },
            L2Mode::Trunk => match frame.vlan_id() {
                Some(t) if self.trunk_carries(t) => Some(frame.clone()),
                _ => None,
            },
            L2Mode::Unset => None,
        }
    }
}

impl Display for Interface {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Interface: {}  MAC: {}", self.name, self.mac)?;
        if let Some(peer) = &self.peer {
            write!(f, "  peer: {}", peer)?;
        }
        match (self.ip, self.l2_mode) {
            (Some(cfg), _) => write!(f, "  IP: {}/{}", cfg.ip, cfg.prefix_len),
            (None, L2Mode::Unset) => write!(f, "  unconfigured"),
            (None, mode) => {
                write!(f, "  L2 mode: {}", mode)?;
                if !self.vlans.is_empty() {
                    write!(f, "  VLANs: {:?}", self.vlans)?;
                }
                Ok(())
            }
        }
    }
}
