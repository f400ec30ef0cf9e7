use crate::{
    check_host, check_prefix, ArpTable, ConfigError, DropReason, EthernetFrame, Interface, InterfaceName,
    L2Mode, MacTable, NextHop, NodeId, RoutingTable, TransportError,
};

use bitflags::bitflags;
use log::{trace, warn};

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceFlags: u8 {
        const L2_SWITCH = 1 << 0;
        const L3_ROUTER = 1 << 1;
    }
}

/// Ships serialized frames between nodes. Delivery is fire-and-forget.
pub trait Transport: Send + Sync {
    /// Hands `frame` to the interface on the far side of `egress`.
    fn send(&self, egress: &Interface, frame: &[u8]) -> Result<(), TransportError>;

    /// Feeds `frame` back into the owning node as if it had arrived on
    /// `ingress`.
    fn send_to_self(&self, ingress: &Interface, frame: &[u8]) -> Result<(), TransportError>;
}

/// A frame ready to leave through the named interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub interface: InterfaceName,
    pub frame: EthernetFrame,
}

/// What became of one inbound frame or one originated packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Dropped(DropReason),
    Switched { transmitted: usize },
    ArpReplied,
    ArpResolved { released: usize },
    ArpRequested { target: Ipv4Addr },
    Delivered { protocol: u8, source: Ipv4Addr },
    Forwarded { next_hop: Ipv4Addr },
    AwaitingArp { next_hop: Ipv4Addr },
    LoopedBack,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeStats {
    pub frames_received: u64,
    pub frames_accepted: u64,
    pub frames_dropped: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub pings_received: u64,
    pub arp_resolutions: u64,
}

impl Display for NodeStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames received : {}", self.frames_received)?;
        writeln!(f, "frames accepted : {}", self.frames_accepted)?;
        writeln!(f, "frames dropped  : {}", self.frames_dropped)?;
        writeln!(f, "frames sent     : {}", self.frames_sent)?;
        writeln!(f, "send failures   : {}", self.send_failures)?;
        writeln!(f, "pings received  : {}", self.pings_received)?;
        writeln!(f, "ARP resolutions : {}", self.arp_resolutions)
    }
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    flags: DeviceFlags,
    loopback: Option<Ipv4Addr>,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) arp_table: ArpTable,
    pub(crate) mac_table: MacTable,
    pub(crate) routing_table: RoutingTable,
    pub(crate) stats: NodeStats,
}

impl Node {
    pub const MAX_INTERFACES: usize = 10;

    pub fn new(id: NodeId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            flags: DeviceFlags::empty(),
            loopback: None,
            interfaces: Vec::with_capacity(Self::MAX_INTERFACES),
            arp_table: ArpTable::default(),
            mac_table: MacTable::default(),
            routing_table: RoutingTable::default(),
            stats: NodeStats::default(),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn flags(&self) -> DeviceFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: DeviceFlags) {
        self.flags = flags;
    }

    #[inline(always)]
    pub fn loopback(&self) -> Option<Ipv4Addr> {
        self.loopback
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name().as_str() == name)
    }

    pub(crate) fn interface_index(&self, name: &str) -> Option<usize> {
        self.interfaces.iter().position(|i| i.name().as_str() == name)
    }

    fn interface_mut(&mut self, name: &str) -> Result<&mut Interface, ConfigError> {
        let node = self.name.clone();
        self.interfaces
            .iter_mut()
            .find(|i| i.name().as_str() == name)
            .ok_or(ConfigError::UnknownInterface {
                node,
                interface: name.to_string(),
            })
    }

    pub fn arp_table(&self) -> &ArpTable {
        &self.arp_table
    }

    pub fn mac_table(&self) -> &MacTable {
        &self.mac_table
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    pub(crate) fn check_new_interface(&self, name: &InterfaceName) -> Result<(), ConfigError> {
        if self.interface(name.as_str()).is_some() {
            return Err(ConfigError::DuplicateInterface {
                node: self.name.clone(),
                interface: name.to_string(),
            });
        }
        if self.interfaces.len() >= Self::MAX_INTERFACES {
            return Err(ConfigError::InterfaceSlotsFull(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn push_interface(&mut self, intf: Interface) {
        self.interfaces.push(intf);
    }

    /// Sets the node's identity address and installs a /32 direct route.
    pub fn set_loopback(&mut self, ip: Ipv4Addr) -> Result<(), ConfigError> {
        let ip = check_host(ip)?;
        match self.routing_table.add_direct_route(ip, 32) {
            Ok(()) | Err(ConfigError::DuplicateRoute { .. }) => {}
            Err(e) => return Err(e),
        }
        self.loopback = Some(ip);
        Ok(())
    }

    /// Puts an address on an interface and a direct route for its subnet.
    pub fn set_interface_ip(
        &mut self,
        interface: &str,
        ip: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<(), ConfigError> {
        let ip = check_host(ip)?;
        let prefix_len = check_prefix(prefix_len)?;
        if self.interface_mut(interface)?.is_switchport() {
            return Err(ConfigError::L2ModeActive(interface.to_string()));
        }
        match self.routing_table.add_direct_route(ip, prefix_len) {
            Ok(()) | Err(ConfigError::DuplicateRoute { .. }) => {}
            Err(e) => return Err(e),
        }
        self.interface_mut(interface)?.set_ip(ip, prefix_len)
    }

    pub fn set_l2_mode(&mut self, interface: &str, mode: L2Mode) -> Result<(), ConfigError> {
        self.interface_mut(interface)?.set_l2_mode(mode)
    }

    pub fn clear_l2_mode(&mut self, interface: &str) -> Result<(), ConfigError> {
        self.interface_mut(interface)?.clear_l2_mode();
        Ok(())
    }

    pub fn set_vlan(&mut self, interface: &str, vlan_id: u16) -> Result<(), ConfigError> {
        self.interface_mut(interface)?.set_vlan(vlan_id)
    }

    pub fn add_route(
        &mut self,
        ip: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        interface: &str,
    ) -> Result<(), ConfigError> {
        let gateway = check_host(gateway)?;
        let interface = self.interface_mut(interface)?.name().clone();
        self.routing_table.add_route(
            ip,
            prefix_len,
            NextHop::Gateway { gateway, interface },
        )
    }

    pub fn delete_route(&mut self, ip: Ipv4Addr, prefix_len: u8) -> Result<(), ConfigError> {
        self.routing_table.delete_route(ip, prefix_len).map(|_| ())
    }

    /// Whether `ip` is the loopback address or sits on one of the
    /// interfaces.
    pub fn owns_ip(&self, ip: Ipv4Addr) -> bool {
        self.loopback == Some(ip)
            || self
                .interfaces
                .iter()
                .any(|i| i.ip().map(|cfg| cfg.ip) == Some(ip))
    }

    pub(crate) fn subnet_interface_index(&self, ip: Ipv4Addr) -> Option<usize> {
        self.interfaces
            .iter()
            .position(|i| i.ip().map_or(false, |cfg| cfg.contains(ip)))
    }

    pub(crate) fn discard(&mut self, reason: DropReason) -> Disposition {
        self.stats.frames_dropped += 1;
        Disposition::Dropped(reason)
    }

    /// Serializes and sends a frame out of the named interface. Failures are
    /// logged and counted, never retried.
    pub(crate) fn transmit(&mut self, transport: &dyn Transport, out: Transmit) -> bool {
        let idx = match self.interface_index(out.interface.as_str()) {
            Some(idx) => idx,
            None => {
                warn!("{}: no interface {} to transmit on", self.name, out.interface);
                self.stats.send_failures += 1;
                return false;
            }
        };
        let bytes = match out.frame.try_serialize() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}: cannot serialize frame: {}", self.name, e);
                self.stats.send_failures += 1;
                return false;
            }
        };
        trace!(
            "{}: {} -> {}\n{}",
            self.name,
            out.interface,
            out.frame.header(),
            crate::hexdump(&bytes, 4)
        );
        match transport.send(&self.interfaces[idx], &bytes) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                true
            }
            Err(e) => {
                warn!("{}: send on {} failed: {}", self.name, out.interface, e);
                self.stats.send_failures += 1;
                false
            }
        }
    }

    pub(crate) fn transmit_to_self(
        &mut self,
        transport: &dyn Transport,
        idx: usize,
        frame: &EthernetFrame,
    ) -> bool {
        let sent = frame
            .try_serialize()
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                transport
                    .send_to_self(&self.interfaces[idx], &bytes)
                    .map_err(|e| e.to_string())
            });
        match sent {
            Ok(()) => {
                self.stats.frames_sent += 1;
                true
            }
            Err(e) => {
                warn!(
                    "{}: loopback on {} failed: {}",
                    self.name,
                    self.interfaces[idx].name(),
                    e
                );
                self.stats.send_failures += 1;
                false
            }
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Node: {}", self.name)?;
        if !self.flags.is_empty() {
            write!(f, "  flags: {:?}", self.flags)?;
        }
        if let Some(lo) = self.loopback {
            write!(f, "  loopback: {}", lo)?;
        }
        writeln!(f)?;
        for intf in &self.interfaces {
            writeln!(f, "  {}", intf)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Topology;

    fn two_nodes() -> Topology {
        let mut topo = Topology::new("t");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();
        topo
    }

    #[test]
    fn addresses_install_direct_routes() {
        let mut topo = two_nodes();
        let a = topo.node_mut("A").unwrap();
        a.set_loopback(Ipv4Addr::new(122, 1, 1, 1)).unwrap();
        a.set_interface_ip("eth0/0", Ipv4Addr::new(10, 1, 1, 1), 24).unwrap();

        let lo = a.routing_table().lookup(Ipv4Addr::new(122, 1, 1, 1), 32).unwrap();
        assert!(lo.is_direct());
        let subnet = a.routing_table().lookup_lpm(Ipv4Addr::new(10, 1, 1, 77)).unwrap();
        assert_eq!(subnet.prefix_len, 24);
        assert!(a.owns_ip(Ipv4Addr::new(10, 1, 1, 1)));
        assert!(a.owns_ip(Ipv4Addr::new(122, 1, 1, 1)));
        assert!(!a.owns_ip(Ipv4Addr::new(10, 1, 1, 2)));
    }

    #[test]
    fn config_errors_leave_state_alone() {
        let mut topo = two_nodes();
        let a = topo.node_mut("A").unwrap();
        assert!(matches!(
            a.set_interface_ip("eth9", Ipv4Addr::new(10, 1, 1, 1), 24),
            Err(ConfigError::UnknownInterface { .. })
        ));
        assert!(a
            .set_interface_ip("eth0/0", Ipv4Addr::UNSPECIFIED, 24)
            .is_err());
        assert!(a
            .set_interface_ip("eth0/0", Ipv4Addr::new(10, 1, 1, 1), 33)
            .is_err());
        a.set_l2_mode("eth0/0", L2Mode::Access).unwrap();
        assert_eq!(
            a.set_interface_ip("eth0/0", Ipv4Addr::new(10, 1, 1, 1), 24),
            Err(ConfigError::L2ModeActive("eth0/0".into()))
        );
        assert!(a.routing_table().is_empty());
        assert!(a.add_route(Ipv4Addr::new(1, 0, 0, 0), 8, Ipv4Addr::new(10, 1, 1, 2), "eth7").is_err());
    }

    #[test]
    fn clear_l2_mode_restores_ip() {
        let mut topo = two_nodes();
        let a = topo.node_mut("A").unwrap();
        a.set_interface_ip("eth0/0", Ipv4Addr::new(10, 1, 1, 1), 24).unwrap();
        a.set_l2_mode("eth0/0", L2Mode::Trunk).unwrap();
        assert!(!a.owns_ip(Ipv4Addr::new(10, 1, 1, 1)));
        a.clear_l2_mode("eth0/0").unwrap();
        assert!(a.owns_ip(Ipv4Addr::new(10, 1, 1, 1)));
    }

    #[test]
    fn route_add_and_delete() {
        let mut topo = two_nodes();
        let a = topo.node_mut("A").unwrap();
        a.add_route(Ipv4Addr::new(122, 1, 1, 3), 32, Ipv4Addr::new(10, 1, 1, 2), "eth0/0")
            .unwrap();
        assert!(matches!(
            a.add_route(Ipv4Addr::new(122, 1, 1, 3), 32, Ipv4Addr::new(10, 1, 1, 2), "eth0/0"),
            Err(ConfigError::DuplicateRoute { .. })
        ));
        a.delete_route(Ipv4Addr::new(122, 1, 1, 3), 32).unwrap();
        assert!(a.routing_table().is_empty());
    }

    #[test]
    fn flags_show_in_summary() {
        let mut topo = two_nodes();
        let a = topo.node_mut("A").unwrap();
        a.set_flags(DeviceFlags::L3_ROUTER);
        assert!(a.to_string().contains("L3_ROUTER"));
    }
}
