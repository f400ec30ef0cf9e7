use crate::{
    ArpEntry, ArpRelease, Buffer, Disposition, DropReason, EthernetFrame, EthernetHeader,
    IPv4Datagram, IPv4Header, InvariantViolation, NextHop, Node, PendingOutcome, Transmit,
    Transport,
};

use log::{debug, info};

use std::net::Ipv4Addr;

impl Node {
    /// Parses an IPv4 payload handed up from Layer 2 and routes it.
    pub fn promote_to_layer3(
        &mut self,
        transport: &dyn Transport,
        payload: Vec<u8>,
    ) -> Result<Disposition, InvariantViolation> {
        let mut dgram = IPv4Datagram::default();
        if let Err(e) = dgram.parse(Buffer::from(payload)) {
            return Ok(self.discard(DropReason::Malformed(e)));
        }
        self.receive_packet(transport, dgram)
    }

    fn receive_packet(
        &mut self,
        transport: &dyn Transport,
        mut dgram: IPv4Datagram,
    ) -> Result<Disposition, InvariantViolation> {
        let dst = dgram.header().dst;
        let next_hop = match self.routing_table.lookup_lpm(dst) {
            Some(route) => route.next_hop.clone(),
            None => {
                debug!("{}: no route to {}", self.name(), dst);
                return Ok(self.discard(DropReason::NoRoute(dst)));
            }
        };

        match next_hop {
            NextHop::Direct if self.owns_ip(dst) => self.deliver_locally(transport, dgram),
            NextHop::Direct => match dgram.try_serialize() {
                Ok(bytes) => self.demote_to_layer2(transport, dst, None, bytes),
                Err(e) => Ok(self.discard(DropReason::Malformed(e))),
            },
            NextHop::Gateway { gateway, interface } => {
                let header = dgram.header_mut();
                header.ttl = header.ttl.saturating_sub(1);
                if header.ttl == 0 {
                    info!("{}: TTL expired on packet to {}", self.name(), dst);
                    return Ok(self.discard(DropReason::TtlExpired(dst)));
                }
                match dgram.try_serialize() {
                    Ok(bytes) => {
                        self.demote_to_layer2(transport, gateway, Some(interface.as_str()), bytes)
                    }
                    Err(e) => Ok(self.discard(DropReason::Malformed(e))),
                }
            }
        }
    }

    fn deliver_locally(
        &mut self,
        transport: &dyn Transport,
        dgram: IPv4Datagram,
    ) -> Result<Disposition, InvariantViolation> {
        let header = *dgram.header();
        match header.proto {
            IPv4Header::PROTO_ICMP => {
                self.stats.pings_received += 1;
                info!(
                    "{}: IP address {}, ping received from {}",
                    self.name(),
                    header.dst,
                    header.src
                );
                Ok(Disposition::Delivered {
                    protocol: header.proto,
                    source: header.src,
                })
            }
            IPv4Header::PROTO_IPIP => {
                debug!("{}: decapsulating tunnel packet from {}", self.name(), header.src);
                self.promote_to_layer3(transport, dgram.into_payload())
            }
            other => Ok(self.discard(DropReason::UnknownProtocol(other))),
        }
    }

    /// Builds a datagram from the node's loopback address and routes it
    /// without touching the TTL.
    pub fn originate(
        &mut self,
        transport: &dyn Transport,
        proto: u8,
        dst: Ipv4Addr,
        payload: Vec<u8>,
    ) -> Result<Disposition, InvariantViolation> {
        let src = self.loopback().unwrap_or(Ipv4Addr::UNSPECIFIED);
        let dgram = IPv4Datagram::new(src, dst, proto, payload);
        let (next_hop, egress) = match self.routing_table.lookup_lpm(dst) {
            Some(route) => match &route.next_hop {
                NextHop::Direct => (dst, None),
                NextHop::Gateway { gateway, interface } => (*gateway, Some(interface.clone())),
            },
            None => {
                debug!("{}: no route to {}", self.name(), dst);
                return Ok(self.discard(DropReason::NoRoute(dst)));
            }
        };
        let bytes = match dgram.try_serialize() {
            Ok(bytes) => bytes,
            Err(e) => return Ok(self.discard(DropReason::Malformed(e))),
        };
        self.demote_to_layer2(
            transport,
            next_hop,
            egress.as_ref().map(|name| name.as_str()),
            bytes,
        )
    }

    pub fn ping(
        &mut self,
        transport: &dyn Transport,
        dst: Ipv4Addr,
    ) -> Result<Disposition, InvariantViolation> {
        self.originate(transport, IPv4Header::PROTO_ICMP, dst, Vec::new())
    }

    /// Sends an ICMP packet for `dst` wrapped in an IP-in-IP packet addressed
    /// to `tunnel_end`.
    pub fn ping_tunnel(
        &mut self,
        transport: &dyn Transport,
        dst: Ipv4Addr,
        tunnel_end: Ipv4Addr,
    ) -> Result<Disposition, InvariantViolation> {
        let src = self.loopback().unwrap_or(Ipv4Addr::UNSPECIFIED);
        let inner = IPv4Datagram::new(src, dst, IPv4Header::PROTO_ICMP, Vec::new());
        let inner = match inner.try_serialize() {
            Ok(bytes) => bytes,
            Err(e) => return Ok(self.discard(DropReason::Malformed(e))),
        };
        self.originate(transport, IPv4Header::PROTO_IPIP, tunnel_end, inner)
    }

    /// Hands an IP datagram to Layer 2 for `next_hop`. Without an explicit
    /// egress the interface on the next hop's subnet is used.
    pub(crate) fn demote_to_layer2(
        &mut self,
        transport: &dyn Transport,
        next_hop: Ipv4Addr,
        egress: Option<&str>,
        datagram: Vec<u8>,
    ) -> Result<Disposition, InvariantViolation> {
        let idx = match egress {
            Some(name) => match self.interface_index(name) {
                Some(idx) => idx,
                None => return Ok(self.discard(DropReason::NoEgressInterface(next_hop))),
            },
            None => {
                if self.loopback() == Some(next_hop) {
                    return self.promote_to_layer3(transport, datagram);
                }
                match self.subnet_interface_index(next_hop) {
                    Some(idx) => idx,
                    None => {
                        debug!("{}: no eligible subnet for {}", self.name(), next_hop);
                        return Ok(self.discard(DropReason::NoEgressInterface(next_hop)));
                    }
                }
            }
        };

        let intf = &self.interfaces[idx];
        let src = intf.mac();
        let ifname = intf.name().clone();

        if intf.ip().map(|cfg| cfg.ip) == Some(next_hop) {
            let frame = EthernetFrame::new(
                EthernetHeader::new(src, src, EthernetHeader::TYPE_IPV4),
                datagram,
            );
            self.transmit_to_self(transport, idx, &frame);
            return Ok(Disposition::LoopedBack);
        }

        let resolved = self
            .arp_table
            .lookup(next_hop)
            .filter(|entry| entry.sane)
            .map(|entry| entry.mac);
        match resolved {
            Some(dst) => {
                let out = Transmit {
                    interface: ifname,
                    frame: EthernetFrame::new(
                        EthernetHeader::new(dst, src, EthernetHeader::TYPE_IPV4),
                        datagram,
                    ),
                };
                if self.transmit(transport, out) {
                    Ok(Disposition::Forwarded { next_hop })
                } else {
                    Ok(self.discard(DropReason::TransportFailed))
                }
            }
            None => {
                let release_on = ifname.clone();
                let release: ArpRelease = Box::new(move |entry: &ArpEntry| Transmit {
                    interface: release_on,
                    frame: EthernetFrame::new(
                        EthernetHeader::new(entry.mac, src, EthernetHeader::TYPE_IPV4),
                        datagram,
                    ),
                });
                // Only the first packet for an unresolved next hop asks for it.
                if self.arp_table.create_pending(next_hop, ifname, Some(release))?
                    == PendingOutcome::Created
                {
                    self.send_arp_request(transport, idx, next_hop);
                }
                Ok(Disposition::AwaitingArp { next_hop })
            }
        }
    }
}
