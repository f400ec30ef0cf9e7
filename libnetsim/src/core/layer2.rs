use crate::{
    Admission, ArpMessage, AuxFrame, Buffer, Disposition, DropReason, EthernetFrame,
    EthernetHeader, InvariantViolation, Node, Transmit, Transport, ETHERNET_BROADCAST,
};

use log::{debug, info, trace};

use std::net::Ipv4Addr;

impl Node {
    /// Entry point for bytes off the wire: an auxiliary interface-name
    /// prefix followed by an Ethernet frame.
    pub fn deliver(
        &mut self,
        transport: &dyn Transport,
        bytes: Vec<u8>,
    ) -> Result<Disposition, InvariantViolation> {
        let aux = match AuxFrame::parse(bytes) {
            Ok(aux) => aux,
            Err(e) => {
                debug!("{}: unreadable wire buffer: {}", self.name(), e);
                self.stats.frames_received += 1;
                return Ok(self.discard(DropReason::BadWireBuffer(e)));
            }
        };
        self.receive_frame(transport, aux.interface.as_str(), aux.frame)
    }

    /// Runs admission on `ingress` and dispatches the frame to switching,
    /// ARP, or Layer 3.
    pub fn receive_frame(
        &mut self,
        transport: &dyn Transport,
        ingress: &str,
        bytes: Vec<u8>,
    ) -> Result<Disposition, InvariantViolation> {
        self.stats.frames_received += 1;
        let idx = match self.interface_index(ingress) {
            Some(idx) => idx,
            None => return Ok(self.discard(DropReason::UnknownIngress(ingress.to_string()))),
        };
        let mut frame = EthernetFrame::default();
        if let Err(e) = frame.parse(Buffer::from(bytes)) {
            return Ok(self.discard(DropReason::Malformed(e)));
        }

        let tag_with = match self.interfaces[idx].qualify(frame.header()) {
            Admission::Accept { tag_with } => tag_with,
            Admission::Reject(reason) => {
                debug!(
                    "{}: {} rejected frame ({}): {}",
                    self.name(),
                    ingress,
                    frame.header(),
                    reason
                );
                return Ok(self.discard(reason));
            }
        };
        self.stats.frames_accepted += 1;
        trace!("{}: {} accepted frame ({})", self.name(), ingress, frame.header());

        if self.interfaces[idx].is_switchport() {
            if let Some(vlan) = tag_with {
                frame.tag(vlan);
            }
            return self.switch_frame(transport, idx, frame);
        }

        match frame.header().ty {
            EthernetHeader::TYPE_ARP => Ok(self.process_arp(transport, idx, frame)),
            EthernetHeader::TYPE_IPV4 => self.promote_to_layer3(transport, frame.into_payload()),
            other => Ok(self.discard(DropReason::UnsupportedEtherType(other))),
        }
    }

    fn process_arp(
        &mut self,
        transport: &dyn Transport,
        idx: usize,
        frame: EthernetFrame,
    ) -> Disposition {
        let mut msg = ArpMessage::default();
        if let Err(e) = msg.parse(Buffer::from(frame.into_payload())) {
            return self.discard(DropReason::Malformed(e));
        }

        let intf = &self.interfaces[idx];
        if msg.is_request() {
            let own = match intf.ip() {
                Some(cfg) if cfg.ip == msg.target_ip_address => cfg.ip,
                _ => return self.discard(DropReason::ArpNotForUs(msg.target_ip_address)),
            };
            debug!(
                "{}: ARP request for {} on {}, replying to {}",
                self.name(),
                own,
                intf.name(),
                msg.sender_ip_address
            );
            let reply = ArpMessage::reply_to(&msg, intf.mac(), own);
            let out = Transmit {
                interface: intf.name().clone(),
                frame: EthernetFrame::new(
                    EthernetHeader::new(
                        msg.sender_ethernet_address,
                        intf.mac(),
                        EthernetHeader::TYPE_ARP,
                    ),
                    reply.serialize(),
                ),
            };
            self.transmit(transport, out);
            return Disposition::ArpReplied;
        }

        let ingress = intf.name().clone();
        let released = match self.arp_table.resolve_from_reply(
            msg.sender_ip_address,
            msg.sender_ethernet_address,
            ingress,
        ) {
            Some(released) => released,
            None => return self.discard(DropReason::UnsolicitedArpReply(msg.sender_ip_address)),
        };
        self.stats.arp_resolutions += 1;
        info!(
            "{}: ARP resolved {} -> {}, releasing {} frame(s)",
            self.name(),
            msg.sender_ip_address,
            msg.sender_ethernet_address,
            released.len()
        );
        let count = released.len();
        for out in released {
            self.transmit(transport, out);
        }
        Disposition::ArpResolved { released: count }
    }

    /// Broadcasts an ARP request for `target` out of interface `idx`.
    pub(crate) fn send_arp_request(
        &mut self,
        transport: &dyn Transport,
        idx: usize,
        target: Ipv4Addr,
    ) -> bool {
        let intf = &self.interfaces[idx];
        let sender_ip = intf.ip().map_or(Ipv4Addr::UNSPECIFIED, |cfg| cfg.ip);
        let request = ArpMessage::request(intf.mac(), sender_ip, target);
        let out = Transmit {
            interface: intf.name().clone(),
            frame: EthernetFrame::new(
                EthernetHeader::new(ETHERNET_BROADCAST, intf.mac(), EthernetHeader::TYPE_ARP),
                request.serialize(),
            ),
        };
        debug!("{}: ARP request for {} on {}", self.name(), target, out.interface);
        self.transmit(transport, out)
    }

    /// Operator-triggered resolution. Leaves a pending placeholder behind so
    /// the reply is recognised.
    pub fn resolve_arp(
        &mut self,
        transport: &dyn Transport,
        target: Ipv4Addr,
    ) -> Result<Disposition, InvariantViolation> {
        let idx = match self.subnet_interface_index(target) {
            Some(idx) => idx,
            None => return Ok(self.discard(DropReason::NoEgressInterface(target))),
        };
        if self.arp_table.lookup(target).is_none() {
            let ifname = self.interfaces[idx].name().clone();
            self.arp_table.create_pending(target, ifname, None)?;
        }
        self.send_arp_request(transport, idx, target);
        Ok(Disposition::ArpRequested { target })
    }

    fn switch_frame(
        &mut self,
        transport: &dyn Transport,
        ingress: usize,
        frame: EthernetFrame,
    ) -> Result<Disposition, InvariantViolation> {
        let header = frame.header().clone();
        let ingress_name = self.interfaces[ingress].name().clone();
        if self.mac_table.learn(header.src, &ingress_name) {
            debug!("{}: learned {} on {}", self.name(), header.src, ingress_name);
        }

        let known = if header.dst.is_broadcast() {
            None
        } else {
            self.mac_table
                .lookup(&header.dst)
                .and_then(|name| self.interface_index(name.as_str()))
        };

        let transmitted = match known {
            Some(egress) => usize::from(self.switch_send_out(transport, egress, &frame)?),
            None => self.flood(transport, ingress, &frame)?,
        };
        Ok(Disposition::Switched { transmitted })
    }

    /// Sends a copy of `frame` out of every interface but `excluded`.
    fn flood(
        &mut self,
        transport: &dyn Transport,
        excluded: usize,
        frame: &EthernetFrame,
    ) -> Result<usize, InvariantViolation> {
        let mut sent = 0;
        for idx in 0..self.interfaces.len() {
            if idx != excluded && self.switch_send_out(transport, idx, frame)? {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Emits a switched frame if the egress port's mode and VLANs allow it.
    fn switch_send_out(
        &mut self,
        transport: &dyn Transport,
        idx: usize,
        frame: &EthernetFrame,
    ) -> Result<bool, InvariantViolation> {
        let intf = &self.interfaces[idx];
        if intf.is_ip_configured() {
            return Err(InvariantViolation::SwitchOutOfIpInterface {
                node: self.name().to_string(),
                interface: intf.name().to_string(),
            });
        }
        let out = match intf.egress_frame(frame) {
            Some(out) => Transmit {
                interface: intf.name().clone(),
                frame: out,
            },
            None => return Ok(false),
        };
        Ok(self.transmit(transport, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EthernetAddress, L2Mode, RecordingTransport, Topology};

    fn switch_with_hosts(ports: usize) -> Topology {
        let mut topo = Topology::new("switch");
        topo.add_node("SW").unwrap();
        for i in 0..ports {
            let host = format!("H{}", i);
            topo.add_node(&host).unwrap();
            topo.insert_link(&host, "eth0/0", "SW", &format!("eth0/{}", i + 1), 1)
                .unwrap();
            let sw = topo.node_mut("SW").unwrap();
            sw.set_l2_mode(&format!("eth0/{}", i + 1), L2Mode::Access).unwrap();
            sw.set_vlan(&format!("eth0/{}", i + 1), 10).unwrap();
        }
        topo
    }

    fn frame(dst: EthernetAddress, src: EthernetAddress) -> Vec<u8> {
        EthernetFrame::new(EthernetHeader::new(dst, src, EthernetHeader::TYPE_IPV4), vec![0xab; 8])
            .try_serialize()
            .unwrap()
    }

    const HOST_A: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0xa]);
    const HOST_B: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0xb]);

    #[test]
    fn unknown_unicast_floods_to_all_other_ports() {
        let mut topo = switch_with_hosts(4);
        let sw = topo.node_mut("SW").unwrap();
        let wire = RecordingTransport::default();

        let d = sw.receive_frame(&wire, "eth0/1", frame(HOST_B, HOST_A)).unwrap();
        assert_eq!(d, Disposition::Switched { transmitted: 3 });

        let sent = wire.take();
        let names: Vec<_> = sent.iter().map(|s| s.interface.as_str().to_string()).collect();
        assert_eq!(names, vec!["eth0/2", "eth0/3", "eth0/4"]);
        for s in &sent {
            let mut out = EthernetFrame::default();
            out.parse(Buffer::from(s.frame.clone())).unwrap();
            assert!(!out.is_tagged());
        }
    }

    #[test]
    fn learned_destination_gets_one_copy() {
        let mut topo = switch_with_hosts(3);
        let sw = topo.node_mut("SW").unwrap();
        let wire = RecordingTransport::default();

        sw.receive_frame(&wire, "eth0/3", frame(ETHERNET_BROADCAST, HOST_B)).unwrap();
        wire.take();
        let d = sw.receive_frame(&wire, "eth0/1", frame(HOST_B, HOST_A)).unwrap();
        assert_eq!(d, Disposition::Switched { transmitted: 1 });
        assert_eq!(wire.take()[0].interface.as_str(), "eth0/3");
        assert_eq!(sw.mac_table().len(), 2);
    }

    #[test]
    fn flooding_respects_egress_vlans() {
        let mut topo = switch_with_hosts(3);
        let sw = topo.node_mut("SW").unwrap();
        sw.set_vlan("eth0/3", 20).unwrap();
        let wire = RecordingTransport::default();

        let d = sw
            .receive_frame(&wire, "eth0/1", frame(ETHERNET_BROADCAST, HOST_A))
            .unwrap();
        assert_eq!(d, Disposition::Switched { transmitted: 1 });
        assert_eq!(wire.take()[0].interface.as_str(), "eth0/2");
    }

    #[test]
    fn switching_into_ip_interface_is_fatal() {
        let mut topo = switch_with_hosts(2);
        let sw = topo.node_mut("SW").unwrap();
        sw.clear_l2_mode("eth0/2").unwrap();
        sw.set_interface_ip("eth0/2", Ipv4Addr::new(10, 0, 0, 1), 24).unwrap();
        let wire = RecordingTransport::default();

        let err = sw
            .receive_frame(&wire, "eth0/1", frame(ETHERNET_BROADCAST, HOST_A))
            .unwrap_err();
        assert!(matches!(err, InvariantViolation::SwitchOutOfIpInterface { .. }));
    }

    #[test]
    fn arp_request_answered_only_for_own_address() {
        let mut topo = Topology::new("pair");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();
        let b = topo.node_mut("B").unwrap();
        b.set_interface_ip("eth0/1", Ipv4Addr::new(10, 0, 0, 2), 24).unwrap();
        let wire = RecordingTransport::default();

        let ask = |target| {
            EthernetFrame::new(
                EthernetHeader::new(ETHERNET_BROADCAST, HOST_A, EthernetHeader::TYPE_ARP),
                ArpMessage::request(HOST_A, Ipv4Addr::new(10, 0, 0, 1), target).serialize(),
            )
            .try_serialize()
            .unwrap()
        };

        let d = b.receive_frame(&wire, "eth0/1", ask(Ipv4Addr::new(10, 0, 0, 9))).unwrap();
        assert_eq!(d, Disposition::Dropped(DropReason::ArpNotForUs(Ipv4Addr::new(10, 0, 0, 9))));
        assert!(wire.take().is_empty());

        let d = b.receive_frame(&wire, "eth0/1", ask(Ipv4Addr::new(10, 0, 0, 2))).unwrap();
        assert_eq!(d, Disposition::ArpReplied);
        let sent = wire.take();
        let mut out = EthernetFrame::default();
        out.parse(Buffer::from(sent[0].frame.clone())).unwrap();
        assert_eq!(out.header().dst, HOST_A);
        let mut reply = ArpMessage::default();
        reply.parse(Buffer::from(out.payload().to_vec())).unwrap();
        assert!(reply.is_reply());
        assert_eq!(reply.sender_ip_address, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn resolution_between_two_ip_interfaces() {
        let mut topo = Topology::new("pair");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();
        topo.node_mut("A")
            .unwrap()
            .set_interface_ip("eth0/0", Ipv4Addr::new(10, 0, 0, 1), 24)
            .unwrap();
        topo.node_mut("B")
            .unwrap()
            .set_interface_ip("eth0/1", Ipv4Addr::new(10, 0, 0, 2), 24)
            .unwrap();
        let b_mac = topo.node_by_name("B").unwrap().interface("eth0/1").unwrap().mac();
        let wire = RecordingTransport::default();

        let a = topo.node_mut("A").unwrap();
        assert_eq!(
            a.resolve_arp(&wire, Ipv4Addr::new(10, 0, 0, 2)).unwrap(),
            Disposition::ArpRequested {
                target: Ipv4Addr::new(10, 0, 0, 2)
            }
        );
        let request = wire.take().remove(0).frame;

        let b = topo.node_mut("B").unwrap();
        assert_eq!(b.receive_frame(&wire, "eth0/1", request).unwrap(), Disposition::ArpReplied);
        let reply = wire.take().remove(0).frame;

        let a = topo.node_mut("A").unwrap();
        assert_eq!(
            a.receive_frame(&wire, "eth0/0", reply).unwrap(),
            Disposition::ArpResolved { released: 0 }
        );
        let entry = a.arp_table().lookup(Ipv4Addr::new(10, 0, 0, 2)).unwrap();
        assert!(entry.sane);
        assert_eq!(entry.mac, b_mac);
        assert_eq!(entry.interface.as_str(), "eth0/0");
        assert_eq!(a.stats().arp_resolutions, 1);
    }

    #[test]
    fn unsolicited_reply_is_dropped() {
        let mut topo = Topology::new("pair");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();
        let b = topo.node_mut("B").unwrap();
        b.set_interface_ip("eth0/1", Ipv4Addr::new(10, 0, 0, 2), 24).unwrap();
        let own = b.interface("eth0/1").unwrap().mac();
        let wire = RecordingTransport::default();

        let req = ArpMessage::request(own, Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1));
        let reply = ArpMessage::reply_to(&req, HOST_A, Ipv4Addr::new(10, 0, 0, 1));
        let bytes = EthernetFrame::new(
            EthernetHeader::new(own, HOST_A, EthernetHeader::TYPE_ARP),
            reply.serialize(),
        )
        .try_serialize()
        .unwrap();
        let d = b.receive_frame(&wire, "eth0/1", bytes).unwrap();
        assert_eq!(
            d,
            Disposition::Dropped(DropReason::UnsolicitedArpReply(Ipv4Addr::new(10, 0, 0, 1)))
        );
        assert!(b.arp_table().is_empty());
    }

    #[test]
    fn malformed_and_misaddressed_input_is_counted() {
        let mut topo = switch_with_hosts(1);
        let sw = topo.node_mut("SW").unwrap();
        let wire = RecordingTransport::default();
        assert!(matches!(
            sw.receive_frame(&wire, "eth0/1", vec![1, 2, 3]).unwrap(),
            Disposition::Dropped(DropReason::Malformed(_))
        ));
        assert!(matches!(
            sw.receive_frame(&wire, "eth9/9", frame(HOST_B, HOST_A)).unwrap(),
            Disposition::Dropped(DropReason::UnknownIngress(_))
        ));
        assert!(matches!(
            sw.deliver(&wire, vec![0; 4]).unwrap(),
            Disposition::Dropped(_)
        ));
        assert_eq!(sw.stats().frames_dropped, 3);
        assert_eq!(sw.stats().frames_received, 3);
    }
}
