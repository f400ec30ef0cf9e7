use crate::{ConfigError, DeviceFlags, L2Mode, Topology};

use std::net::Ipv4Addr;

pub const PRESET_NAMES: [&str; 5] = ["linear", "cyclic", "dual-switch", "linear-routing", "square"];

/// Builds a named preset. Presets configure addresses, L2 modes and VLANs
/// but no static routes.
pub fn build_preset(name: &str) -> Result<Topology, ConfigError> {
    match name {
        "linear" => linear(),
        "cyclic" => cyclic(),
        "dual-switch" => dual_switch(),
        "linear-routing" => linear_routing(),
        "square" => square(),
        other => Err(ConfigError::UnknownTopology(other.to_string())),
    }
}

fn ip(s: [u8; 4]) -> Ipv4Addr {
    Ipv4Addr::from(s)
}

fn routers(topo: &mut Topology, names: &[&str]) -> Result<(), ConfigError> {
    for name in names {
        topo.add_node(name)?;
        topo.node_mut(name)?.set_flags(DeviceFlags::L3_ROUTER);
    }
    Ok(())
}

/// node1 -- node2 -- node3
fn linear() -> Result<Topology, ConfigError> {
    let mut topo = Topology::new("Linear topology");
    routers(&mut topo, &["node1", "node2", "node3"])?;
    topo.insert_link("node1", "eth0/0", "node2", "eth0/1", 1)?;
    topo.insert_link("node2", "eth0/2", "node3", "eth0/3", 1)?;

    let n1 = topo.node_mut("node1")?;
    n1.set_loopback(ip([122, 1, 1, 0]))?;
    n1.set_interface_ip("eth0/0", ip([20, 1, 1, 1]), 24)?;

    let n2 = topo.node_mut("node2")?;
    n2.set_loopback(ip([122, 1, 1, 1]))?;
    n2.set_interface_ip("eth0/1", ip([20, 1, 1, 2]), 24)?;
    n2.set_interface_ip("eth0/2", ip([30, 1, 1, 1]), 24)?;

    let n3 = topo.node_mut("node3")?;
    n3.set_loopback(ip([122, 1, 1, 2]))?;
    n3.set_interface_ip("eth0/3", ip([30, 1, 1, 2]), 24)?;
    Ok(topo)
}

/// The linear preset closed into a triangle.
fn cyclic() -> Result<Topology, ConfigError> {
    let mut topo = Topology::new("Cyclic topology");
    routers(&mut topo, &["node1", "node2", "node3"])?;
    topo.insert_link("node1", "eth0/0", "node2", "eth0/1", 1)?;
    topo.insert_link("node2", "eth0/2", "node3", "eth0/3", 1)?;
    topo.insert_link("node1", "eth0/4", "node3", "eth0/5", 1)?;

    let n1 = topo.node_mut("node1")?;
    n1.set_loopback(ip([122, 1, 1, 0]))?;
    n1.set_interface_ip("eth0/4", ip([40, 1, 1, 1]), 24)?;
    n1.set_interface_ip("eth0/0", ip([20, 1, 1, 1]), 24)?;

    let n2 = topo.node_mut("node2")?;
    n2.set_loopback(ip([122, 1, 1, 1]))?;
    n2.set_interface_ip("eth0/1", ip([20, 1, 1, 2]), 24)?;
    n2.set_interface_ip("eth0/2", ip([30, 1, 1, 1]), 24)?;

    let n3 = topo.node_mut("node3")?;
    n3.set_loopback(ip([122, 1, 1, 2]))?;
    n3.set_interface_ip("eth0/3", ip([30, 1, 1, 2]), 24)?;
    n3.set_interface_ip("eth0/5", ip([40, 1, 1, 2]), 24)?;
    Ok(topo)
}

/// Six hosts on 10.1.1.0/24 behind two switches joined by a trunk.
/// H1, H2 and H5 are in VLAN 10, H3 and H4 in VLAN 11. H6 sits on a VLAN 10
/// port of L2SW2.
fn dual_switch() -> Result<Topology, ConfigError> {
    let mut topo = Topology::new("Dual switch topology");
    let hosts = [
        ("H1", "eth0/1", 1),
        ("H2", "eth0/3", 2),
        ("H3", "eth0/4", 3),
        ("H4", "eth0/11", 4),
        ("H5", "eth0/8", 5),
        ("H6", "eth0/11", 6),
    ];
    for (name, _, n) in hosts {
        topo.add_node(name)?;
        topo.node_mut(name)?.set_loopback(ip([122, 1, 1, n]))?;
    }
    for sw in ["L2SW1", "L2SW2"] {
        topo.add_node(sw)?;
        topo.node_mut(sw)?.set_flags(DeviceFlags::L2_SWITCH);
    }

    topo.insert_link("H1", "eth0/1", "L2SW1", "eth0/2", 1)?;
    topo.insert_link("H2", "eth0/3", "L2SW1", "eth0/7", 1)?;
    topo.insert_link("H3", "eth0/4", "L2SW1", "eth0/6", 1)?;
    topo.insert_link("L2SW1", "eth0/5", "L2SW2", "eth0/7", 1)?;
    topo.insert_link("H5", "eth0/8", "L2SW2", "eth0/9", 1)?;
    topo.insert_link("H4", "eth0/11", "L2SW2", "eth0/12", 1)?;
    topo.insert_link("H6", "eth0/11", "L2SW2", "eth0/10", 1)?;

    for (name, intf, n) in hosts {
        topo.node_mut(name)?
            .set_interface_ip(intf, ip([10, 1, 1, n]), 24)?;
    }

    let sw1 = topo.node_mut("L2SW1")?;
    for (intf, vlan) in [("eth0/2", 10), ("eth0/7", 10), ("eth0/6", 11)] {
        sw1.set_l2_mode(intf, L2Mode::Access)?;
        sw1.set_vlan(intf, vlan)?;
    }
    sw1.set_l2_mode("eth0/5", L2Mode::Trunk)?;
    sw1.set_vlan("eth0/5", 10)?;
    sw1.set_vlan("eth0/5", 11)?;

    let sw2 = topo.node_mut("L2SW2")?;
    sw2.set_l2_mode("eth0/7", L2Mode::Trunk)?;
    sw2.set_vlan("eth0/7", 10)?;
    sw2.set_vlan("eth0/7", 11)?;
    for (intf, vlan) in [("eth0/9", 10), ("eth0/10", 10), ("eth0/12", 11)] {
        sw2.set_l2_mode(intf, L2Mode::Access)?;
        sw2.set_vlan(intf, vlan)?;
    }
    Ok(topo)
}

/// R1 -- R2 -- R3, three routers with loopbacks 122.1.1.1-3.
fn linear_routing() -> Result<Topology, ConfigError> {
    let mut topo = Topology::new("3 node linear topology");
    routers(&mut topo, &["R1", "R2", "R3"])?;
    topo.insert_link("R1", "eth0/1", "R2", "eth0/2", 1)?;
    topo.insert_link("R2", "eth0/3", "R3", "eth0/4", 1)?;

    let r1 = topo.node_mut("R1")?;
    r1.set_loopback(ip([122, 1, 1, 1]))?;
    r1.set_interface_ip("eth0/1", ip([10, 1, 1, 1]), 24)?;

    let r2 = topo.node_mut("R2")?;
    r2.set_loopback(ip([122, 1, 1, 2]))?;
    r2.set_interface_ip("eth0/2", ip([10, 1, 1, 2]), 24)?;
    r2.set_interface_ip("eth0/3", ip([11, 1, 1, 2]), 24)?;

    let r3 = topo.node_mut("R3")?;
    r3.set_loopback(ip([122, 1, 1, 3]))?;
    r3.set_interface_ip("eth0/4", ip([11, 1, 1, 1]), 24)?;
    Ok(topo)
}

/// Four routers in a ring.
fn square() -> Result<Topology, ConfigError> {
    let mut topo = Topology::new("Square topology");
    routers(&mut topo, &["R1", "R2", "R3", "R4"])?;
    topo.insert_link("R1", "eth0/0", "R2", "eth0/1", 1)?;
    topo.insert_link("R2", "eth0/2", "R3", "eth0/3", 1)?;
    topo.insert_link("R3", "eth0/4", "R4", "eth0/5", 1)?;
    topo.insert_link("R4", "eth0/6", "R1", "eth0/7", 1)?;

    let addrs = [
        ("R1", 1, [("eth0/0", [10, 1, 1, 1]), ("eth0/7", [40, 1, 1, 2])]),
        ("R2", 2, [("eth0/1", [10, 1, 1, 2]), ("eth0/2", [20, 1, 1, 1])]),
        ("R3", 3, [("eth0/3", [20, 1, 1, 2]), ("eth0/4", [30, 1, 1, 1])]),
        ("R4", 4, [("eth0/5", [30, 1, 1, 2]), ("eth0/6", [40, 1, 1, 1])]),
    ];
    for (name, lo, intfs) in addrs {
        let r = topo.node_mut(name)?;
        r.set_loopback(ip([122, 1, 1, lo]))?;
        for (intf, addr) in intfs {
            r.set_interface_ip(intf, ip(addr), 24)?;
        }
    }
    Ok(topo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_builds() {
        for name in PRESET_NAMES {
            let topo = build_preset(name).unwrap();
            assert!(!topo.nodes().is_empty(), "{}", name);
            for node in topo.nodes() {
                assert!(
                    node.routing_table().iter().all(|r| r.is_direct()),
                    "{} has static routes",
                    node.name()
                );
            }
        }
        assert_eq!(
            build_preset("mesh").unwrap_err(),
            ConfigError::UnknownTopology("mesh".into())
        );
    }

    #[test]
    fn dual_switch_ports() {
        let topo = dual_switch().unwrap();
        let sw1 = topo.node_by_name("L2SW1").unwrap();
        assert!(sw1.flags().contains(DeviceFlags::L2_SWITCH));
        let trunk = sw1.interface("eth0/5").unwrap();
        assert_eq!(trunk.l2_mode(), L2Mode::Trunk);
        assert_eq!(trunk.vlans(), &[10, 11]);
        assert_eq!(sw1.interface("eth0/6").unwrap().access_vlan(), Some(11));
        assert_eq!(topo.links().len(), 7);
    }

    #[test]
    fn square_links_form_a_ring() {
        let topo = square().unwrap();
        assert_eq!(topo.links().len(), 4);
        let r1 = topo.node_by_name("R1").unwrap();
        assert!(r1.owns_ip(Ipv4Addr::new(40, 1, 1, 2)));
        assert!(r1.routing_table().lookup_lpm(Ipv4Addr::new(10, 1, 1, 9)).is_some());
    }
}
