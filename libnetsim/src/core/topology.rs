use crate::{ConfigError, EthernetAddress, Interface, InterfaceName, Node};

use std::fmt::{self, Display, Formatter};

/// Index of a node inside its [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub usize);

/// One end of a link: a node and the name of its interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: NodeId,
    pub interface: InterfaceName,
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}:{}", self.node.0, self.interface)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub ends: [Endpoint; 2],
    pub cost: u32,
}

/// Owns every node and link. Nodes refer to each other only by [`NodeId`].
#[derive(Debug, Default)]
pub struct Topology {
    name: String,
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl Topology {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_node(&mut self, name: &str) -> Result<NodeId, ConfigError> {
        if self.node_id(name).is_some() {
            return Err(ConfigError::DuplicateNode(name.to_string()));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, name));
        Ok(id)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name() == name).map(Node::id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Result<&Node, ConfigError> {
        self.nodes
            .iter()
            .find(|n| n.name() == name)
            .ok_or_else(|| ConfigError::UnknownNode(name.to_string()))
    }

    pub fn node_mut(&mut self, name: &str) -> Result<&mut Node, ConfigError> {
        self.nodes
            .iter_mut()
            .find(|n| n.name() == name)
            .ok_or_else(|| ConfigError::UnknownNode(name.to_string()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Creates an interface on each node and joins them. Both interfaces get
    /// a fresh MAC.
    pub fn insert_link(
        &mut self,
        node_a: &str,
        if_a: &str,
        node_b: &str,
        if_b: &str,
        cost: u32,
    ) -> Result<LinkId, ConfigError> {
        let a = self
            .node_id(node_a)
            .ok_or_else(|| ConfigError::UnknownNode(node_a.to_string()))?;
        let b = self
            .node_id(node_b)
            .ok_or_else(|| ConfigError::UnknownNode(node_b.to_string()))?;
        if a == b {
            return Err(ConfigError::SelfLink);
        }
        let name_a = InterfaceName::new(if_a)?;
        let name_b = InterfaceName::new(if_b)?;
        self.nodes[a.0].check_new_interface(&name_a)?;
        self.nodes[b.0].check_new_interface(&name_b)?;

        let link = LinkId(self.links.len());
        let end_a = Endpoint {
            node: a,
            interface: name_a.clone(),
        };
        let end_b = Endpoint {
            node: b,
            interface: name_b.clone(),
        };

        let mut intf_a = Interface::new(
            name_a,
            a,
            EthernetAddress::derive(if_a, self.nodes[a.0].name()),
        );
        intf_a.attach(link, end_b.clone());
        let mut intf_b = Interface::new(
            name_b,
            b,
            EthernetAddress::derive(if_b, self.nodes[b.0].name()),
        );
        intf_b.attach(link, end_a.clone());

        self.nodes[a.0].push_interface(intf_a);
        self.nodes[b.0].push_interface(intf_b);
        self.links.push(Link {
            ends: [end_a, end_b],
            cost,
        });
        Ok(link)
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

impl Display for Topology {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Topology: {}", self.name)?;
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        for link in &self.links {
            let [a, b] = &link.ends;
            writeln!(
                f,
                "Link: {}:{} <-> {}:{} (cost {})",
                self.nodes[a.node.0].name(),
                a.interface,
                self.nodes[b.node.0].name(),
                b.interface,
                link.cost
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_wire_peers_both_ways() {
        let mut topo = Topology::new("t");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();

        let a = topo.node_by_name("A").unwrap();
        let peer = a.interface("eth0/0").unwrap().peer().unwrap();
        assert_eq!(peer.node, topo.node_id("B").unwrap());
        assert_eq!(peer.interface.as_str(), "eth0/1");

        let b = topo.node_by_name("B").unwrap();
        assert_eq!(b.interface("eth0/1").unwrap().peer().unwrap().node, a.id());
        assert_eq!(topo.links().len(), 1);
    }

    #[test]
    fn rejects_duplicates_and_unknowns() {
        let mut topo = Topology::new("t");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        assert_eq!(
            topo.add_node("A"),
            Err(ConfigError::DuplicateNode("A".into()))
        );
        assert_eq!(
            topo.insert_link("A", "eth0/0", "C", "eth0/1", 1),
            Err(ConfigError::UnknownNode("C".into()))
        );
        assert_eq!(
            topo.insert_link("A", "eth0/0", "A", "eth0/1", 1),
            Err(ConfigError::SelfLink)
        );
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();
        assert!(matches!(
            topo.insert_link("A", "eth0/0", "B", "eth0/2", 1),
            Err(ConfigError::DuplicateInterface { .. })
        ));
        assert_eq!(topo.node_by_name("B").unwrap().interfaces().len(), 1);
    }

    #[test]
    fn slots_are_bounded() {
        let mut topo = Topology::new("t");
        topo.add_node("hub").unwrap();
        for i in 0..Node::MAX_INTERFACES {
            let leaf = format!("leaf{}", i);
            topo.add_node(&leaf).unwrap();
            topo.insert_link("hub", &format!("eth0/{}", i), &leaf, "eth0/0", 1)
                .unwrap();
        }
        topo.add_node("extra").unwrap();
        assert_eq!(
            topo.insert_link("hub", "eth1/0", "extra", "eth0/0", 1),
            Err(ConfigError::InterfaceSlotsFull("hub".into()))
        );
    }
}
