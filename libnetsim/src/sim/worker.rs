use crate::{ConfigError, Disposition, InvariantViolation, Node, NodeStats, Transport};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use itertools::Itertools;
use log::{debug, error, trace};
use thiserror::Error;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Operator actions, run on the node's own worker so they never race with
/// frame processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowNode,
    ShowArp,
    ShowMac,
    ShowRoutes,
    ShowInterfaces,
    ShowStats,
    ResolveArp(Ipv4Addr),
    Ping(Ipv4Addr),
    PingTunnel {
        dst: Ipv4Addr,
        tunnel_end: Ipv4Addr,
    },
    AddRoute {
        ip: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        interface: String,
    },
    DeleteRoute {
        ip: Ipv4Addr,
        prefix_len: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done,
    Text(String),
    Stats(NodeStats),
    Outcome(Disposition),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Node {node} has halted: {violation}")]
    Halted {
        node: String,
        violation: InvariantViolation,
    },
}

pub type CommandResult = Result<Reply, CommandError>;

pub enum NodeMessage {
    /// A wire buffer: interface-name prefix plus Ethernet frame.
    Frame(Vec<u8>),
    Command(Command, Sender<CommandResult>),
    Shutdown,
}

struct NodeWorker {
    node: Node,
    transport: Arc<dyn Transport>,
    inbox: Receiver<NodeMessage>,
    halted: Option<InvariantViolation>,
}

/// Starts the worker thread that owns `node`. The thread hands the node
/// back when it is told to shut down or its inbox closes.
pub fn spawn_worker(
    node: Node,
    transport: Arc<dyn Transport>,
    inbox: Receiver<NodeMessage>,
) -> anyhow::Result<JoinHandle<Node>> {
    let worker = NodeWorker {
        node,
        transport,
        inbox,
        halted: None,
    };
    thread::Builder::new()
        .name(format!("node-{}", worker.node.name()))
        .spawn(move || worker.run())
        .context("spawning node worker")
}

impl NodeWorker {
    fn run(mut self) -> Node {
        while let Ok(msg) = self.inbox.recv() {
            match msg {
                NodeMessage::Frame(bytes) => self.on_frame(bytes),
                NodeMessage::Command(cmd, reply) => {
                    let result = self.on_command(cmd);
                    // The requester may have given up waiting.
                    let _ = reply.send(result);
                }
                NodeMessage::Shutdown => break,
            }
        }
        debug!("{}: worker stopped", self.node.name());
        self.node
    }

    fn on_frame(&mut self, bytes: Vec<u8>) {
        if self.halted.is_some() {
            trace!("{}: halted, ignoring frame", self.node.name());
            return;
        }
        let transport = Arc::clone(&self.transport);
        let outcome = self.node.deliver(&*transport, bytes);
        match self.settle(outcome) {
            Ok(disposition) => trace!("{}: {:?}", self.node.name(), disposition),
            Err(e) => debug!("{}", e),
        }
    }

    fn on_command(&mut self, cmd: Command) -> CommandResult {
        if let Some(violation) = &self.halted {
            return Err(CommandError::Halted {
                node: self.node.name().to_string(),
                violation: violation.clone(),
            });
        }
        let transport = Arc::clone(&self.transport);
        let node = &mut self.node;
        let outcome = match cmd {
            Command::ShowNode => return Ok(Reply::Text(node.to_string())),
            Command::ShowArp => return Ok(Reply::Text(node.arp_table().to_string())),
            Command::ShowMac => return Ok(Reply::Text(node.mac_table().to_string())),
            Command::ShowRoutes => return Ok(Reply::Text(node.routing_table().to_string())),
            Command::ShowInterfaces => {
                return Ok(Reply::Text(node.interfaces().iter().join("\n")))
            }
            Command::ShowStats => return Ok(Reply::Stats(node.stats())),
            Command::AddRoute {
                ip,
                prefix_len,
                gateway,
                interface,
            } => {
                node.add_route(ip, prefix_len, gateway, &interface)?;
                return Ok(Reply::Done);
            }
            Command::DeleteRoute { ip, prefix_len } => {
                node.delete_route(ip, prefix_len)?;
                return Ok(Reply::Done);
            }
            Command::ResolveArp(ip) => node.resolve_arp(&*transport, ip),
            Command::Ping(dst) => node.ping(&*transport, dst),
            Command::PingTunnel { dst, tunnel_end } => {
                node.ping_tunnel(&*transport, dst, tunnel_end)
            }
        };
        self.settle(outcome).map(Reply::Outcome)
    }

    /// Halts the node on an invariant violation.
    fn settle(
        &mut self,
        outcome: Result<Disposition, InvariantViolation>,
    ) -> Result<Disposition, CommandError> {
        outcome.map_err(|violation| {
            error!("{}: halting: {}", self.node.name(), violation);
            self.halted = Some(violation.clone());
            CommandError::Halted {
                node: self.node.name().to_string(),
                violation,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{L2Mode, RecordingTransport, Topology};

    fn request(inbox: &Sender<NodeMessage>, cmd: Command) -> CommandResult {
        let (tx, rx) = crossbeam_channel::bounded(1);
        inbox.send(NodeMessage::Command(cmd, tx)).unwrap();
        rx.recv().unwrap()
    }

    fn single_node() -> Node {
        let mut topo = Topology::new("one");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();
        topo.insert_link("A", "eth0/2", "B", "eth0/3", 1).unwrap();
        let a = topo.node_mut("A").unwrap();
        a.set_interface_ip("eth0/0", Ipv4Addr::new(10, 0, 0, 1), 24).unwrap();
        topo.into_nodes().remove(0)
    }

    #[test]
    fn commands_are_answered_and_node_returned() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_worker(single_node(), Arc::new(RecordingTransport::default()), rx).unwrap();

        let routes = request(
            &tx,
            Command::AddRoute {
                ip: Ipv4Addr::new(20, 0, 0, 0),
                prefix_len: 8,
                gateway: Ipv4Addr::new(10, 0, 0, 2),
                interface: "eth0/0".into(),
            },
        );
        assert_eq!(routes, Ok(Reply::Done));
        assert!(matches!(
            request(&tx, Command::DeleteRoute {
                ip: Ipv4Addr::new(30, 0, 0, 0),
                prefix_len: 8
            }),
            Err(CommandError::Config(ConfigError::NoSuchRoute { .. }))
        ));
        match request(&tx, Command::ShowRoutes).unwrap() {
            Reply::Text(text) => assert!(text.contains("20.0.0.0/8")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            request(&tx, Command::ResolveArp(Ipv4Addr::new(10, 0, 0, 2))),
            Ok(Reply::Outcome(Disposition::ArpRequested {
                target: Ipv4Addr::new(10, 0, 0, 2)
            }))
        );

        tx.send(NodeMessage::Shutdown).unwrap();
        let node = handle.join().unwrap();
        assert_eq!(node.routing_table().len(), 2);
        assert_eq!(node.arp_table().len(), 1);
    }

    #[test]
    fn invariant_violation_halts_the_node() {
        let mut node = single_node();
        node.set_l2_mode("eth0/2", L2Mode::Access).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_worker(node, Arc::new(RecordingTransport::default()), rx).unwrap();

        // A broadcast arriving on the switchport floods toward the IP port.
        let frame = crate::EthernetFrame::new(
            crate::EthernetHeader::new(
                crate::ETHERNET_BROADCAST,
                crate::EthernetAddress([0x02, 0, 0, 0, 0, 1]),
                crate::EthernetHeader::TYPE_IPV4,
            ),
            vec![0; 20],
        )
        .try_serialize()
        .unwrap();
        let wire = crate::AuxFrame::new(crate::InterfaceName::new("eth0/2").unwrap(), frame)
            .try_serialize()
            .unwrap();
        tx.send(NodeMessage::Frame(wire)).unwrap();

        assert!(matches!(
            request(&tx, Command::ShowStats),
            Err(CommandError::Halted {
                violation: InvariantViolation::SwitchOutOfIpInterface { .. },
                ..
            })
        ));
        tx.send(NodeMessage::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
