use crate::{AuxFrame, AuxFrameError, Interface, NodeMessage, TaggedError, Transport};

use anyhow::Context;
use crossbeam_channel::Sender;
use log::{debug, trace, warn};
use thiserror::Error;

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] TaggedError),
    #[error("Interface {0} is not linked to a peer")]
    NoPeer(String),
    #[error("Node #{0} no longer accepts frames")]
    ChannelClosed(usize),
    #[error(transparent)]
    Encode(#[from] AuxFrameError),
}

/// Wraps `frame` in the interface-name prefix the peer will use as its
/// ingress. Returns the peer's node index alongside.
fn encode_for_peer(egress: &Interface, frame: &[u8]) -> Result<(usize, Vec<u8>), TransportError> {
    let peer = egress
        .peer()
        .ok_or_else(|| TransportError::NoPeer(egress.name().to_string()))?;
    let bytes = AuxFrame::new(peer.interface.clone(), frame.to_vec()).try_serialize()?;
    Ok((peer.node.0, bytes))
}

fn encode_for_self(ingress: &Interface, frame: &[u8]) -> Result<(usize, Vec<u8>), TransportError> {
    let bytes = AuxFrame::new(ingress.name().clone(), frame.to_vec()).try_serialize()?;
    Ok((ingress.node().0, bytes))
}

/// Hands frames straight to the receiving node's inbox.
pub struct ChannelTransport {
    inboxes: Vec<Sender<NodeMessage>>,
}

impl ChannelTransport {
    /// `inboxes[i]` must feed the worker of node `i`.
    pub fn new(inboxes: Vec<Sender<NodeMessage>>) -> Self {
        Self { inboxes }
    }

    fn push(&self, node: usize, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.inboxes
            .get(node)
            .ok_or(TransportError::ChannelClosed(node))?
            .send(NodeMessage::Frame(bytes))
            .map_err(|_| TransportError::ChannelClosed(node))
    }
}

impl Transport for ChannelTransport {
    fn send(&self, egress: &Interface, frame: &[u8]) -> Result<(), TransportError> {
        let (node, bytes) = encode_for_peer(egress, frame)?;
        self.push(node, bytes)
    }

    fn send_to_self(&self, ingress: &Interface, frame: &[u8]) -> Result<(), TransportError> {
        let (node, bytes) = encode_for_self(ingress, frame)?;
        self.push(node, bytes)
    }
}

/// Hands out one loopback port per node, upward from a base.
#[derive(Debug)]
pub struct PortAllocator {
    last: AtomicU16,
}

impl PortAllocator {
    pub fn new(base: u16) -> Self {
        Self {
            last: AtomicU16::new(base),
        }
    }

    pub fn allocate(&self) -> u16 {
        self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

/// Sends frames as datagrams to the peer node's loopback port.
pub struct UdpTransport {
    socket: UdpSocket,
    ports: Vec<u16>,
}

impl UdpTransport {
    /// `ports[i]` is the port node `i` listens on.
    pub fn bind(ports: Vec<u16>) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
            .map_err(|e| TaggedError::new("bind", e))?;
        Ok(Self { socket, ports })
    }

    fn push(&self, node: usize, bytes: &[u8]) -> Result<(), TransportError> {
        let port = *self
            .ports
            .get(node)
            .ok_or(TransportError::ChannelClosed(node))?;
        self.socket
            .send_to(bytes, SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
            .map_err(|e| TaggedError::new("send_to", e))?;
        Ok(())
    }
}

impl Transport for UdpTransport {
    fn send(&self, egress: &Interface, frame: &[u8]) -> Result<(), TransportError> {
        let (node, bytes) = encode_for_peer(egress, frame)?;
        self.push(node, &bytes)
    }

    fn send_to_self(&self, ingress: &Interface, frame: &[u8]) -> Result<(), TransportError> {
        let (node, bytes) = encode_for_self(ingress, frame)?;
        self.push(node, &bytes)
    }
}

/// Binds `port` and forwards every datagram it receives into `inbox` until
/// `shutdown` is raised or the inbox closes.
pub fn spawn_udp_reader(
    node: &str,
    port: u16,
    inbox: Sender<NodeMessage>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
        .with_context(|| format!("binding port {} for node {}", port, node))?;
    socket
        .set_read_timeout(Some(poll_interval))
        .context("setting read timeout")?;

    let name = node.to_string();
    thread::Builder::new()
        .name(format!("udp-{}", name))
        .spawn(move || {
            let mut buf = vec![0u8; AuxFrame::MAX_BUFFER_SIZE];
            while !shutdown.load(Ordering::Relaxed) {
                let n = match socket.recv_from(&mut buf) {
                    Ok((n, _)) => n,
                    Err(e)
                        if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                    {
                        continue
                    }
                    Err(e) => {
                        warn!("{}: {}", name, TaggedError::new("recv_from", e));
                        continue;
                    }
                };
                trace!("{}: {} bytes on port {}", name, n, port);
                if inbox.send(NodeMessage::Frame(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            debug!("{}: reader on port {} stopped", name, port);
        })
        .context("spawning UDP reader")
}

#[cfg(test)]
pub use recording::*;

#[cfg(test)]
mod recording {
    use crate::{Interface, InterfaceName, Transport, TransportError};

    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentFrame {
        pub interface: InterfaceName,
        pub to_self: bool,
        /// The Ethernet frame, without the interface-name prefix.
        pub frame: Vec<u8>,
    }

    /// Records every frame instead of sending it.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<SentFrame>>,
    }

    impl RecordingTransport {
        pub fn take(&self) -> Vec<SentFrame> {
            let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *sent)
        }

        fn record(&self, interface: &Interface, to_self: bool, frame: &[u8]) {
            self.sent
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(SentFrame {
                    interface: interface.name().clone(),
                    to_self,
                    frame: frame.to_vec(),
                });
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, egress: &Interface, frame: &[u8]) -> Result<(), TransportError> {
            self.record(egress, false, frame);
            Ok(())
        }

        fn send_to_self(&self, ingress: &Interface, frame: &[u8]) -> Result<(), TransportError> {
            self.record(ingress, true, frame);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Topology;

    fn pair() -> Topology {
        let mut topo = Topology::new("pair");
        topo.add_node("A").unwrap();
        topo.add_node("B").unwrap();
        topo.add_node("C").unwrap();
        topo.insert_link("A", "eth0/0", "B", "eth0/1", 1).unwrap();
        topo
    }

    #[test]
    fn channel_send_prefixes_peer_interface() {
        let topo = pair();
        let (txs, rxs): (Vec<_>, Vec<_>) = (0..3).map(|_| crossbeam_channel::unbounded()).unzip();
        let transport = ChannelTransport::new(txs);

        let a = topo.node_by_name("A").unwrap();
        transport.send(a.interface("eth0/0").unwrap(), &[1, 2, 3]).unwrap();
        match rxs[1].try_recv().unwrap() {
            NodeMessage::Frame(bytes) => {
                let aux = AuxFrame::parse(bytes).unwrap();
                assert_eq!(aux.interface.as_str(), "eth0/1");
                assert_eq!(aux.frame, vec![1, 2, 3]);
            }
            _ => panic!("expected a frame"),
        }

        transport.send_to_self(a.interface("eth0/0").unwrap(), &[9]).unwrap();
        match rxs[0].try_recv().unwrap() {
            NodeMessage::Frame(bytes) => {
                assert_eq!(AuxFrame::parse(bytes).unwrap().interface.as_str(), "eth0/0");
            }
            _ => panic!("expected a frame"),
        }
        assert!(rxs[2].try_recv().is_err());
    }

    #[test]
    fn closed_inbox_is_reported() {
        let topo = pair();
        let (tx, rx) = crossbeam_channel::unbounded();
        let transport = ChannelTransport::new(vec![tx.clone(), tx]);
        drop(rx);
        let a = topo.node_by_name("A").unwrap();
        assert!(matches!(
            transport.send(a.interface("eth0/0").unwrap(), &[0]),
            Err(TransportError::ChannelClosed(1))
        ));
    }

    #[test]
    fn ports_count_up_from_base() {
        let ports = PortAllocator::new(4000);
        assert_eq!(ports.allocate(), 4001);
        assert_eq!(ports.allocate(), 4002);
    }

    #[test]
    fn recording_transport_drains() {
        let topo = pair();
        let wire = RecordingTransport::default();
        let b = topo.node_by_name("B").unwrap();
        wire.send(b.interface("eth0/1").unwrap(), &[7]).unwrap();
        let sent = wire.take();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].to_self);
        assert!(wire.take().is_empty());
    }
}
