use crate::{
    spawn_udp_reader, spawn_worker, ChannelTransport, Command, CommandError, Node, NodeMessage,
    PortAllocator, Reply, SimConfig, Topology, Transport, TransportKind, UdpTransport,
};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use log::{error, info};
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("No node named {0}")]
    UnknownNode(String),
    #[error("Node {0} is no longer running")]
    NodeGone(String),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// A running topology: one worker thread per node plus, for the UDP
/// transport, one socket reader per node.
pub struct Simulation {
    name: String,
    names: Vec<String>,
    links: Vec<String>,
    inboxes: Vec<Sender<NodeMessage>>,
    workers: Vec<JoinHandle<Node>>,
    readers: Vec<JoinHandle<()>>,
    reader_shutdown: Arc<AtomicBool>,
}

impl Simulation {
    pub fn start(topology: Topology, config: &SimConfig) -> anyhow::Result<Self> {
        let name = topology.name().to_string();
        let names: Vec<String> = topology.nodes().iter().map(|n| n.name().to_string()).collect();
        let links = topology
            .links()
            .iter()
            .map(|link| {
                let [a, b] = &link.ends;
                format!(
                    "{}:{} <-> {}:{} (cost {})",
                    names[a.node.0], a.interface, names[b.node.0], b.interface, link.cost
                )
            })
            .collect();

        let (inboxes, outboxes): (Vec<_>, Vec<_>) = names
            .iter()
            .map(|_| crossbeam_channel::unbounded::<NodeMessage>())
            .unzip();

        let mut sim = Self {
            name,
            names,
            links,
            inboxes,
            workers: Vec::new(),
            readers: Vec::new(),
            reader_shutdown: Arc::new(AtomicBool::new(false)),
        };
        if let Err(e) = sim.launch(topology, outboxes, config) {
            error!("{}: start failed: {:#}", sim.name, e);
            sim.halt();
            return Err(e);
        }
        info!(
            "{}: {} nodes running over {} transport",
            sim.name,
            sim.names.len(),
            config.transport
        );
        Ok(sim)
    }

    /// Spawns the readers and workers. Whatever started before a failure
    /// stays recorded in `self` so it can be stopped.
    fn launch(
        &mut self,
        topology: Topology,
        outboxes: Vec<Receiver<NodeMessage>>,
        config: &SimConfig,
    ) -> anyhow::Result<()> {
        let transport: Arc<dyn Transport> = match config.transport {
            TransportKind::Channel => Arc::new(ChannelTransport::new(self.inboxes.clone())),
            TransportKind::Udp => {
                let allocator = PortAllocator::new(config.base_port);
                let ports: Vec<u16> = self.names.iter().map(|_| allocator.allocate()).collect();
                for ((node, port), inbox) in self.names.iter().zip(&ports).zip(&self.inboxes) {
                    self.readers.push(spawn_udp_reader(
                        node,
                        *port,
                        inbox.clone(),
                        config.poll_interval,
                        Arc::clone(&self.reader_shutdown),
                    )?);
                }
                Arc::new(UdpTransport::bind(ports).context("binding UDP send socket")?)
            }
        };

        for (node, outbox) in topology.into_nodes().into_iter().zip(outboxes) {
            self.workers.push(spawn_worker(node, Arc::clone(&transport), outbox)?);
        }
        Ok(())
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `cmd` on the named node's worker and waits for its answer.
    pub fn execute(&self, node: &str, cmd: Command) -> Result<Reply, SimError> {
        let idx = self
            .names
            .iter()
            .position(|n| n == node)
            .ok_or_else(|| SimError::UnknownNode(node.to_string()))?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.inboxes[idx]
            .send(NodeMessage::Command(cmd, tx))
            .map_err(|_| SimError::NodeGone(node.to_string()))?;
        let result = rx.recv().map_err(|_| SimError::NodeGone(node.to_string()))?;
        Ok(result?)
    }

    /// Node summaries, fetched from the workers, followed by the links.
    pub fn topology_summary(&self) -> String {
        let mut out = format!("Topology: {}\n", self.name);
        for node in &self.names {
            match self.execute(node, Command::ShowNode) {
                Ok(Reply::Text(text)) => out.push_str(&text),
                Ok(_) => {}
                Err(e) => out.push_str(&format!("Node: {} ({})\n", node, e)),
            }
        }
        for link in &self.links {
            out.push_str(link);
            out.push('\n');
        }
        out
    }

    /// Stops every thread and returns the nodes in their final state. A node
    /// whose worker panicked is missing from the result.
    pub fn shutdown(mut self) -> Vec<Node> {
        self.halt()
    }

    /// Stops and joins every reader and worker started so far.
    fn halt(&mut self) -> Vec<Node> {
        self.stop_readers();
        for inbox in &self.inboxes {
            let _ = inbox.send(NodeMessage::Shutdown);
        }
        std::mem::take(&mut self.workers)
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(node) => Some(node),
                Err(_) => {
                    error!("{}: a node worker panicked", self.name);
                    None
                }
            })
            .collect()
    }

    fn stop_readers(&mut self) {
        self.reader_shutdown.store(true, Ordering::Relaxed);
        for reader in std::mem::take(&mut self.readers) {
            let _ = reader.join();
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.stop_readers();
        if !self.workers.is_empty() {
            for inbox in &self.inboxes {
                let _ = inbox.send(NodeMessage::Shutdown);
            }
        }
    }
}
