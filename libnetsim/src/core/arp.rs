use crate::{EthernetAddress, InterfaceName, InvariantViolation, Transmit};

use log::warn;

use std::collections::{btree_map::Entry, BTreeMap, VecDeque};
use std::fmt::{self, Debug, Display, Formatter};
use std::mem;
use std::net::Ipv4Addr;

/// Finishes a queued frame once its next hop is resolved. The closure owns
/// the frame and the name of the interface it leaves through.
pub type ArpRelease = Box<dyn FnOnce(&ArpEntry) -> Transmit + Send>;

pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: EthernetAddress,
    pub interface: InterfaceName,
    /// Set once a reply confirmed `mac`; clear while a request is in flight.
    pub sane: bool,
    pending: VecDeque<ArpRelease>,
}

impl ArpEntry {
    pub fn resolved(ip: Ipv4Addr, mac: EthernetAddress, interface: InterfaceName) -> Self {
        Self {
            ip,
            mac,
            interface,
            sane: true,
            pending: VecDeque::new(),
        }
    }

    pub fn pending(ip: Ipv4Addr, interface: InterfaceName) -> Self {
        Self {
            ip,
            mac: EthernetAddress::ZERO,
            interface,
            sane: false,
            pending: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, release: ArpRelease) {
        self.pending.push_back(release);
    }

    #[inline(always)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn same_as(&self, other: &ArpEntry) -> bool {
        self.ip == other.ip
            && self.mac == other.mac
            && self.interface == other.interface
            && self.sane == other.sane
    }
}

impl Debug for ArpEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArpEntry")
            .field("ip", &self.ip)
            .field("mac", &self.mac)
            .field("interface", &self.interface)
            .field("sane", &self.sane)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Unchanged,
    /// The table kept its own entry for this IP and folded the incoming
    /// entry's queue into it.
    MergedPendingQueue(Ipv4Addr),
}

impl MergeOutcome {
    #[inline(always)]
    pub fn gained_information(&self) -> bool {
        matches!(self, MergeOutcome::Inserted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOutcome {
    Created,
    Queued,
}

#[derive(Debug, Default)]
pub struct ArpTable {
    entries: BTreeMap<Ipv4Addr, ArpEntry>,
}

impl ArpTable {
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&ArpEntry> {
        self.entries.get(&ip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArpEntry> {
        self.entries.values()
    }

    pub fn delete(&mut self, ip: Ipv4Addr) -> Option<ArpEntry> {
        self.entries.remove(&ip)
    }

    pub fn merge(&mut self, mut incoming: ArpEntry) -> MergeOutcome {
        let ip = incoming.ip;
        let existing = match self.entries.entry(ip) {
            Entry::Vacant(slot) => {
                slot.insert(incoming);
                return MergeOutcome::Inserted;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if existing.same_as(&incoming) && incoming.pending.is_empty() {
            return MergeOutcome::Unchanged;
        }

        match (existing.sane, incoming.sane) {
            (false, true) => {
                if !existing.pending.is_empty() {
                    warn!(
                        "ARP entry for {} replaced, {} queued frames dropped",
                        ip,
                        existing.pending.len()
                    );
                }
                *existing = incoming;
                MergeOutcome::Inserted
            }
            (true, true) => {
                existing.pending.append(&mut incoming.pending);
                MergeOutcome::MergedPendingQueue(ip)
            }
            (_, false) => {
                existing.mac = incoming.mac;
                existing.interface = incoming.interface;
                existing.pending.append(&mut incoming.pending);
                MergeOutcome::MergedPendingQueue(ip)
            }
        }
    }

    /// Makes sure a pending entry exists for `ip` and queues `release` on
    /// it. Finding a resolved entry here means the caller should have sent
    /// directly.
    pub fn create_pending(
        &mut self,
        ip: Ipv4Addr,
        interface: InterfaceName,
        release: Option<ArpRelease>,
    ) -> Result<PendingOutcome, InvariantViolation> {
        if let Some(entry) = self.entries.get_mut(&ip) {
            if entry.sane {
                return Err(InvariantViolation::ArpEntryNotPending(ip));
            }
            if let Some(release) = release {
                entry.enqueue(release);
            }
            return Ok(PendingOutcome::Queued);
        }

        let mut entry = ArpEntry::pending(ip, interface);
        if let Some(release) = release {
            entry.enqueue(release);
        }
        match self.merge(entry) {
            MergeOutcome::Inserted => Ok(PendingOutcome::Created),
            _ => Err(InvariantViolation::DuplicatePendingEntry(ip)),
        }
    }

    /// Applies an ARP reply. Returns the frames released by the resolution
    /// in the order they were queued, or `None` if nothing asked for `ip`.
    pub fn resolve_from_reply(
        &mut self,
        ip: Ipv4Addr,
        mac: EthernetAddress,
        interface: InterfaceName,
    ) -> Option<Vec<Transmit>> {
        if !self.entries.contains_key(&ip) {
            return None;
        }
        let candidate = ArpEntry {
            ip,
            mac,
            interface,
            sane: false,
            pending: VecDeque::new(),
        };
        match self.merge(candidate) {
            MergeOutcome::MergedPendingQueue(key) => {
                let entry = self.entries.get_mut(&key)?;
                entry.sane = true;
                let queue = mem::take(&mut entry.pending);
                let entry: &ArpEntry = entry;
                Some(queue.into_iter().map(|release| release(entry)).collect())
            }
            MergeOutcome::Inserted | MergeOutcome::Unchanged => Some(Vec::new()),
        }
    }
}

impl Display for ArpEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16}{:<20}{:<16}{}",
            self.ip.to_string(),
            self.mac.to_string(),
            self.interface.as_str(),
            if self.sane {
                "resolved".to_string()
            } else {
                format!("pending ({} queued)", self.pending.len())
            }
        )
    }
}

impl Display for ArpTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16}{:<20}{:<16}State", "IP", "MAC", "Interface")?;
        for entry in self.iter() {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}
