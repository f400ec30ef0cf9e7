use crate::{EthernetAddress, InterfaceName};

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Learned MAC to interface bindings of a switch. One binding per MAC; the
/// most recent sighting wins.
#[derive(Debug, Default, Clone)]
pub struct MacTable {
    entries: BTreeMap<EthernetAddress, InterfaceName>,
}

impl MacTable {
    /// Returns `true` when the binding is new or moved.
    pub fn learn(&mut self, mac: EthernetAddress, interface: &InterfaceName) -> bool {
        match self.entries.get(&mac) {
            Some(known) if known == interface => false,
            _ => {
                self.entries.insert(mac, interface.clone());
                true
            }
        }
    }

    pub fn lookup(&self, mac: &EthernetAddress) -> Option<&InterfaceName> {
        self.entries.get(mac)
    }

    pub fn delete(&mut self, mac: &EthernetAddress) -> Option<InterfaceName> {
        self.entries.remove(mac)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EthernetAddress, &InterfaceName)> {
        self.entries.iter()
    }
}

impl Display for MacTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20}Interface", "MAC")?;
        for (mac, intf) in self.iter() {
            writeln!(f, "{:<20}{}", mac.to_string(), intf)?;
        }
        Ok(())
    }
}
