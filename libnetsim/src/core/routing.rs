use crate::{apply_mask, check_prefix, ConfigError, InterfaceName};

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextHop {
    /// The subnet is attached; the destination is its own next hop.
    Direct,
    Gateway {
        gateway: Ipv4Addr,
        interface: InterfaceName,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub subnet: Ipv4Addr,
    pub prefix_len: u8,
    pub next_hop: NextHop,
}

impl Route {
    #[inline(always)]
    pub fn is_direct(&self) -> bool {
        self.next_hop == NextHop::Direct
    }

    #[inline(always)]
    pub fn matches(&self, ip: Ipv4Addr) -> bool {
        apply_mask(ip, self.prefix_len) == self.subnet
    }
}

/// Static routes keyed by (subnet, prefix length). The 0.0.0.0/0 route is
/// kept on its own and only consulted when nothing longer matches.
#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    routes: BTreeMap<(Ipv4Addr, u8), Route>,
    default_route: Option<Route>,
}

impl RoutingTable {
    /// Installs a route. An identical route is an error; a different route
    /// for the same (subnet, prefix) replaces the old one.
    pub fn add_route(
        &mut self,
        ip: Ipv4Addr,
        prefix_len: u8,
        next_hop: NextHop,
    ) -> Result<(), ConfigError> {
        let prefix_len = check_prefix(prefix_len)?;
        let route = Route {
            subnet: apply_mask(ip, prefix_len),
            prefix_len,
            next_hop,
        };
        let existing = if prefix_len == 0 {
            self.default_route.as_ref()
        } else {
            self.routes.get(&(route.subnet, prefix_len))
        };
        if existing == Some(&route) {
            return Err(ConfigError::DuplicateRoute {
                subnet: route.subnet,
                prefix_len,
            });
        }
        if prefix_len == 0 {
            self.default_route = Some(route);
        } else {
            self.routes.insert((route.subnet, prefix_len), route);
        }
        Ok(())
    }

    pub fn add_direct_route(&mut self, ip: Ipv4Addr, prefix_len: u8) -> Result<(), ConfigError> {
        self.add_route(ip, prefix_len, NextHop::Direct)
    }

    pub fn delete_route(&mut self, ip: Ipv4Addr, prefix_len: u8) -> Result<Route, ConfigError> {
        let prefix_len = check_prefix(prefix_len)?;
        let subnet = apply_mask(ip, prefix_len);
        let removed = if prefix_len == 0 {
            self.default_route.take()
        } else {
            self.routes.remove(&(subnet, prefix_len))
        };
        removed.ok_or(ConfigError::NoSuchRoute { subnet, prefix_len })
    }

    /// Exact lookup by (subnet, prefix).
    pub fn lookup(&self, ip: Ipv4Addr, prefix_len: u8) -> Option<&Route> {
        if prefix_len == 0 {
            return self.default_route.as_ref();
        }
        self.routes.get(&(apply_mask(ip, prefix_len), prefix_len))
    }

    /// Longest-prefix match, falling back to the default route.
    pub fn lookup_lpm(&self, ip: Ipv4Addr) -> Option<&Route> {
        self.routes
            .values()
            .filter(|route| route.matches(ip))
            .max_by_key(|route| route.prefix_len)
            .or(self.default_route.as_ref())
    }

    pub fn len(&self) -> usize {
        self.routes.len() + self.default_route.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().chain(self.default_route.iter())
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let dest = format!("{}/{}", self.subnet, self.prefix_len);
        match &self.next_hop {
            NextHop::Direct => write!(f, "{:<20}{:<16}{:<10}direct", dest, "-", "-"),
            NextHop::Gateway { gateway, interface } => write!(
                f,
                "{:<20}{:<16}{:<10}indirect",
                dest,
                gateway.to_string(),
                interface.as_str()
            ),
        }
    }
}

impl Display for RoutingTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20}{:<16}{:<10}Type", "Destination", "Gateway", "OIF")?;
        for route in self.iter() {
            writeln!(f, "{}", route)?;
        }
        Ok(())
    }
}
