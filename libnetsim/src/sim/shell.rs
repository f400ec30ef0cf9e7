use crate::{
    check_prefix, parse_host_ipv4, parse_ipv4, AddressError, Command, Disposition, Reply,
    SimError, Simulation,
};

use thiserror::Error;

pub const HELP: &str = "\
show topology
show node <node>
show node arp <node>
show node mac <node>
show node routing-table <node>
show node interfaces <node>
show node stats <node>
run node resolve-arp <node> <ip>
run node ping <node> <ip>
run node ping tunnel <node> <ip> <tunnel-end-ip>
config node route <node> <ip> <mask> <gateway> <ifname>
config node delete-route <node> <ip> <mask>
help
exit";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("Unknown command {0:?}, try help")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid mask {0:?}, expected 0..=32")]
    InvalidMask(String),
    #[error(transparent)]
    Address(#[from] AddressError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Exit,
    ShowTopology,
    Node { node: String, command: Command },
}

/// Parses one input line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, ShellError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let cmd = match words.as_slice() {
        [] => return Ok(None),
        ["help"] | ["h"] => ShellCommand::Help,
        ["exit"] | ["quit"] => ShellCommand::Exit,
        ["show", "topology"] => ShellCommand::ShowTopology,
        ["show", "node", rest @ ..] => parse_show(rest)?,
        ["run", "node", rest @ ..] => parse_run(rest)?,
        ["config", "node", rest @ ..] => parse_config(rest)?,
        _ => return Err(ShellError::UnknownCommand(line.trim().to_string())),
    };
    Ok(Some(cmd))
}

fn on(node: &str, command: Command) -> ShellCommand {
    ShellCommand::Node {
        node: node.to_string(),
        command,
    }
}

fn parse_show(args: &[&str]) -> Result<ShellCommand, ShellError> {
    let (command, node) = match args {
        [node] => (Command::ShowNode, node),
        ["arp", node] => (Command::ShowArp, node),
        ["mac", node] => (Command::ShowMac, node),
        ["routing-table", node] => (Command::ShowRoutes, node),
        ["interfaces", node] => (Command::ShowInterfaces, node),
        ["stats", node] => (Command::ShowStats, node),
        _ => return Err(ShellError::Usage("show node [arp|mac|routing-table|interfaces|stats] <node>")),
    };
    Ok(on(node, command))
}

fn parse_run(args: &[&str]) -> Result<ShellCommand, ShellError> {
    match args {
        ["resolve-arp", node, ip] => Ok(on(node, Command::ResolveArp(parse_ipv4(ip)?))),
        ["ping", "tunnel", node, ip, tunnel_end] => Ok(on(
            node,
            Command::PingTunnel {
                dst: parse_ipv4(ip)?,
                tunnel_end: parse_ipv4(tunnel_end)?,
            },
        )),
        ["ping", node, ip] => Ok(on(node, Command::Ping(parse_ipv4(ip)?))),
        ["resolve-arp", ..] => Err(ShellError::Usage("run node resolve-arp <node> <ip>")),
        ["ping", "tunnel", ..] => Err(ShellError::Usage(
            "run node ping tunnel <node> <ip> <tunnel-end-ip>",
        )),
        ["ping", ..] => Err(ShellError::Usage("run node ping <node> <ip>")),
        _ => Err(ShellError::UnknownCommand(format!("run node {}", args.join(" ")))),
    }
}

fn parse_config(args: &[&str]) -> Result<ShellCommand, ShellError> {
    match args {
        ["route", node, ip, mask, gateway, interface] => Ok(on(
            node,
            Command::AddRoute {
                ip: parse_ipv4(ip)?,
                prefix_len: parse_mask(mask)?,
                gateway: parse_host_ipv4(gateway)?,
                interface: interface.to_string(),
            },
        )),
        ["delete-route", node, ip, mask] => Ok(on(
            node,
            Command::DeleteRoute {
                ip: parse_ipv4(ip)?,
                prefix_len: parse_mask(mask)?,
            },
        )),
        ["route", ..] => Err(ShellError::Usage(
            "config node route <node> <ip> <mask> <gateway> <ifname>",
        )),
        ["delete-route", ..] => Err(ShellError::Usage("config node delete-route <node> <ip> <mask>")),
        _ => Err(ShellError::UnknownCommand(format!("config node {}", args.join(" ")))),
    }
}

fn parse_mask(s: &str) -> Result<u8, ShellError> {
    let mask = s
        .parse::<u8>()
        .map_err(|_| ShellError::InvalidMask(s.to_string()))?;
    Ok(check_prefix(mask)?)
}

fn describe(outcome: &Disposition) -> String {
    match outcome {
        Disposition::Dropped(reason) => format!("dropped: {}", reason),
        Disposition::Switched { transmitted } => format!("switched out of {} port(s)", transmitted),
        Disposition::ArpReplied => "ARP reply sent".to_string(),
        Disposition::ArpResolved { released } => {
            format!("ARP resolved, {} queued frame(s) released", released)
        }
        Disposition::ArpRequested { target } => format!("ARP request sent for {}", target),
        Disposition::Delivered { source, .. } => format!("delivered locally from {}", source),
        Disposition::Forwarded { next_hop } => format!("sent toward {}", next_hop),
        Disposition::AwaitingArp { next_hop } => {
            format!("queued until {} is resolved", next_hop)
        }
        Disposition::LoopedBack => "looped back to self".to_string(),
    }
}

pub fn render(reply: &Reply) -> String {
    match reply {
        Reply::Done => "ok".to_string(),
        Reply::Text(text) => text.trim_end().to_string(),
        Reply::Stats(stats) => stats.to_string().trim_end().to_string(),
        Reply::Outcome(outcome) => describe(outcome),
    }
}

/// Runs a node-level or topology-level command and formats the answer.
/// `Help` and `Exit` are left to the caller.
pub fn run_command(sim: &Simulation, cmd: ShellCommand) -> Result<String, SimError> {
    match cmd {
        ShellCommand::Help => Ok(HELP.to_string()),
        ShellCommand::Exit => Ok(String::new()),
        ShellCommand::ShowTopology => Ok(sim.topology_summary().trim_end().to_string()),
        ShellCommand::Node { node, command } => sim.execute(&node, command).map(|r| render(&r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    #[test]
    fn parses_the_grammar() {
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("help"), Ok(Some(ShellCommand::Help)));
        assert_eq!(parse_line("show topology"), Ok(Some(ShellCommand::ShowTopology)));
        assert_eq!(
            parse_line("show node routing-table R1"),
            Ok(Some(on("R1", Command::ShowRoutes)))
        );
        assert_eq!(parse_line("show node R2"), Ok(Some(on("R2", Command::ShowNode))));
        assert_eq!(
            parse_line("run node ping tunnel R1 11.1.1.1 122.1.1.3"),
            Ok(Some(on(
                "R1",
                Command::PingTunnel {
                    dst: Ipv4Addr::new(11, 1, 1, 1),
                    tunnel_end: Ipv4Addr::new(122, 1, 1, 3)
                }
            )))
        );
        assert_eq!(
            parse_line("config node route R1 122.1.1.3 32 10.1.1.2 eth0/1"),
            Ok(Some(on(
                "R1",
                Command::AddRoute {
                    ip: Ipv4Addr::new(122, 1, 1, 3),
                    prefix_len: 32,
                    gateway: Ipv4Addr::new(10, 1, 1, 2),
                    interface: "eth0/1".into()
                }
            )))
        );
    }

    #[test]
    fn reports_bad_input() {
        assert!(matches!(parse_line("frobnicate"), Err(ShellError::UnknownCommand(_))));
        assert!(matches!(parse_line("run node ping R1"), Err(ShellError::Usage(_))));
        assert_eq!(
            parse_line("run node ping R1 300.1.1.1"),
            Err(ShellError::Address(AddressError::MalformedIp("300.1.1.1".into())))
        );
        assert_eq!(
            parse_line("config node delete-route R1 10.0.0.0 33"),
            Err(ShellError::Address(AddressError::InvalidPrefix(33)))
        );
        assert_eq!(
            parse_line("config node delete-route R1 10.0.0.0 x"),
            Err(ShellError::InvalidMask("x".into()))
        );
        assert_eq!(
            parse_line("config node route R1 10.0.0.0 8 0.0.0.0 eth0/1"),
            Err(ShellError::Address(AddressError::Unspecified))
        );
    }
}
