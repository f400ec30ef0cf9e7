use libnetsim::{
    build_preset, parse_line, run_command, ShellCommand, SimConfig, Simulation, TransportKind,
    HELP, PRESET_NAMES,
};

use anyhow::{Context, Result};
use log::info;
use structopt::StructOpt;

use std::io::{self, BufRead, Write};

#[derive(Debug, StructOpt)]
#[structopt(name = "netsim", about = "Interactive L2/L3 network simulator.")]
struct Opts {
    /// Preset to load: linear, cyclic, dual-switch, linear-routing or square.
    #[structopt(short, long, default_value = "linear-routing")]
    topology: String,

    /// Frame transport between nodes: udp or channel.
    #[structopt(long, default_value = "udp")]
    transport: TransportKind,

    /// Node n listens on base-port + n when the UDP transport is used.
    #[structopt(long, default_value = "4000")]
    base_port: u16,
}

impl Opts {
    fn config(self) -> SimConfig {
        SimConfig {
            transport: self.transport,
            base_port: self.base_port,
            topology: self.topology,
            ..Default::default()
        }
    }
}

fn repl(sim: &Simulation) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "netsim> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("reading command")? == 0 {
            return Ok(());
        }
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ShellCommand::Exit)) => return Ok(()),
            Ok(Some(ShellCommand::Help)) => println!("{}", HELP),
            Ok(Some(cmd)) => match run_command(sim, cmd) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("error: {}", e),
            },
            Err(e) => println!("error: {}", e),
        }
    }
}

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Opts::from_args().config();
    let topology = build_preset(&config.topology).with_context(|| {
        format!(
            "loading topology {:?} (available: {})",
            config.topology,
            PRESET_NAMES.join(", ")
        )
    })?;
    let sim = Simulation::start(topology, &config).context("starting simulation")?;

    let result = repl(&sim);
    let nodes = sim.shutdown();
    info!("stopped {} nodes", nodes.len());
    result
}
