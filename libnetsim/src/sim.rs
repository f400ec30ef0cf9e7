pub mod config;
pub use config::*;

pub mod presets;
pub use presets::*;

pub mod shell;
pub use shell::*;

pub mod simulation;
pub use simulation::*;

pub mod transport;
pub use transport::*;

pub mod worker;
pub use worker::*;
