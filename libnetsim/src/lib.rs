pub mod core;
pub mod net_helpers;
pub mod sim;
pub mod util;

pub use crate::core::*;
pub use crate::net_helpers::*;
pub use crate::sim::*;
pub use crate::util::*;
