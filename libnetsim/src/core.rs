pub mod arp;
pub use arp::*;

pub mod error;
pub use error::*;

pub mod interface;
pub use interface::*;

pub mod layer2;
pub mod layer3;

pub mod mac_table;
pub use mac_table::*;

pub mod node;
pub use node::*;

pub mod routing;
pub use routing::*;

pub mod topology;
pub use topology::*;
