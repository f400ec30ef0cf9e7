pub mod address;
pub use address::*;

pub mod buffer;
pub use buffer::*;

pub mod parser;
pub use parser::*;

#[allow(clippy::module_inception)]
pub mod util;
pub use util::*;
