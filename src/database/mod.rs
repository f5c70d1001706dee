mod connection;
mod memory;

pub use connection::*;
pub use memory::*;
