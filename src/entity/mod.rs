mod collection;
pub(crate) mod loader;
mod model;
mod registry;
mod relation;

pub use collection::*;
pub use model::*;
pub use registry::*;
pub use relation::*;
