//! Graph resolution: include expansion and flattening

mod loader;
mod resolved;
mod resolver;

pub use loader::{FileLoader, GraphLoader, LoadedGraph, MemoryLoader};
pub use resolved::{ResolvedGraph, ResolvedUnit};
pub use resolver::{apply_overlay, ResolveError, ResolveOptions, Resolver};
