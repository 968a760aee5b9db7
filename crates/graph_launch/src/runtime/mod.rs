//! Runtime components for process supervision

mod command;
mod plan;
mod process;
mod supervisor;

pub use command::*;
pub use plan::*;
pub use process::*;
pub use supervisor::*;
