//! Descriptor model, launch file parsing and substitution

mod descriptor;
mod launch_file;
mod substitution;

pub use descriptor::*;
pub use launch_file::*;
pub use substitution::*;
