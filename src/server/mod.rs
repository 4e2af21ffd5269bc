//! Supervision of the analysis server process.

mod args;
mod error;
mod process_tree;
mod resolver;
mod state;
mod stdio;
mod supervisor;

pub use args::*;
pub use error::*;
pub use process_tree::*;
pub use resolver::*;
pub use state::*;
pub use stdio::{read_lines, write_lines, StdinSink};
pub use supervisor::*;
