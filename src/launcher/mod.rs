//! Cross-platform server process launching.

mod error;
mod launcher;
mod mono;
mod platform;
mod process;
mod version;
mod windows;

pub use error::*;
pub use launcher::*;
pub use mono::*;
pub use platform::*;
pub use process::*;
pub use version::*;
pub use windows::*;
