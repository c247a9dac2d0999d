//! Remote operations against the Drive API.

mod folders;
mod upload;

pub use folders::*;
pub use upload::*;
