//! Sandboxed file operations over a configured workspace root.

mod error;
mod executor;
mod path;

pub use error::ToolError;
pub use executor::{DirEntry, ToolExecutor, MAX_BODY_BYTES};
pub use path::resolve_path_under;
