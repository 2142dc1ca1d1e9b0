//! Configuration file sources, layered lowest precedence first.

pub mod global_file;
pub mod workspace_file;
