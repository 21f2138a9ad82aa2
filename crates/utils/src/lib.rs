//! Shared utilities for recap
//!
//! Filesystem helpers (report publishing, temporary file guards), XDG path
//! resolution and logging setup used by the caches, the worker and the CLI.

pub mod cleanup;
pub mod logging;
pub mod report_file;
pub mod xdg;

pub use cleanup::*;
pub use report_file::*;
pub use xdg::*;
