//! Core domain types, errors, and constants for `recap`.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by every crate,
//!   separating validation, classified generation failures, not-found and
//!   infrastructure failures.
//! - **`types`**: connection/recording descriptors and the `ExitStatus`
//!   table that encodes report computation outcomes.
//! - **`constants`**: environment variable names and file naming shared by
//!   the generator and the worker entry point.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    types::*,
};
