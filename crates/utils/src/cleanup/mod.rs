//! Resource cleanup guards

mod handler;

pub use handler::*;
