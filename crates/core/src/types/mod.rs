//! Domain types shared by the report caches and the worker entry point

mod descriptors;
mod exit_status;

pub use descriptors::{ConnectionDescriptor, Credentials, RecordingDescriptor, ReportFilter};
pub use exit_status::ExitStatus;
