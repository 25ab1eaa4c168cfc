//! Process execution for dcmrelay's toolkit drivers.
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style
//! invocation — arguments are passed as discrete elements, never through a
//! shell, which matters because manifest file paths are not trusted input.

pub mod command_spec;
pub mod error;
pub mod process;
pub mod stream;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use process::{ProcessOutput, ProcessRunner};
pub use stream::{CANCEL_POLL_INTERVAL, StreamingChild, spawn_cancel_watcher};
