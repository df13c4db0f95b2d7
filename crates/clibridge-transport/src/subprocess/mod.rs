//! Child-process transports
//!
//! [`ExecTransport`] spawns one process per request; [`StdioDaemonTransport`]
//! keeps a single process alive and talks to it over its standard pipes.

pub mod daemon;
pub mod exec;
pub mod process;

pub use daemon::StdioDaemonTransport;
pub use exec::ExecTransport;
pub use process::{ProcessConfig, ProcessHandle};
