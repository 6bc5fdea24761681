//! Logging setup.
//!
//! Everything in the crate logs through the `log` facade; this module only
//! installs an `env_logger` backend for binaries.

mod init;

pub use init::{LoggingConfig, init_logging};
