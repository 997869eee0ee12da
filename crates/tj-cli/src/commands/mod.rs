//! CLI subcommand implementations.

pub mod clients;
pub mod init;
pub mod sync;
