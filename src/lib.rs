//! # queuecat
//!
//! `queuecat` exports the messages of an AMQP (RabbitMQ) queue to a file or
//! standard output, and copies or moves messages between queues while
//! mirroring them to that output.
//!
//! ## Core Modules
//!
//! - `broker`: traits over the broker connection and channel, with a `lapin`
//!   implementation and an in-memory one for tests.
//! - `drain`: the consume loop that formats, republishes and acknowledges.
//! - `commands`: the `export` and `copy_or_move` sessions.
//! - `config`: layered settings from files and environment variables.
//! - `utils`: the error type and logging setup.

pub mod broker;
pub mod commands;
pub mod config;
pub mod drain;
pub mod utils;

pub use commands::{Commands, QueueDeclaration};
pub use drain::{DrainConfig, DrainReport, OutputFormat};
pub use utils::{Error, Result};
