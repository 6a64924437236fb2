// src/exec/mod.rs

//! Process execution layer.
//!
//! The scheduler treats work as an opaque async callable. This module
//! provides the one the `sparks` binary uses: run the spark's `cmd` with
//! `tokio::process::Command` and fail the spark on a non-zero exit.

pub mod command;

pub use command::{bind_entry, command_work};
