// ABOUTME: Library root for relevo - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod output;
pub mod pipeline;
pub mod run;
pub mod trigger;
pub mod types;
pub mod validate;
