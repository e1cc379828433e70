//! Latent bridge library target.
//!
//! Exposes the binary's modules for integration tests. The entry point is
//! in `main.rs`.

pub mod cli;
pub mod commands;
pub mod driver;
pub mod sinks;
