//! Runs a compiled inference module under wasmtime.
//!
//! The module's linear memory becomes the bridge's [`Arena`](latent_core::Arena)
//! and its exports become an [`InferenceEngine`](latent_core::InferenceEngine).

pub mod arena;
pub mod engine;
pub mod wasm_host;

pub use arena::WasmArena;
pub use engine::WasmEngine;
pub use wasm_host::WasmHost;
