//! Computation engines for Catboard.
//!
//! The edge handler hands every request to a [`ComputeDelegate`]. This
//! crate provides the production one: [`WasmDelegate`], which runs a
//! compiled WebAssembly module in a wasmtime sandbox with fuel and memory
//! limits and compiles it exactly once per process.
//!
//! [`ComputeDelegate`]: catboard_core::ComputeDelegate

pub mod wasm;

pub use wasm::WasmDelegate;
