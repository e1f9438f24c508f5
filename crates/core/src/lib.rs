//! # Catboard Core
//!
//! Domain types, traits, and error definitions for the Catboard edge handler.
//! This crate has **zero framework dependencies**: it defines the request
//! context, the delegate seam, and the presentation data that the other
//! crates implement against.

pub mod context;
pub mod delegate;
pub mod error;
pub mod presentation;

// Re-export key types at crate root for ergonomics
pub use context::{Context, Environment, RequestContext};
pub use delegate::{ComputeDelegate, DelegateResult};
pub use error::{AugmentError, DelegateError, PipelineError, Result};
pub use presentation::{ButtonDescriptor, ComponentDescriptor, EmbedDescriptor, Presentation};
