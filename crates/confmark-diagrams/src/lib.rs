//! Diagram handling for the Confmark codec.
//!
//! This crate provides the diagram-specific pieces shared by both conversion
//! directions:
//! - [`codec`]: deterministic, reversible encoding of diagram source text into
//!   a compact URL-safe transport token
//! - [`links`]: rendering-service and editor deep-link URLs built from tokens
//! - [`DiagramKind`]: the supported diagram languages
//! - [`RenderMode`]: how a diagram is represented in storage format
//!
//! The transport token is only ever used to build URLs. The literal diagram
//! source is always retained next to any rendered artifact; the token is never
//! the sole persisted copy.

pub mod codec;
pub mod links;

mod kind;

pub use codec::EncodingError;
pub use kind::{DiagramKind, RenderMode};
