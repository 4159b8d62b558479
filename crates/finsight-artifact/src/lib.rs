//! Client-side reconstruction of a chat turn from its record stream.
//!
//! Folding is synchronous and single-threaded: a [`ChatTurn`] owns its
//! [`Artifact`] and applies records strictly in arrival order.
//!
//! # Main types
//!
//! - [`Artifact`]: The document or visualization a turn renders.
//! - [`ArtifactMetadata`]: Typed snapshot plus keyed series and tool-status maps.
//! - [`HookRegistry`]: Per-kind `on_stream_part` hooks.
//! - [`ChatTurn`]: Turn-level reducer with finish gating.
//! - [`TurnReader`]: Byte-level front end feeding a [`ChatTurn`].

/// Artifact state and the generic fold.
pub mod artifact;
/// Per-kind stream hooks.
pub mod hooks;
/// Typed artifact metadata.
pub mod metadata;
/// Turn-level reducer.
pub mod turn;

pub use artifact::{reduce, Artifact, ArtifactStatus, BoundingBox, DerivedState};
pub use hooks::{ArtifactDefinition, HookRegistry};
pub use metadata::{ArtifactMetadata, MetadataPayload};
pub use turn::{ChatTurn, Fold, TurnReader};
