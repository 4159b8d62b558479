//! Financial data retrieval for chat tools.
//!
//! Talks to the external analytics service, recognises which of its response
//! shapes came back, normalises the payload into [`finsight_protocol`]
//! snapshot types and streams the result onto a turn's
//! [`DeltaSink`](finsight_protocol::DeltaSink) while checkpointing the
//! document.
//!
//! # Main types
//!
//! - [`AnalyticsClient`]: HTTP client with bounded, linearly backed-off retries.
//! - [`ResponseShape`]: Typed view of a recognised upstream answer.
//! - [`FinancialPipeline`]: Fetch, parse, emit and persist for one tool call.
//! - [`PipelineError`]: Failure carrying the attempt count and timeout flag.

/// Analytics service client.
pub mod client;
/// Upstream service settings.
pub mod config;
/// Error types.
pub mod error;
/// Payload normalisation.
pub mod parse;
/// The per-call retrieval pipeline.
pub mod pipeline;
/// Response shape recognition.
pub mod shape;

pub use client::AnalyticsClient;
pub use config::AnalyticsConfig;
pub use error::{FetchFailure, PipelineError};
pub use pipeline::{tool_summary, DocumentTarget, FinancialPipeline};
pub use shape::{detect_shape, PayloadKind, ResponseShape};
