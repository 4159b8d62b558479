//! Wire contract between the server-side orchestrator and the client reducer.
//!
//! A chat turn travels as one ordered byte stream of self-delimiting records.
//! Each record is either a language-model answer token, a [`Delta`] that
//! mutates the client's artifact, or a top-level error message.
//!
//! # Main types
//!
//! - [`Delta`]: The closed tagged union of artifact mutations.
//! - [`FinancialSnapshot`]: Persisted/streamed state of a financial tool run.
//! - [`StreamRecord`]: One framed record on the outbound stream.
//! - [`FrameDecoder`]: Incremental decoder tolerant of arbitrary transport splits.
//! - [`DeltaSink`]: Producer handle that never fails once the client is gone.

/// Line framing for stream records.
pub mod codec;
/// The `Delta` union and its payload types.
pub mod delta;
/// Producer-side handle for writing records.
pub mod sink;
/// Financial snapshot shapes shared by the pipeline, the store and the reducer.
pub mod snapshot;

pub use codec::{encode, FrameDecoder, StreamRecord};
pub use delta::{status, ArtifactKind, Delta, DeltaKind, TickerSeries, ToolProgress, ToolStage, ToolStatus};
pub use sink::DeltaSink;
pub use snapshot::{
    FinancialSnapshot, FundamentalRow, FundamentalsData, RankingData, RankingMetadata,
    RankingRow, SnapshotStatus, TimeSeriesPoint,
};
