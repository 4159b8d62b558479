use crate::snapshot::TimeSeriesPoint;
use finsight_core::{FinsightError, FinsightResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known values carried by [`Delta::Status`].
pub mod status {
    /// Emitted before the first reasoning chunk of phase 1.
    pub const REASONING_START: &str = "reasoning-start";
    /// Emitted once phase 1 completed (callback or timeout).
    pub const REASONING_COMPLETE: &str = "reasoning-complete";
    /// Emitted on the first plain-text unit of phase 2.
    pub const RESPONDING: &str = "responding";
}

/// Content type of the artifact a turn renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Plain prose document.
    #[default]
    Text,
    /// Source code.
    Code,
    /// CSV spreadsheet.
    Sheet,
    /// Base64 image.
    Image,
    /// Financial chart / table.
    Financial,
}

impl ArtifactKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Text => "text",
            ArtifactKind::Code => "code",
            ArtifactKind::Sheet => "sheet",
            ArtifactKind::Image => "image",
            ArtifactKind::Financial => "financial",
        }
    }

    /// Parses a wire name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "text" => Some(ArtifactKind::Text),
            "code" => Some(ArtifactKind::Code),
            "sheet" => Some(ArtifactKind::Sheet),
            "image" => Some(ArtifactKind::Image),
            "financial" => Some(ArtifactKind::Financial),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle stage reported by a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStage {
    /// The tool accepted the call and is waiting on upstream.
    Loading,
    /// Upstream answered; the tool is parsing/streaming data.
    Processing,
    /// All data has been emitted.
    Ready,
    /// The tool failed; partial output stays inspectable.
    Error,
}

/// Incremental progress of a chunked emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProgress {
    /// Rows emitted so far.
    pub loaded: usize,
    /// Rows expected in total.
    pub total: usize,
}

/// Payload of a `tool-status` delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatus {
    /// Name of the reporting tool; key of the client's status sub-map.
    pub tool: String,
    /// Current lifecycle stage.
    pub stage: ToolStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ToolProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_timeout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolStatus {
    /// A bare status for `tool` at `stage`.
    pub fn new(tool: impl Into<String>, stage: ToolStage) -> Self {
        Self {
            tool: tool.into(),
            stage,
            progress: None,
            message: None,
            error: None,
            is_timeout: None,
            details: None,
        }
    }

    /// An error status with a user-facing message.
    pub fn failed(tool: impl Into<String>, error: impl Into<String>, is_timeout: bool) -> Self {
        let details = if is_timeout {
            "The request timed out. This might be due to high server load or network issues."
        } else {
            "An unexpected error occurred while fetching financial data."
        };
        Self {
            error: Some(error.into()),
            is_timeout: Some(is_timeout),
            details: Some(details.to_string()),
            ..Self::new(tool, ToolStage::Error)
        }
    }

    pub fn with_progress(mut self, loaded: usize, total: usize) -> Self {
        self.progress = Some(ToolProgress { loaded, total });
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Payload of a `ticker-data` delta: one entity's full series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSeries {
    /// Entity key (ticker symbol).
    pub ticker: String,
    /// Ordered observations.
    pub data: Vec<TimeSeriesPoint>,
}

/// One mutation of the client artifact.
///
/// Serialized adjacently tagged as `{"type": "...", "content": ...}`.
/// `id`, `title`, `kind` and `metadata` are last-writer-wins; `ticker-data`
/// is addressed by entity key and commutes; `finish` ends the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "kebab-case")]
pub enum Delta {
    /// Document text produced for the artifact.
    Text(String),
    /// Full reasoning buffer so far (a snapshot, never an increment).
    ReasoningChunk(String),
    /// Free-form phase marker, see [`status`].
    Status(String),
    /// Tool lifecycle report.
    ToolStatus(ToolStatus),
    /// Binds the artifact to a server-side document.
    Id(String),
    /// Artifact title.
    Title(String),
    /// Artifact content type.
    Kind(ArtifactKind),
    /// Resets artifact content.
    Clear,
    /// Structured snapshot replacing the artifact metadata.
    Metadata(serde_json::Value),
    /// One entity's series.
    TickerData(TickerSeries),
    /// Terminal marker for the turn.
    Finish,
    /// A kind this build does not know; folded as a no-op.
    #[serde(skip)]
    Unsupported(String),
}

/// Tag of a [`Delta`], including tags this build does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Text,
    ReasoningChunk,
    Status,
    ToolStatus,
    Id,
    Title,
    Kind,
    Clear,
    Metadata,
    TickerData,
    Finish,
    Unknown(String),
}

impl DeltaKind {
    /// Parses a wire tag; never fails.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "text" => DeltaKind::Text,
            "reasoning-chunk" => DeltaKind::ReasoningChunk,
            "status" => DeltaKind::Status,
            "tool-status" => DeltaKind::ToolStatus,
            "id" => DeltaKind::Id,
            "title" => DeltaKind::Title,
            "kind" => DeltaKind::Kind,
            "clear" => DeltaKind::Clear,
            "metadata" => DeltaKind::Metadata,
            "ticker-data" => DeltaKind::TickerData,
            "finish" => DeltaKind::Finish,
            other => DeltaKind::Unknown(other.to_string()),
        }
    }

    /// Wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            DeltaKind::Text => "text",
            DeltaKind::ReasoningChunk => "reasoning-chunk",
            DeltaKind::Status => "status",
            DeltaKind::ToolStatus => "tool-status",
            DeltaKind::Id => "id",
            DeltaKind::Title => "title",
            DeltaKind::Kind => "kind",
            DeltaKind::Clear => "clear",
            DeltaKind::Metadata => "metadata",
            DeltaKind::TickerData => "ticker-data",
            DeltaKind::Finish => "finish",
            DeltaKind::Unknown(tag) => tag,
        }
    }
}

impl Delta {
    /// The tag of this delta.
    pub fn kind(&self) -> DeltaKind {
        match self {
            Delta::Text(_) => DeltaKind::Text,
            Delta::ReasoningChunk(_) => DeltaKind::ReasoningChunk,
            Delta::Status(_) => DeltaKind::Status,
            Delta::ToolStatus(_) => DeltaKind::ToolStatus,
            Delta::Id(_) => DeltaKind::Id,
            Delta::Title(_) => DeltaKind::Title,
            Delta::Kind(_) => DeltaKind::Kind,
            Delta::Clear => DeltaKind::Clear,
            Delta::Metadata(_) => DeltaKind::Metadata,
            Delta::TickerData(_) => DeltaKind::TickerData,
            Delta::Finish => DeltaKind::Finish,
            Delta::Unsupported(tag) => DeltaKind::Unknown(tag.clone()),
        }
    }

    /// A `status` delta.
    pub fn status(marker: &str) -> Self {
        Delta::Status(marker.to_string())
    }

    /// A `metadata` delta carrying any serializable snapshot.
    pub fn metadata<T: Serialize>(snapshot: &T) -> FinsightResult<Self> {
        Ok(Delta::Metadata(serde_json::to_value(snapshot)?))
    }

    /// Decodes one `{type, content}` object.
    ///
    /// Unknown tags decode to [`Delta::Unsupported`]; `clear` and `finish`
    /// ignore whatever content accompanies them.
    pub fn from_value(value: serde_json::Value) -> FinsightResult<Self> {
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| FinsightError::Protocol("delta without a type tag".into()))?;

        match DeltaKind::parse(tag) {
            DeltaKind::Unknown(tag) => Ok(Delta::Unsupported(tag)),
            DeltaKind::Clear => Ok(Delta::Clear),
            DeltaKind::Finish => Ok(Delta::Finish),
            _ => Ok(serde_json::from_value(value)?),
        }
    }
}
