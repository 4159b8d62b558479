use crate::hooks::HookRegistry;
use crate::metadata::ArtifactMetadata;
use finsight_protocol::{ArtifactKind, Delta};
use serde::Serialize;

/// Lifecycle of an artifact.
///
/// `Idle -(any delta)-> Streaming -(finish)-> Idle`. Tool errors leave the
/// artifact streaming; only a top-level stream error marks it `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    #[default]
    Idle,
    Streaming,
    Error,
}

/// Where the artifact panel opens from, in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// Kind-specific state computed by hooks.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedState {
    /// A financial artifact has something to plot.
    pub chart_ready: bool,
    /// Metric a table or chart shows first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_metric: Option<String>,
}

/// The document or visualization a chat turn renders.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Server-side document this artifact is bound to.
    pub document_id: Option<String>,
    pub kind: ArtifactKind,
    pub title: String,
    pub content: String,
    pub metadata: ArtifactMetadata,
    pub status: ArtifactStatus,
    pub is_visible: bool,
    pub bounding_box: BoundingBox,
    pub derived: DerivedState,
}

impl Artifact {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh artifact that keeps the panel position of `self`.
    pub fn reopened(&self) -> Self {
        Self {
            bounding_box: self.bounding_box,
            ..Self::default()
        }
    }

    /// Generic fold of one delta. Content writes for `text` are left to the
    /// kind hooks.
    ///
    /// `reasoning-chunk` and `status` address the turn, not the artifact, and
    /// are no-ops here, as are kinds this build does not know.
    pub fn fold(&mut self, delta: &Delta) {
        match delta {
            Delta::Id(id) => self.document_id = Some(id.clone()),
            Delta::Title(title) => self.title.clone_from(title),
            Delta::Kind(kind) => self.kind = *kind,
            Delta::Clear => self.content.clear(),
            Delta::Metadata(value) => self.metadata.replace(value.clone()),
            Delta::ToolStatus(status) => self.metadata.merge_tool_status(status),
            Delta::TickerData(series) => self.metadata.upsert_series(series),
            Delta::Text(_) => {}
            Delta::Finish => {
                self.status = ArtifactStatus::Idle;
                return;
            }
            Delta::ReasoningChunk(_) | Delta::Status(_) | Delta::Unsupported(_) => return,
        }
        self.status = ArtifactStatus::Streaming;
    }
}

/// Pure reducer: folds `delta` into `artifact`, then runs the hook of the
/// artifact's resulting kind.
pub fn reduce(mut artifact: Artifact, delta: &Delta, hooks: &HookRegistry) -> Artifact {
    artifact.fold(delta);
    hooks.dispatch(&mut artifact, delta);
    artifact
}
