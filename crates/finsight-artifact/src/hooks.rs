use crate::artifact::Artifact;
use crate::metadata::MetadataPayload;
use finsight_protocol::{ArtifactKind, Delta, SnapshotStatus};
use std::collections::HashMap;

/// Text documents open once they hold this many characters.
const TEXT_VISIBLE_AFTER: usize = 400;
/// Code documents open once they hold this many characters.
const CODE_VISIBLE_AFTER: usize = 300;

/// Stream hook of one artifact kind.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactDefinition {
    pub kind: ArtifactKind,
    pub on_stream_part: fn(&mut Artifact, &Delta),
}

/// Hook lookup by the artifact's current kind.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    definitions: HashMap<ArtifactKind, ArtifactDefinition>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks for every built-in kind.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for definition in [
            ArtifactDefinition {
                kind: ArtifactKind::Text,
                on_stream_part: text_part,
            },
            ArtifactDefinition {
                kind: ArtifactKind::Code,
                on_stream_part: code_part,
            },
            ArtifactDefinition {
                kind: ArtifactKind::Sheet,
                on_stream_part: replace_part,
            },
            ArtifactDefinition {
                kind: ArtifactKind::Image,
                on_stream_part: replace_part,
            },
            ArtifactDefinition {
                kind: ArtifactKind::Financial,
                on_stream_part: financial_part,
            },
        ] {
            registry.register(definition);
        }
        registry
    }

    /// Adds or replaces the hook for `definition.kind`.
    pub fn register(&mut self, definition: ArtifactDefinition) {
        self.definitions.insert(definition.kind, definition);
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&ArtifactDefinition> {
        self.definitions.get(&kind)
    }

    /// Runs the hook registered for the artifact's kind, if any.
    pub fn dispatch(&self, artifact: &mut Artifact, delta: &Delta) {
        if let Some(definition) = self.definitions.get(&artifact.kind) {
            (definition.on_stream_part)(artifact, delta);
        }
    }
}

fn text_part(artifact: &mut Artifact, delta: &Delta) {
    if let Delta::Text(text) = delta {
        artifact.content.push_str(text);
        if artifact.content.chars().count() > TEXT_VISIBLE_AFTER {
            artifact.is_visible = true;
        }
    }
}

fn code_part(artifact: &mut Artifact, delta: &Delta) {
    if let Delta::Text(draft) = delta {
        artifact.content.clone_from(draft);
        if artifact.content.chars().count() > CODE_VISIBLE_AFTER {
            artifact.is_visible = true;
        }
    }
}

fn replace_part(artifact: &mut Artifact, delta: &Delta) {
    if let Delta::Text(draft) = delta {
        artifact.content.clone_from(draft);
        artifact.is_visible = true;
    }
}

fn financial_part(artifact: &mut Artifact, delta: &Delta) {
    if matches!(delta, Delta::Kind(ArtifactKind::Financial)) {
        artifact.is_visible = true;
    }

    let metadata = &artifact.metadata;
    let ready = metadata
        .payload
        .snapshot()
        .is_some_and(|s| s.status == SnapshotStatus::Ready);
    artifact.derived.chart_ready = ready || !metadata.ticker_data.is_empty();

    let metric = match &metadata.payload {
        MetadataPayload::Ranking(snapshot) => snapshot
            .universe_data
            .as_ref()
            .map(|r| r.metadata.metric.clone()),
        MetadataPayload::Fundamentals(snapshot) => snapshot
            .fundamental_data
            .as_ref()
            .and_then(|f| f.metric_names().into_iter().next()),
        _ => None,
    };
    if metric.is_some() {
        artifact.derived.default_metric = metric;
    }
}
