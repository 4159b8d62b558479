use crate::artifact::{reduce, Artifact, ArtifactStatus};
use crate::hooks::HookRegistry;
use finsight_protocol::{Delta, FrameDecoder, StreamRecord};
use tracing::debug;

/// What folding one delta did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    Applied,
    /// Arrived after `finish` without a new document id.
    Ignored,
    /// A new document id after `finish` opened a fresh artifact.
    NewTurn,
}

/// Client view of one conversation: the active artifact plus turn-level
/// state (reasoning text, phase marker, answer tokens).
///
/// After `finish`, artifact deltas are dropped until an `id` with a different
/// value arrives; that `id` opens a new turn. Phase markers and reasoning are
/// turn-level and always recorded.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    hooks: HookRegistry,
    artifact: Artifact,
    reasoning: String,
    phase: Option<String>,
    answer: String,
    error: Option<String>,
    finished: bool,
    turns: usize,
}

impl Default for ChatTurn {
    fn default() -> Self {
        Self::new(HookRegistry::standard())
    }
}

impl ChatTurn {
    pub fn new(hooks: HookRegistry) -> Self {
        Self {
            hooks,
            artifact: Artifact::new(),
            reasoning: String::new(),
            phase: None,
            answer: String::new(),
            error: None,
            finished: false,
            turns: 1,
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Latest reasoning snapshot.
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Latest phase marker (`reasoning-start`, `responding`, ...).
    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    /// Answer tokens received so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Top-level stream error, if one arrived.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of artifact turns opened so far, the initial one included.
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Folds one delta.
    pub fn apply(&mut self, delta: Delta) -> Fold {
        match &delta {
            Delta::ReasoningChunk(snapshot) => {
                self.reasoning.clone_from(snapshot);
                return Fold::Applied;
            }
            Delta::Status(marker) => {
                self.phase = Some(marker.clone());
                return Fold::Applied;
            }
            _ => {}
        }

        let mut outcome = Fold::Applied;
        if self.finished {
            match &delta {
                Delta::Id(id) if self.artifact.document_id.as_deref() != Some(id.as_str()) => {
                    self.artifact = self.artifact.reopened();
                    self.finished = false;
                    self.turns += 1;
                    outcome = Fold::NewTurn;
                }
                other => {
                    debug!(kind = ?other.kind(), "Dropping delta after finish");
                    return Fold::Ignored;
                }
            }
        }

        let artifact = std::mem::take(&mut self.artifact);
        self.artifact = reduce(artifact, &delta, &self.hooks);
        if matches!(delta, Delta::Finish) {
            self.finished = true;
        }
        outcome
    }

    /// Folds a batch to exhaustion, in order.
    pub fn apply_all(&mut self, deltas: impl IntoIterator<Item = Delta>) -> Vec<Fold> {
        deltas.into_iter().map(|d| self.apply(d)).collect()
    }

    /// Folds one framed record.
    pub fn apply_record(&mut self, record: StreamRecord) {
        match record {
            StreamRecord::Token(token) => self.answer.push_str(&token),
            StreamRecord::Data(delta) => {
                self.apply(delta);
            }
            StreamRecord::Error(message) => {
                self.artifact.status = ArtifactStatus::Error;
                self.error = Some(message);
            }
        }
    }
}

/// Decodes raw response bytes straight into a [`ChatTurn`].
#[derive(Debug, Default)]
pub struct TurnReader {
    decoder: FrameDecoder,
    turn: ChatTurn,
}

impl TurnReader {
    pub fn new(turn: ChatTurn) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            turn,
        }
    }

    /// Folds every record completed by `bytes`.
    pub fn push(&mut self, bytes: &[u8]) {
        for record in self.decoder.push(bytes) {
            self.turn.apply_record(record);
        }
    }

    /// Flushes a trailing unterminated record and returns the turn.
    pub fn finish(mut self) -> ChatTurn {
        if let Some(record) = self.decoder.finish() {
            self.turn.apply_record(record);
        }
        self.turn
    }

    pub fn turn(&self) -> &ChatTurn {
        &self.turn
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use finsight_protocol::{encode, status, ArtifactKind};

    #[test]
    fn test_reasoning_and_phase_are_turn_level() {
        let mut turn = ChatTurn::default();
        turn.apply(Delta::status(status::REASONING_START));
        turn.apply(Delta::ReasoningChunk("User".into()));
        turn.apply(Delta::ReasoningChunk("User wants AAPL".into()));
        assert_eq!(turn.reasoning(), "User wants AAPL");
        assert_eq!(turn.phase(), Some(status::REASONING_START));
        assert_eq!(turn.artifact().status, ArtifactStatus::Idle);
    }

    #[test]
    fn test_same_id_after_finish_is_ignored() {
        let mut turn = ChatTurn::default();
        let folds = turn.apply_all([
            Delta::Id("doc-1".into()),
            Delta::Kind(ArtifactKind::Text),
            Delta::Finish,
            Delta::Id("doc-1".into()),
            Delta::Title("late".into()),
        ]);
        assert_eq!(folds[3..], [Fold::Ignored, Fold::Ignored]);
        assert_eq!(turn.artifact().status, ArtifactStatus::Idle);
        assert!(turn.artifact().title.is_empty());
        assert_eq!(turn.turns(), 1);
    }

    #[test]
    fn test_new_id_after_finish_opens_new_turn() {
        let mut turn = ChatTurn::default();
        turn.apply_all([
            Delta::Id("doc-1".into()),
            Delta::Kind(ArtifactKind::Text),
            Delta::Text("first".into()),
            Delta::Finish,
        ]);
        assert_eq!(turn.apply(Delta::Id("doc-2".into())), Fold::NewTurn);
        turn.apply(Delta::Kind(ArtifactKind::Financial));
        assert_eq!(turn.artifact().document_id.as_deref(), Some("doc-2"));
        assert!(turn.artifact().content.is_empty());
        assert_eq!(turn.artifact().status, ArtifactStatus::Streaming);
        assert_eq!(turn.turns(), 2);
    }

    #[test]
    fn test_status_marker_after_finish_is_kept() {
        let mut turn = ChatTurn::default();
        turn.apply_all([Delta::Id("doc-1".into()), Delta::Finish]);
        assert_eq!(turn.apply(Delta::status(status::RESPONDING)), Fold::Applied);
        assert_eq!(turn.phase(), Some(status::RESPONDING));
        assert_eq!(turn.artifact().status, ArtifactStatus::Idle);
    }

    #[test]
    fn test_reader_folds_split_bytes() {
        let mut wire = String::new();
        for record in [
            StreamRecord::Data(Delta::Id("doc-1".into())),
            StreamRecord::Data(Delta::Kind(ArtifactKind::Text)),
            StreamRecord::Data(Delta::Text("héllo".into())),
            StreamRecord::Token("Done.".into()),
            StreamRecord::Error("Oops, an error occurred!".into()),
        ] {
            wire.push_str(&encode(&record).unwrap());
        }
        let mut reader = TurnReader::default();
        for byte in wire.as_bytes() {
            reader.push(std::slice::from_ref(byte));
        }
        let turn = reader.finish();
        assert_eq!(turn.artifact().content, "héllo");
        assert_eq!(turn.answer(), "Done.");
        assert_eq!(turn.error(), Some("Oops, an error occurred!"));
        assert_eq!(turn.artifact().status, ArtifactStatus::Error);
    }
}
