use finsight_agent::{LlmClient, StreamEvent};
use finsight_core::{FinsightError, FinsightResult, Message};
use finsight_protocol::{ArtifactKind, Delta, DeltaSink};
use tracing::warn;
use uuid::Uuid;

/// Streams a model draft onto the sink as `text` deltas and returns it.
///
/// Text documents receive increments; every other kind receives the whole
/// draft so far, matching how the client folds each kind.
pub(crate) async fn stream_draft(
    llm: &LlmClient,
    system_prompt: &str,
    request: &str,
    kind: ArtifactKind,
    chat_id: Uuid,
    sink: &DeltaSink,
) -> FinsightResult<String> {
    let messages = [Message::user(request, chat_id)];
    let (mut rx, handle) = llm.chat_stream(Some(system_prompt), &messages, &[]).await?;

    let mut draft = String::new();
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::TextDelta { text } => {
                draft.push_str(&text);
                let delta = if kind == ArtifactKind::Text {
                    Delta::Text(text)
                } else {
                    Delta::Text(draft.clone())
                };
                sink.send(delta);
            }
            StreamEvent::Error { message } => warn!(error = %message, "Draft stream reported an error"),
            _ => {}
        }
    }

    let response = handle
        .await
        .map_err(|e| FinsightError::Tool(format!("Draft task ended abnormally: {e}")))??;
    if draft.is_empty() {
        draft = response.text().to_string();
    }
    Ok(draft)
}
