use std::sync::Arc;
use tokio::sync::watch;

/// What unblocked a [`CompletionGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    /// The backend reported completion.
    Callback,
    /// The hard timeout elapsed first.
    Timeout,
}

/// Single-resolution completion primitive.
///
/// Any clone may resolve it; the first resolution wins and every later one is
/// a no-op. Waiters observe the winning source.
#[derive(Debug, Clone)]
pub struct CompletionGate {
    state: Arc<watch::Sender<Option<CompletionSource>>>,
}

impl CompletionGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Resolves the gate; returns `false` if it was already resolved.
    pub fn resolve(&self, source: CompletionSource) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(source);
                true
            }
        })
    }

    /// Winning source, if resolved.
    pub fn outcome(&self) -> Option<CompletionSource> {
        *self.state.borrow()
    }

    /// Waits until the gate is resolved.
    pub async fn wait(&self) -> CompletionSource {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|resolved| *resolved)
            .unwrap_or(CompletionSource::Timeout)
    }
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_resolution_wins() {
        let gate = CompletionGate::new();
        assert_eq!(gate.outcome(), None);
        assert!(gate.resolve(CompletionSource::Callback));
        assert!(!gate.resolve(CompletionSource::Timeout));
        assert_eq!(gate.outcome(), Some(CompletionSource::Callback));
    }

    #[tokio::test]
    async fn test_wait_returns_after_resolution_from_another_task() {
        let gate = CompletionGate::new();
        let resolver = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            resolver.resolve(CompletionSource::Timeout);
        });
        let source = tokio::time::timeout(Duration::from_secs(5), gate.wait())
            .await
            .unwrap();
        assert_eq!(source, CompletionSource::Timeout);
    }

    #[tokio::test]
    async fn test_wait_on_already_resolved_gate() {
        let gate = CompletionGate::new();
        gate.resolve(CompletionSource::Callback);
        assert_eq!(gate.wait().await, CompletionSource::Callback);
    }

    #[tokio::test]
    async fn test_racing_resolvers_resolve_once() {
        let gate = CompletionGate::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                let source = if i % 2 == 0 {
                    CompletionSource::Callback
                } else {
                    CompletionSource::Timeout
                };
                gate.resolve(source)
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
