use crate::codec::StreamRecord;
use crate::delta::Delta;
use tokio::sync::mpsc;
use tracing::debug;

/// Write half of one request's outbound stream.
///
/// Cloned into every tool invocation of the request. Sending never fails
/// loudly: once the client is gone every send returns `false` and the record
/// is dropped, so producers can check [`DeltaSink::is_closed`] and stop early.
#[derive(Debug, Clone)]
pub struct DeltaSink {
    tx: mpsc::UnboundedSender<StreamRecord>,
}

impl DeltaSink {
    /// Creates a sink and the receiver the transport drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Sends a delta; returns whether the receiver is still attached.
    pub fn send(&self, delta: Delta) -> bool {
        self.push(StreamRecord::Data(delta))
    }

    /// Sends an answer token.
    pub fn token(&self, text: impl Into<String>) -> bool {
        self.push(StreamRecord::Token(text.into()))
    }

    /// Sends the top-level error record.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.push(StreamRecord::Error(message.into()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, record: StreamRecord) -> bool {
        match self.tx.send(record) {
            Ok(()) => true,
            Err(_) => {
                debug!("Client disconnected, dropping stream record");
                false
            }
        }
    }
}
