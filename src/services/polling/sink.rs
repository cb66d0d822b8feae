use tokio::sync::broadcast;

use super::types::PollEvent;

pub const DEFAULT_RESULT_BUFFER: usize = 64;

/// Broadcast channel carrying completed query events to downstream consumers
#[derive(Debug, Clone)]
pub struct ResultSink {
    sender: broadcast::Sender<PollEvent>,
}

impl ResultSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of receivers the event reached
    pub fn publish(&self, event: PollEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!("No subscribers for poll event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_BUFFER)
    }
}
