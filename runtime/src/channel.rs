//! Action ingress and observer streams.
//!
//! Every action that enters the store, dispatched or synthetic, passes
//! through the [`ActionChannel`] exactly once, in processing order. External
//! observers receive clones through bounded broadcast channels; a slow
//! observer skips the oldest values instead of blocking reduction.

use composable_store_core::Action;
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Ingress point for actions.
#[derive(Debug)]
pub struct ActionChannel {
    sender: broadcast::Sender<Action>,
    dispatched: AtomicU64,
}

impl ActionChannel {
    /// Create a channel whose observers buffer up to `capacity` actions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            dispatched: AtomicU64::new(0),
        }
    }

    /// Deliver `action` to every current observer.
    ///
    /// Returns the action's sequence number (starting at 1).
    pub fn next(&self, action: &Action) -> u64 {
        let sequence = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        // No receivers is fine: nobody is observing raw actions
        let _ = self.sender.send(action.clone());
        tracing::trace!(sequence, action = %action, "Action entered channel");
        sequence
    }

    /// Subscribe to actions delivered from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.sender.subscribe()
    }

    /// Number of actions delivered so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Turn a broadcast receiver into a stream, optionally yielding `first`
/// before any live value.
///
/// The receiver must already be subscribed so that nothing published after
/// this call is missed. The stream ends when every sender is dropped.
pub fn broadcast_stream<T>(
    first: Option<T>,
    mut receiver: broadcast::Receiver<T>,
    stream_name: &'static str,
) -> BoxStream<'static, T>
where
    T: Clone + Send + 'static,
{
    Box::pin(async_stream::stream! {
        if let Some(first) = first {
            yield first;
        }

        loop {
            match receiver.recv().await {
                Ok(value) => yield value,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Slow consumer, oldest values were dropped
                    tracing::warn!(
                        stream = stream_name,
                        skipped,
                        "Observer lagged, {} values skipped",
                        skipped
                    );
                },
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
