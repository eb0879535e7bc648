//! Latest-wins debounced task runner.
//!
//! A [`Debouncer`] owns one logical stream of work (search queries, avatar
//! fetches, resolutions). Every submission aborts the previous one and is
//! stamped with a new [`Token`]; the owner feeds completions back through
//! [`Debouncer::accept`], which drops anything that is not the latest.
//! Separate streams use separate debouncers and never interfere.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::trace;

/// Request generation. Larger is newer; `0` is never issued.
pub type Token = u64;

/// Output of a submitted operation, tagged with the token it was issued under.
#[derive(Debug)]
pub struct Completion<T> {
    pub token: Token,
    pub output: T,
}

pub struct Debouncer<T> {
    delay: Duration,
    latest: Token,
    pending: Option<JoinHandle<()>>,
    tx: UnboundedSender<Completion<T>>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer and the receiving end of its completion stream.
    pub fn new(delay: Duration) -> (Self, UnboundedReceiver<Completion<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            latest: 0,
            pending: None,
            tx,
        };
        (debouncer, rx)
    }

    /// Schedule `op` to run once the quiet interval has passed, superseding
    /// whatever was submitted before.
    pub fn submit<F>(&mut self, op: F) -> Token
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.abort_pending();
        self.latest += 1;
        let token = self.latest;
        let delay = self.delay;
        let tx = self.tx.clone();

        self.pending = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let output = op.await;
            // A closed channel means the owner is gone; nothing to deliver to.
            let _ = tx.send(Completion { token, output });
        }));

        token
    }

    /// Drop pending work. Nothing is delivered for it, and anything already
    /// queued becomes stale.
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.latest += 1;
    }

    /// Unwrap a completion if it belongs to the latest submission.
    pub fn accept(&self, completion: Completion<T>) -> Option<T> {
        if completion.token == self.latest {
            Some(completion.output)
        } else {
            trace!(
                token = completion.token,
                latest = self.latest,
                "dropping stale completion"
            );
            None
        }
    }

    #[cfg(test)]
    pub fn is_current(&self, token: Token) -> bool {
        token == self.latest
    }

    /// Whether a submitted task is still waiting or running.
    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
