//! Marshaling worker results back onto the UI thread.
//!
//! Network calls run as tokio tasks; they never touch UI state `S`
//! directly. Instead each completion posts a callback through a
//! [`Dispatcher`], and the UI thread runs the queued callbacks against its
//! state with [`Inbox::pump`] from its own event loop. Once the inbox is
//! gone (the view was closed), posted callbacks are silently dropped.

use std::future::Future;

use futures::FutureExt as _;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

type Callback<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Sending half, cloned into workers.
pub struct Dispatcher<S> {
    tx: mpsc::UnboundedSender<Callback<S>>,
}

/// Receiving half, owned by the UI thread.
pub struct Inbox<S> {
    rx: mpsc::UnboundedReceiver<Callback<S>>,
}

pub fn channel<S>() -> (Dispatcher<S>, Inbox<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { tx }, Inbox { rx })
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> Dispatcher<S> {
    /// Queues `callback` for the UI thread. Returns `false` if the UI side
    /// no longer exists.
    pub fn post(
        &self,
        callback: impl FnOnce(&mut S) + Send + 'static,
    ) -> bool {
        let delivered = self.tx.send(Box::new(callback)).is_ok();
        if !delivered {
            debug!("inbox closed, callback dropped");
        }
        delivered
    }

    /// Runs `work` on a worker task and posts `then` with its output.
    ///
    /// Must be called within a tokio runtime. The returned handle is for
    /// awaiting completion only: requests are not cancellable.
    pub fn run<F>(
        &self,
        work: F,
        then: impl FnOnce(&mut S, F::Output) + Send + 'static,
    ) -> JoinHandle<()>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let dispatcher = self.clone();
        tokio::spawn(work.map(move |output| {
            dispatcher.post(move |state| then(state, output));
        }))
    }
}

impl<S> Inbox<S> {
    /// Runs every queued callback against `state`. Returns how many ran.
    pub fn pump(&mut self, state: &mut S) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback(state);
            ran += 1;
        }
        ran
    }

    /// Waits for the next callback and runs it. `false` once every
    /// dispatcher has been dropped.
    pub async fn pump_next(&mut self, state: &mut S) -> bool {
        match self.rx.recv().await {
            Some(callback) => {
                callback(state);
                true
            }
            None => false,
        }
    }
}
