//! Connection draining for graceful shutdown.
//!
//! The accept loop owns a [`Drain`] and gives a [`Watch`] to every
//! connection task. [`Drain::start`] flips a [`watch`] channel that all the
//! watches observe, and [`Drain::finish`] resolves once every [`Watch`] has
//! been dropped. Each watch carries a clone of an [`mpsc`] sender that is
//! never used for sending, so the receiver only wakes up when the last
//! clone is gone.

use std::future;

use tokio::sync::{mpsc, watch};

pub(crate) struct Drain {
    /// `true` once draining has started.
    signal: watch::Sender<bool>,

    /// Handed out to watches. Dropped in [`Drain::finish`].
    token: mpsc::Sender<()>,

    /// Closed when all tokens are dropped.
    done: mpsc::Receiver<()>,
}

/// Held by a connection task for as long as the connection is open.
pub(crate) struct Watch {
    signal: watch::Receiver<bool>,
    _token: mpsc::Sender<()>,
}

impl Drain {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        let (token, done) = mpsc::channel(1);

        Self {
            signal,
            token,
            done,
        }
    }

    pub fn watch(&self) -> Watch {
        Watch {
            signal: self.signal.subscribe(),
            _token: self.token.clone(),
        }
    }

    /// Tells every watch to wind down and returns how many are still alive.
    pub fn start(&self) -> usize {
        self.signal.send_replace(true);
        self.signal.receiver_count()
    }

    /// Waits until all watches are dropped. Doesn't start the drain on its
    /// own, see [`Drain::start`].
    pub async fn finish(self) {
        let Self {
            signal,
            token,
            mut done,
        } = self;

        drop(token);
        let _ = done.recv().await;

        // Watches waiting on the signal would otherwise see a closed channel.
        drop(signal);
    }
}

impl Watch {
    /// Resolves once the drain has started, including when it started
    /// before this watch was created.
    pub async fn signaled(&mut self) {
        if self.signal.wait_for(|draining| *draining).await.is_err() {
            // Drain dropped without starting, nothing will ever come.
            future::pending::<()>().await;
        }
    }
}
