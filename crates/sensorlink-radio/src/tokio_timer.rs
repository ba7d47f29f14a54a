//! Tokio-backed [`Timer`].

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::traits::Timer;

/// Timer that spawns one sleeping task per expiry and reports the context
/// on an unbounded channel.
///
/// `schedule` must be called from within a tokio runtime.
pub struct TokioTimer<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> fmt::Debug for TokioTimer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioTimer")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<E: Send + 'static> TokioTimer<E> {
    /// Create a timer and the receiver its expiries arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<E: Send + 'static> Timer<E> for TokioTimer<E> {
    fn schedule(&mut self, delay: Duration, context: E) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(context).is_err() {
                trace!("timer receiver closed, expiry dropped");
            }
        });
    }
}
