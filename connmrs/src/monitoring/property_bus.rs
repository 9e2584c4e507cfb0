//! Property change fan-out for bound remote objects.
//!
//! Every handle owns one [`PropertyBus`]. Binding a remote object attaches its
//! `PropertyChanged` stream to the bus through a pump task; the returned
//! [`Subscription`] owns that task and stops it when dropped.
//!
//! Each attach starts a new generation. Events are tagged with the generation
//! of the binding that produced them, and [`PropertyEvents`] only yields events
//! of the current generation. Once a rebind returns, nothing from the previous
//! binding reaches application code, including events already queued in the
//! channel.

use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::api::models::PropertyChange;
use crate::dbus::{Signal, SignalStream};
use crate::types::constants::EVENT_CHANNEL_CAPACITY;

/// Owns a background task that forwards signals. Dropping it stops the task.
#[derive(Debug)]
pub(crate) struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(task),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Broadcast channel of [`PropertyChange`] events for one handle.
#[derive(Debug, Clone)]
pub(crate) struct PropertyBus {
    sender: broadcast::Sender<PropertyChange>,
    generation: Arc<AtomicU64>,
    seq: Arc<AtomicU64>,
}

impl PropertyBus {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            generation: Arc::new(AtomicU64::new(0)),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Opens a receiver. Receivers survive rebinds.
    pub(crate) fn events(&self) -> PropertyEvents {
        PropertyEvents {
            receiver: self.sender.subscribe(),
            generation: Arc::clone(&self.generation),
        }
    }

    /// Starts forwarding `PropertyChanged` signals from `stream`.
    ///
    /// Bumps the generation first, so events of earlier bindings become stale.
    pub(crate) fn attach(&self, source: String, mut stream: SignalStream) -> Subscription {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let sender = self.sender.clone();
        let seq = Arc::clone(&self.seq);
        debug!("Attached {source} (generation {generation})");

        Subscription::spawn(async move {
            while let Some(signal) = stream.next().await {
                let Signal::PropertyChanged { name, value } = signal else {
                    continue;
                };
                let change = PropertyChange {
                    name,
                    value,
                    source: source.clone(),
                    seq: seq.fetch_add(1, Ordering::SeqCst),
                    generation,
                };
                // No receivers is fine; the event is simply not observed.
                let _ = sender.send(change);
            }
            debug!("Signal stream of {source} ended");
        })
    }

    /// Makes every queued and future event of the current binding stale.
    pub(crate) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Receiver of property changes for one handle.
///
/// Only events of the handle's current binding are yielded.
///
/// Each receiver buffers at most [`EVENT_CHANNEL_CAPACITY`] events. When it
/// falls further behind, the oldest are dropped with a warning and delivery
/// resumes with the oldest event still buffered.
#[derive(Debug)]
pub struct PropertyEvents {
    receiver: broadcast::Receiver<PropertyChange>,
    generation: Arc<AtomicU64>,
}

impl PropertyEvents {
    fn is_current(&self, change: &PropertyChange) -> bool {
        change.generation == self.generation.load(Ordering::SeqCst)
    }

    /// Waits for the next property change.
    ///
    /// Returns `None` once the owning handle is gone.
    pub async fn next(&mut self) -> Option<PropertyChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.is_current(&change) => return Some(change),
                Ok(change) => debug!("Dropping stale {} from {}", change.name, change.source),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Property receiver lagged, {missed} events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already delivered change without waiting.
    pub fn try_next(&mut self) -> Option<PropertyChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if self.is_current(&change) => return Some(change),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("Property receiver lagged, {missed} events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Converts the receiver into a stream.
    pub fn into_stream(self) -> BoxStream<'static, PropertyChange> {
        stream::unfold(self, |mut events| async move {
            events.next().await.map(|change| (change, events))
        })
        .boxed()
    }
}
