//! Single-producer, multi-consumer sample distribution.
//!
//! A capability owns one [`Fanout`] and publishes every decoded sample into it.
//! How a slow subscriber affects the others is decided by [`Backpressure`]:
//!
//! - `Block`: each subscriber gets a bounded hand-off slot and the producer
//!   awaits every subscriber in registration order, so one slow subscriber
//!   delays all of them.
//! - `DropOldest`: each subscriber gets its own ring of `capacity` samples and
//!   a lagging subscriber loses the oldest ones. The producer never waits.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

/// Delivery policy applied when a subscriber falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum Backpressure {
    /// Hand-off with at most `capacity` queued samples per subscriber
    Block { capacity: usize },
    /// Bounded ring per subscriber, oldest samples are discarded
    DropOldest { capacity: usize },
}

impl Default for Backpressure {
    fn default() -> Self {
        Backpressure::Block { capacity: 1 }
    }
}

enum Sinks {
    Block {
        capacity: usize,
        senders: Mutex<Vec<mpsc::Sender<u16>>>,
    },
    DropOldest {
        sender: Mutex<Option<broadcast::Sender<u16>>>,
    },
}

/// Fan-out point for one capability's samples.
pub struct Fanout {
    policy: Backpressure,
    sinks: Sinks,
    closed: AtomicBool,
}

impl Fanout {
    /// Create a fan-out with the given backpressure policy.
    pub fn new(policy: Backpressure) -> Self {
        let sinks = match policy {
            Backpressure::Block { capacity } => Sinks::Block {
                capacity: capacity.max(1),
                senders: Mutex::new(Vec::new()),
            },
            Backpressure::DropOldest { capacity } => {
                let (tx, _) = broadcast::channel(capacity.max(1));
                Sinks::DropOldest {
                    sender: Mutex::new(Some(tx)),
                }
            }
        };

        Self {
            policy,
            sinks,
            closed: AtomicBool::new(false),
        }
    }

    /// The policy this fan-out was built with.
    pub fn policy(&self) -> Backpressure {
        self.policy
    }

    /// Register a new subscriber. Returns `None` once the fan-out is closed.
    pub fn subscribe(&self) -> Option<SampleStream> {
        if self.is_closed() {
            return None;
        }

        match &self.sinks {
            Sinks::Block { capacity, senders } => {
                let (tx, rx) = mpsc::channel(*capacity);
                senders
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(tx);
                Some(SampleStream::Block(rx))
            }
            Sinks::DropOldest { sender } => sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map(|tx| SampleStream::DropOldest(tx.subscribe())),
        }
    }

    /// Deliver a sample to every subscriber. Returns how many received it.
    pub async fn publish(&self, value: u16) -> usize {
        match &self.sinks {
            Sinks::Block { senders, .. } => {
                // Snapshot so the lock is not held across awaits
                let snapshot: Vec<_> = senders
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();

                let mut delivered = 0;
                let mut dropped = false;
                for tx in &snapshot {
                    if tx.send(value).await.is_ok() {
                        delivered += 1;
                    } else {
                        dropped = true;
                    }
                }

                if dropped {
                    senders
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|tx| !tx.is_closed());
                }

                delivered
            }
            Sinks::DropOldest { sender } => {
                let tx = sender
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                tx.and_then(|tx| tx.send(value).ok()).unwrap_or(0)
            }
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        match &self.sinks {
            Sinks::Block { senders, .. } => senders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|tx| !tx.is_closed())
                .count(),
            Sinks::DropOldest { sender } => sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map(|tx| tx.receiver_count())
                .unwrap_or(0),
        }
    }

    /// Drop every sink. Subscribers see the end of their stream once they have
    /// drained what was already queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        match &self.sinks {
            Sinks::Block { senders, .. } => senders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear(),
            Sinks::DropOldest { sender } => {
                sender.lock().unwrap_or_else(PoisonError::into_inner).take();
            }
        }
    }

    /// Whether [`Fanout::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("policy", &self.policy)
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving end of a [`Fanout`] subscription.
#[derive(Debug)]
pub enum SampleStream {
    Block(mpsc::Receiver<u16>),
    DropOldest(broadcast::Receiver<u16>),
}

impl SampleStream {
    /// Wait for the next sample. `None` means the producer is gone.
    pub async fn recv(&mut self) -> Option<u16> {
        match self {
            SampleStream::Block(rx) => rx.recv().await,
            SampleStream::DropOldest(rx) => loop {
                match rx.recv().await {
                    Ok(value) => return Some(value),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Subscriber lagged, dropped {} samples", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }
}
