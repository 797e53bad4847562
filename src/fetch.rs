//! Keyed async fetch state.
//!
//! A [`FetchLifecycle`] owns the state of every key it has been asked to fetch.
//! `trigger` moves a key to `Loading` and spawns the operation; the operation's
//! result comes back as a [`Completion`] that the owner feeds to `settle` on its
//! own loop. Every trigger takes a fresh ticket, and a completion only lands if
//! its ticket is still the key's current one, so the newest trigger always
//! decides the final state.

use crate::error::{RetryError, TransportError};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Idle,
    Loading,
    Success { value: T, fetched_at: DateTime<Utc> },
    Error { message: String },
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FetchState::Error { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchState::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Error { message } => Some(message),
            _ => None,
        }
    }
}

pub type Operation<K, T> =
    Arc<dyn Fn(K) -> BoxFuture<'static, Result<T, TransportError>> + Send + Sync>;

/// Identifies one trigger of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    pub key: K,
    pub id: u64,
}

#[derive(Debug)]
pub struct Completion<K, T> {
    pub ticket: Ticket<K>,
    pub outcome: Result<T, TransportError>,
}

struct Slot<T> {
    state: FetchState<T>,
    current: Option<u64>,
}

pub struct FetchLifecycle<K, T> {
    name: &'static str,
    operation: Operation<K, T>,
    slots: HashMap<K, Slot<T>>,
    next_ticket: u64,
    idle: FetchState<T>,
    tx: mpsc::UnboundedSender<Completion<K, T>>,
    rx: mpsc::UnboundedReceiver<Completion<K, T>>,
}

impl<K, T> FetchLifecycle<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    T: Send + 'static,
{
    pub fn new(name: &'static str, operation: Operation<K, T>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name,
            operation,
            slots: HashMap::new(),
            next_ticket: 0,
            idle: FetchState::Idle,
            tx,
            rx,
        }
    }

    pub fn state(&self, key: &K) -> &FetchState<T> {
        self.slots.get(key).map(|s| &s.state).unwrap_or(&self.idle)
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.slots.get(key).is_some_and(|s| s.current.is_some())
    }

    /// Moves `key` to `Loading` and hands out the ticket its result must carry.
    /// Any earlier in-flight ticket for the key is superseded.
    pub fn begin(&mut self, key: K) -> Ticket<K> {
        self.next_ticket += 1;
        let id = self.next_ticket;

        let slot = self.slots.entry(key.clone()).or_insert(Slot {
            state: FetchState::Idle,
            current: None,
        });
        if let Some(previous) = slot.current.replace(id) {
            tracing::debug!(fetch = self.name, ?key, previous, id, "superseding in-flight fetch");
        }
        slot.state = FetchState::Loading;

        tracing::info!(fetch = self.name, ?key, id, "fetch started");
        Ticket { key, id }
    }

    /// Starts the operation for `key` on the runtime. Must be called from
    /// within a tokio runtime.
    pub fn trigger(&mut self, key: K) -> Ticket<K> {
        let ticket = self.begin(key);
        let future = (self.operation)(ticket.key.clone());
        let tx = self.tx.clone();
        let sent = ticket.clone();

        let name = self.name;
        tokio::spawn(async move {
            // A panicking operation still has to settle its key.
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(fetch = name, key = ?sent.key, id = sent.id, "fetch operation panicked");
                    Err(TransportError::Request("operation panicked".to_string()))
                }
            };
            // The receiver lives as long as the lifecycle; a closed channel
            // just means nobody is left to care about this result.
            let _ = tx.send(Completion {
                ticket: sent,
                outcome,
            });
        });

        ticket
    }

    /// Re-runs the operation for a key whose last fetch failed.
    pub fn retry(&mut self, key: K) -> Result<Ticket<K>, RetryError> {
        if !self.state(&key).is_error() {
            return Err(RetryError::NotInError);
        }
        Ok(self.trigger(key))
    }

    /// Applies a finished operation. Returns `false` when the ticket was
    /// superseded or its key forgotten, in which case nothing changes.
    pub fn settle(&mut self, completion: Completion<K, T>) -> bool {
        let Completion { ticket, outcome } = completion;

        let Some(slot) = self.slots.get_mut(&ticket.key) else {
            tracing::debug!(fetch = self.name, key = ?ticket.key, id = ticket.id, "discarding result for forgotten key");
            return false;
        };
        if slot.current != Some(ticket.id) {
            tracing::debug!(fetch = self.name, key = ?ticket.key, id = ticket.id, "discarding superseded result");
            return false;
        }

        slot.current = None;
        slot.state = match outcome {
            Ok(value) => {
                tracing::info!(fetch = self.name, key = ?ticket.key, id = ticket.id, "fetch succeeded");
                FetchState::Success {
                    value,
                    fetched_at: Utc::now(),
                }
            }
            Err(err) => {
                tracing::warn!(fetch = self.name, key = ?ticket.key, id = ticket.id, error = %err, "fetch failed");
                FetchState::Error {
                    message: err.to_string(),
                }
            }
        };
        true
    }

    /// Waits for the next finished operation.
    pub async fn next_completion(&mut self) -> Option<Completion<K, T>> {
        self.rx.recv().await
    }

    /// Settles everything that has already finished without waiting.
    pub fn settle_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.settle(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Drops the key's state; its in-flight result, if any, will be ignored.
    pub fn forget(&mut self, key: &K) {
        self.slots.remove(key);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
