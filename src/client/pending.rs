use std::collections::{hash_map, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time;

use crate::{log_debug, CorrelationId, RelayError, Result};

/// Outcome delivered to a waiting caller.
pub type Outcome = Result<Bytes>;

type Slot = oneshot::Sender<Outcome>;

struct Entry {
    /// Socket generation the request was written on; `None` until sent.
    generation: Option<u64>,
    tx: Slot,
}

#[derive(Default)]
struct Slots {
    entries: HashMap<CorrelationId, Entry>,
    /// Highest socket generation known to be dead.
    retired: u64,
}

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The protected map has no invariants spanning multiple entries and the
/// lock is never held across user code, so a poisoned guard is still usable.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Tracks requests waiting for a reply.
///
/// Maps each live correlation id to a write-once oneshot slot. Every way of
/// finishing a slot (`resolve`, `cancel`, `drain_all`, `fail_generation`)
/// starts by removing the entry under the lock, so whichever call removes it
/// first is the only one that can complete it.
///
/// Entries remember which socket generation carried their request, so a
/// dead socket fails only its own requests.
///
/// The lock guards plain map operations only and is never held across an
/// `.await`.
#[derive(Default)]
pub struct CorrelationTable {
    // ---
    slots: Mutex<Slots>,
}

impl CorrelationTable {
    // ---

    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        lock_ignore_poison(&self.slots)
    }

    /// Register a new pending request.
    ///
    /// Returns the receiver the caller awaits.
    ///
    /// # Errors
    ///
    /// [`RelayError::DuplicateId`] if `correlation_id` is already live.
    pub fn register(&self, correlation_id: CorrelationId) -> Result<oneshot::Receiver<Outcome>> {
        // ---
        let mut slots = self.lock();

        match slots.entries.entry(correlation_id) {
            hash_map::Entry::Occupied(entry) => Err(RelayError::DuplicateId(entry.key().clone())),
            hash_map::Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.insert(Entry { generation: None, tx });
                Ok(rx)
            }
        }
    }

    /// Complete the request registered under `correlation_id` with `payload`.
    ///
    /// Returns false if no such request is pending (already resolved,
    /// cancelled, drained, or never registered).
    pub fn resolve(&self, correlation_id: &CorrelationId, payload: Bytes) -> bool {
        // ---
        let entry = self.lock().entries.remove(correlation_id);

        match entry {
            Some(entry) => {
                if entry.tx.send(Ok(payload)).is_err() {
                    log_debug!("reply arrived after request abandoned (correlation_id: {correlation_id})");
                }
                true
            }
            None => false,
        }
    }

    /// Remove a pending request without delivering anything.
    ///
    /// Returns false if another path already claimed the slot.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        // ---
        self.lock().entries.remove(correlation_id).is_some()
    }

    /// Fail every pending request with `error`.
    ///
    /// The map is swapped out under the lock before any slot is completed, so
    /// requests registered afterwards are untouched. Returns the number of
    /// requests failed.
    pub fn drain_all(&self, error: RelayError) -> usize {
        // ---
        let drained = std::mem::take(&mut self.lock().entries);
        let count = drained.len();

        for (_, entry) in drained {
            let _ = entry.tx.send(Err(error.clone()));
        }

        count
    }

    /// Record that `correlation_id` is about to be written on socket
    /// `generation`.
    ///
    /// Returns false if that socket has already been retired; the request
    /// is then removed, since nothing will ever answer it.
    pub(crate) fn bind(&self, correlation_id: &CorrelationId, generation: u64) -> bool {
        // ---
        let mut slots = self.lock();

        if generation <= slots.retired {
            slots.entries.remove(correlation_id);
            return false;
        }
        if let Some(entry) = slots.entries.get_mut(correlation_id) {
            entry.generation = Some(generation);
        }
        true
    }

    /// Retire socket `generation` and fail every request written on it
    /// (or on any older socket) with `error`.
    ///
    /// Requests not yet written, or written on a newer socket, are left
    /// alone. Returns the number of requests failed.
    pub(crate) fn fail_generation(&self, generation: u64, error: RelayError) -> usize {
        // ---
        let failed: Vec<Entry> = {
            let mut slots = self.lock();
            slots.retired = slots.retired.max(generation);

            let dead: Vec<CorrelationId> = slots
                .entries
                .iter()
                .filter(|(_, entry)| entry.generation.is_some_and(|g| g <= generation))
                .map(|(id, _)| id.clone())
                .collect();

            dead.iter()
                .filter_map(|id| slots.entries.remove(id))
                .collect()
        };

        let count = failed.len();
        for entry in failed {
            let _ = entry.tx.send(Err(error.clone()));
        }
        count
    }

    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.lock().entries.contains_key(correlation_id)
    }

    /// Get the number of pending requests
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

/// A registered request, owned by the caller that is waiting on it.
///
/// Dropping the slot removes its table entry, so the entry never outlives
/// the call, whether it returns, fails, times out, or is itself cancelled.
pub(crate) struct PendingSlot {
    // ---
    correlation_id: CorrelationId,
    table: Arc<CorrelationTable>,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingSlot {
    // ---

    pub(crate) fn register(table: &Arc<CorrelationTable>, correlation_id: CorrelationId) -> Result<Self> {
        // ---
        let rx = table.register(correlation_id.clone())?;

        Ok(Self {
            correlation_id,
            table: Arc::clone(table),
            rx,
        })
    }

    pub(crate) fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Wait for the slot to be completed, or for `timeout` to elapse.
    pub(crate) async fn wait(mut self, timeout: Duration) -> Outcome {
        // ---
        match time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RelayError::Connection(
                "pending request dropped without a reply".into(),
            )),
            Err(_elapsed) => {
                if self.table.cancel(&self.correlation_id) {
                    return Err(RelayError::Timeout);
                }

                // Lost the race: the winner removed the entry and is about to
                // send (or has sent) on the channel.
                match (&mut self.rx).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RelayError::Timeout),
                }
            }
        }
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.table.cancel(&self.correlation_id);
    }
}
