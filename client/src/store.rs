//! Observable mirror of one backend collection.
//!
//! An [`EntityStore`] is created once per resource and shared by `Arc` between
//! the service that mutates it and whatever renders it. Each piece of state is
//! a `tokio::sync::watch` channel, so readers can either poll the current
//! value or await changes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::watch;

use daybook_shared::{Entity, EntityId, ResponseMeta};

/// Result of applying a server-confirmed update to the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The mirrored record was replaced
    Applied,
    /// The mirror already holds a newer version; nothing changed
    Stale,
    /// No record with that id is mirrored
    NotMirrored,
}

/// Handed out by [`EntityStore::begin_request`], returned to
/// [`EntityStore::finish_request`].
#[derive(Debug)]
#[must_use]
pub struct RequestTicket {
    errors_seen: u64,
}

pub struct EntityStore<T> {
    items: watch::Sender<Vec<T>>,
    selected: watch::Sender<Option<T>>,
    loading: watch::Sender<bool>,
    error: watch::Sender<Option<String>>,
    meta: watch::Sender<Option<ResponseMeta>>,
    revision: AtomicU64,
    in_flight: AtomicUsize,
    /// Number of errors recorded so far
    errors: AtomicU64,
}

impl<T> Default for EntityStore<T>
where
    T: Entity + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntityStore<T>
where
    T: Entity + Clone,
{
    pub fn new() -> Self {
        Self {
            items: watch::channel(Vec::new()).0,
            selected: watch::channel(None).0,
            loading: watch::channel(false).0,
            error: watch::channel(None).0,
            meta: watch::channel(None).0,
            revision: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    pub fn find(&self, id: &EntityId) -> Option<T> {
        self.items.borrow().iter().find(|item| item.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn selected(&self) -> Option<T> {
        self.selected.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    pub fn meta(&self) -> Option<ResponseMeta> {
        *self.meta.borrow()
    }

    /// Bumped on every change to the mirrored items.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn subscribe_items(&self) -> watch::Receiver<Vec<T>> {
        self.items.subscribe()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<T>> {
        self.selected.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    /// Replace the whole mirror with a fresh server listing.
    pub fn replace_all(&self, items: Vec<T>) {
        self.items.send_replace(items);
        self.bump();
    }

    pub fn push(&self, item: T) {
        self.items.send_modify(|items| items.push(item));
        self.bump();
    }

    /// Replace the record with the same id, unless the mirror is newer.
    pub fn apply_update(&self, item: T) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::NotMirrored;
        self.items.send_if_modified(|items| {
            match items.iter_mut().find(|existing| existing.id() == item.id()) {
                Some(existing) if is_stale(&*existing, &item) => {
                    outcome = UpdateOutcome::Stale;
                    false
                }
                Some(existing) => {
                    *existing = item.clone();
                    outcome = UpdateOutcome::Applied;
                    true
                }
                None => false,
            }
        });

        match outcome {
            UpdateOutcome::Stale => {
                tracing::warn!("Ignoring stale update for {}", item.id());
            }
            _ => {
                if outcome == UpdateOutcome::Applied {
                    self.bump();
                }
                self.selected.send_if_modified(|selected| match selected {
                    Some(current) if current.id() == item.id() && !is_stale(&*current, &item) => {
                        *current = item.clone();
                        true
                    }
                    _ => false,
                });
            }
        }

        outcome
    }

    /// Drop the record with `id`. Returns whether anything was removed.
    pub fn remove(&self, id: &EntityId) -> bool {
        let removed = self.items.send_if_modified(|items| {
            let before = items.len();
            items.retain(|item| item.id() != id);
            items.len() != before
        });
        if removed {
            self.bump();
        }
        self.clear_selected_if(id);
        removed
    }

    pub fn select(&self, item: Option<T>) {
        self.selected.send_replace(item);
    }

    pub fn clear_selected_if(&self, id: &EntityId) {
        self.selected.send_if_modified(|selected| {
            if selected.as_ref().map_or(false, |s| s.id() == id) {
                *selected = None;
                true
            } else {
                false
            }
        });
    }

    /// Number of requests currently running against this store.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mark a request as started. `loading` stays true until every started
    /// request has finished.
    pub fn begin_request(&self) -> RequestTicket {
        let ticket = RequestTicket {
            errors_seen: self.errors.load(Ordering::SeqCst),
        };
        self.loading.send_if_modified(|loading| {
            let count = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            publish(loading, count > 0)
        });
        ticket
    }

    /// Mark a request as finished with its outcome.
    ///
    /// A success clears the error only if no other request recorded one
    /// after this request began.
    pub fn finish_request(&self, ticket: RequestTicket, error: Option<String>) {
        match error {
            Some(message) => self.set_error(Some(message)),
            None => {
                self.error.send_if_modified(|current| {
                    if self.errors.load(Ordering::SeqCst) != ticket.errors_seen || current.is_none() {
                        return false;
                    }
                    *current = None;
                    true
                });
            }
        }

        self.loading.send_if_modified(|loading| {
            let count = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            publish(loading, count > 0)
        });
    }

    /// Record or clear the error unconditionally.
    pub fn set_error(&self, error: Option<String>) {
        self.error.send_modify(|current| {
            if error.is_some() {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            *current = error;
        });
    }

    pub fn set_meta(&self, meta: Option<ResponseMeta>) {
        self.meta.send_replace(meta);
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

fn publish(loading: &mut bool, value: bool) -> bool {
    if *loading == value {
        return false;
    }
    *loading = value;
    true
}

/// An incoming record is stale when both carry a timestamp and it is older.
fn is_stale<T: Entity>(current: &T, incoming: &T) -> bool {
    match (current.updated_at(), incoming.updated_at()) {
        (Some(current), Some(incoming)) => incoming < current,
        _ => false,
    }
}
