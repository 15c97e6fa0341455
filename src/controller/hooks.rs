//! Ordered pre/post listeners around every controller operation.

use crate::errors::ControllerError;
use crate::query::SearchOptions;
use crate::store::FindOptions;
use bson::Document;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a listener is told about, borrowed from the running operation.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Created,
    PreReset,
    PostReset,
    PreInsertOne { doc: &'a Document },
    PostInsertOne { result: Option<&'a Document>, doc: &'a Document },
    PreInsertMany { docs: &'a [Document] },
    PostInsertMany { result: &'a [Document], docs: &'a [Document] },
    PreFind { filter: &'a Document, options: &'a FindOptions },
    PostFind { result: &'a [Document], filter: &'a Document, options: &'a FindOptions },
    PreFindOne { filter: &'a Document },
    PostFindOne { result: Option<&'a Document>, filter: &'a Document },
    PreFindById { id: &'a str },
    PostFindById { result: Option<&'a Document>, id: &'a str },
    PreUpdateOne { filter: &'a Document, update: &'a Document },
    PostUpdateOne { result: Option<&'a Document>, filter: &'a Document, update: &'a Document },
    PreUpdateMany { filter: &'a Document, update: &'a Document },
    PostUpdateMany { result: &'a [Document], filter: &'a Document, update: &'a Document },
    PreUpdateById { id: &'a str, update: &'a Document },
    PostUpdateById { result: Option<&'a Document>, id: &'a str, update: &'a Document },
    PreDeleteOne { filter: &'a Document },
    PostDeleteOne { result: Option<&'a Document>, filter: &'a Document },
    PreDeleteMany { filter: &'a Document },
    PostDeleteMany { result: &'a [Document], filter: &'a Document },
    PreDeleteById { id: &'a str },
    PostDeleteById { result: Option<&'a Document>, id: &'a str },
    PreSearch { options: &'a SearchOptions },
    PostSearch { result: &'a [Document], options: &'a SearchOptions },
    PreCount { options: &'a SearchOptions },
    PostCount { total: u64, options: &'a SearchOptions },
}

/// Event names listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    PreReset,
    PostReset,
    PreInsertOne,
    PostInsertOne,
    PreInsertMany,
    PostInsertMany,
    PreFind,
    PostFind,
    PreFindOne,
    PostFindOne,
    PreFindById,
    PostFindById,
    PreUpdateOne,
    PostUpdateOne,
    PreUpdateMany,
    PostUpdateMany,
    PreUpdateById,
    PostUpdateById,
    PreDeleteOne,
    PostDeleteOne,
    PreDeleteMany,
    PostDeleteMany,
    PreDeleteById,
    PostDeleteById,
    PreSearch,
    PostSearch,
    PreCount,
    PostCount,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::PreReset => "pre-reset",
            Self::PostReset => "post-reset",
            Self::PreInsertOne => "pre-insert-one",
            Self::PostInsertOne => "post-insert-one",
            Self::PreInsertMany => "pre-insert-many",
            Self::PostInsertMany => "post-insert-many",
            Self::PreFind => "pre-find",
            Self::PostFind => "post-find",
            Self::PreFindOne => "pre-find-one",
            Self::PostFindOne => "post-find-one",
            Self::PreFindById => "pre-find-by-id",
            Self::PostFindById => "post-find-by-id",
            Self::PreUpdateOne => "pre-update-one",
            Self::PostUpdateOne => "post-update-one",
            Self::PreUpdateMany => "pre-update-many",
            Self::PostUpdateMany => "post-update-many",
            Self::PreUpdateById => "pre-update-by-id",
            Self::PostUpdateById => "post-update-by-id",
            Self::PreDeleteOne => "pre-delete-one",
            Self::PostDeleteOne => "post-delete-one",
            Self::PreDeleteMany => "pre-delete-many",
            Self::PostDeleteMany => "post-delete-many",
            Self::PreDeleteById => "pre-delete-by-id",
            Self::PostDeleteById => "post-delete-by-id",
            Self::PreSearch => "pre-search",
            Self::PostSearch => "post-search",
            Self::PreCount => "pre-count",
            Self::PostCount => "post-count",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event<'_> {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Created => EventKind::Created,
            Self::PreReset => EventKind::PreReset,
            Self::PostReset => EventKind::PostReset,
            Self::PreInsertOne { .. } => EventKind::PreInsertOne,
            Self::PostInsertOne { .. } => EventKind::PostInsertOne,
            Self::PreInsertMany { .. } => EventKind::PreInsertMany,
            Self::PostInsertMany { .. } => EventKind::PostInsertMany,
            Self::PreFind { .. } => EventKind::PreFind,
            Self::PostFind { .. } => EventKind::PostFind,
            Self::PreFindOne { .. } => EventKind::PreFindOne,
            Self::PostFindOne { .. } => EventKind::PostFindOne,
            Self::PreFindById { .. } => EventKind::PreFindById,
            Self::PostFindById { .. } => EventKind::PostFindById,
            Self::PreUpdateOne { .. } => EventKind::PreUpdateOne,
            Self::PostUpdateOne { .. } => EventKind::PostUpdateOne,
            Self::PreUpdateMany { .. } => EventKind::PreUpdateMany,
            Self::PostUpdateMany { .. } => EventKind::PostUpdateMany,
            Self::PreUpdateById { .. } => EventKind::PreUpdateById,
            Self::PostUpdateById { .. } => EventKind::PostUpdateById,
            Self::PreDeleteOne { .. } => EventKind::PreDeleteOne,
            Self::PostDeleteOne { .. } => EventKind::PostDeleteOne,
            Self::PreDeleteMany { .. } => EventKind::PreDeleteMany,
            Self::PostDeleteMany { .. } => EventKind::PostDeleteMany,
            Self::PreDeleteById { .. } => EventKind::PreDeleteById,
            Self::PostDeleteById { .. } => EventKind::PostDeleteById,
            Self::PreSearch { .. } => EventKind::PreSearch,
            Self::PostSearch { .. } => EventKind::PostSearch,
            Self::PreCount { .. } => EventKind::PreCount,
            Self::PostCount { .. } => EventKind::PostCount,
        }
    }
}

pub type Listener = Arc<dyn Fn(&Event<'_>) -> Result<(), ControllerError> + Send + Sync>;

struct Entry {
    listener: Listener,
    once: bool,
}

/// Listener registry. Listeners run synchronously in registration order; the
/// first error stops the chain and aborts the surrounding operation.
#[derive(Default)]
pub struct Hooks {
    listeners: Mutex<HashMap<EventKind, Vec<Entry>>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&'static str, usize> =
            self.listeners.lock().iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("Hooks").field("listeners", &counts).finish()
    }
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, kind: EventKind, listener: Listener, once: bool) {
        self.listeners.lock().entry(kind).or_default().push(Entry { listener, once });
    }

    pub fn on<F>(&self, kind: EventKind, f: F) -> &Self
    where
        F: Fn(&Event<'_>) -> Result<(), ControllerError> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(f), false);
        self
    }

    /// Like [`Hooks::on`], removed after its first call.
    pub fn once<F>(&self, kind: EventKind, f: F) -> &Self
    where
        F: Fn(&Event<'_>) -> Result<(), ControllerError> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(f), true);
        self
    }

    pub fn remove_all(&self, kind: EventKind) {
        self.listeners.lock().remove(&kind);
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Runs the listeners of `event.kind()`.
    ///
    /// # Errors
    /// The first listener error.
    pub fn emit(&self, event: &Event<'_>) -> Result<(), ControllerError> {
        let kind = event.kind();
        // Snapshot so listeners may register or emit without deadlocking.
        let snapshot: Vec<Listener> = {
            let mut map = self.listeners.lock();
            let Some(entries) = map.get_mut(&kind) else {
                return Ok(());
            };
            let out = entries.iter().map(|e| Arc::clone(&e.listener)).collect();
            entries.retain(|e| !e.once);
            out
        };
        log::trace!("emit {kind} to {} listener(s)", snapshot.len());
        for listener in snapshot {
            listener(event).map_err(|e| {
                log::warn!("{kind} listener failed: {e}");
                e
            })?;
        }
        Ok(())
    }
}
