use super::aggregate::run_pipeline;
use super::apply::apply_update;
use super::eval::{compare_docs, matches_filter};
use super::{DeleteReport, DocumentStore, FindOptions, UpdateReport};
use crate::errors::ControllerError;
use async_trait::async_trait;
use bson::Document;
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct State {
    docs: Vec<Document>,
    // A collection exists once something has been written to it.
    exists: bool,
}

/// In-process `DocumentStore` over a `Vec<Document>`, kept in insertion order.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: RwLock::new(State::default()) }
    }

    /// A store pre-populated with `docs`, stored as given.
    #[must_use]
    pub fn with_documents(name: impl Into<String>, docs: Vec<Document>) -> Self {
        let exists = !docs.is_empty();
        Self { name: name.into(), state: RwLock::new(State { docs, exists }) }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored document.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        self.state.read().docs.clone()
    }

    fn matching_indices(docs: &[Document], filter: &Document, first_only: bool) -> Result<Vec<usize>, ControllerError> {
        let mut out = Vec::new();
        for (i, d) in docs.iter().enumerate() {
            if matches_filter(d, filter)? {
                out.push(i);
                if first_only {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Applies `update` to every selected document; nothing is written when any application fails.
    fn update_where(&self, filter: &Document, update: &Document, first_only: bool) -> Result<(UpdateReport, Option<Document>), ControllerError> {
        let mut state = self.state.write();
        let hits = Self::matching_indices(&state.docs, filter, first_only)?;
        let mut staged = Vec::with_capacity(hits.len());
        let mut modified = 0u64;
        for &i in &hits {
            let mut doc = state.docs[i].clone();
            if apply_update(&mut doc, update)? {
                modified += 1;
            }
            staged.push((i, doc));
        }
        let first = staged.first().map(|(_, d)| d.clone());
        for (i, doc) in staged {
            state.docs[i] = doc;
        }
        let matched = u64::try_from(hits.len()).unwrap_or(u64::MAX);
        log::debug!("{}: update matched={matched} modified={modified}", self.name);
        Ok((UpdateReport { matched, modified }, first))
    }

    fn delete_where(&self, filter: &Document, first_only: bool) -> Result<Vec<Document>, ControllerError> {
        let mut state = self.state.write();
        let hits = Self::matching_indices(&state.docs, filter, first_only)?;
        let mut removed = Vec::with_capacity(hits.len());
        // Highest index first so earlier indices stay valid.
        for &i in hits.iter().rev() {
            removed.push(state.docs.remove(i));
        }
        removed.reverse();
        log::debug!("{}: deleted {}", self.name, removed.len());
        Ok(removed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, ControllerError> {
        let state = self.state.read();
        let mut out = Vec::new();
        for d in &state.docs {
            if matches_filter(d, filter)? {
                out.push(d.clone());
            }
        }
        drop(state);
        if let Some(sort) = &options.sort {
            out.sort_by(|a, b| compare_docs(a, b, sort));
        }
        let skip = options.skip.and_then(|n| usize::try_from(n).ok()).unwrap_or(0);
        let limit = options.limit.and_then(|n| usize::try_from(n).ok()).unwrap_or(usize::MAX);
        Ok(out.into_iter().skip(skip).take(limit).collect())
    }

    async fn find_one(&self, filter: &Document) -> Result<Option<Document>, ControllerError> {
        let state = self.state.read();
        for d in &state.docs {
            if matches_filter(d, filter)? {
                return Ok(Some(d.clone()));
            }
        }
        Ok(None)
    }

    async fn insert_one(&self, doc: Document) -> Result<(), ControllerError> {
        let mut state = self.state.write();
        state.docs.push(doc);
        state.exists = true;
        Ok(())
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<(), ControllerError> {
        let mut state = self.state.write();
        state.docs.extend(docs);
        state.exists = true;
        Ok(())
    }

    async fn update_one(&self, filter: &Document, update: &Document) -> Result<UpdateReport, ControllerError> {
        Ok(self.update_where(filter, update, true)?.0)
    }

    async fn update_many(&self, filter: &Document, update: &Document) -> Result<UpdateReport, ControllerError> {
        Ok(self.update_where(filter, update, false)?.0)
    }

    async fn find_one_and_update(
        &self,
        filter: &Document,
        update: &Document,
    ) -> Result<Option<Document>, ControllerError> {
        Ok(self.update_where(filter, update, true)?.1)
    }

    async fn find_one_and_delete(&self, filter: &Document) -> Result<Option<Document>, ControllerError> {
        Ok(self.delete_where(filter, true)?.into_iter().next())
    }

    async fn delete_one(&self, filter: &Document) -> Result<DeleteReport, ControllerError> {
        let deleted = self.delete_where(filter, true)?.len();
        Ok(DeleteReport { deleted: u64::try_from(deleted).unwrap_or(u64::MAX) })
    }

    async fn delete_many(&self, filter: &Document) -> Result<DeleteReport, ControllerError> {
        let deleted = self.delete_where(filter, false)?.len();
        Ok(DeleteReport { deleted: u64::try_from(deleted).unwrap_or(u64::MAX) })
    }

    async fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, ControllerError> {
        let snapshot = self.documents();
        run_pipeline(&self.name, &snapshot, pipeline)
    }

    async fn drop_collection(&self) -> Result<(), ControllerError> {
        let mut state = self.state.write();
        if !state.exists {
            return Err(ControllerError::NamespaceNotFound(self.name.clone()));
        }
        state.docs.clear();
        state.exists = false;
        Ok(())
    }
}
