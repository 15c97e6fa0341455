use super::core::Controller;
use super::hooks::Event;
use crate::document::{CREATED_AT_FIELD, ID_FIELD, append_basic_schema, append_basic_schema_many, append_update_schema};
use crate::errors::ControllerError;
use crate::logger::log_audit;
use crate::query::SearchOptions;
use crate::store::{DocumentStore, FindOptions};
use bson::{Bson, Document, doc};

fn id_filter(id: &str) -> Document {
    doc! { ID_FIELD: id }
}

impl<S: DocumentStore + ?Sized> Controller<S> {
    /// Number of documents matched by `search`/`filter`.
    ///
    /// Runs [`Controller::search`] without sort and paging, so search
    /// listeners fire between `pre-count` and `post-count`.
    ///
    /// # Errors
    /// Normalizer, listener and store failures.
    pub async fn count(&self, options: &SearchOptions) -> Result<u64, ControllerError> {
        log::debug!("[{}] counting for {:?} with {:?}", self.name, options.search, options.filter);
        self.hooks.emit(&Event::PreCount { options })?;
        let unpaged = SearchOptions { sort: None, page: None, page_size: None, ..options.clone() };
        let found = self.search(&unpaged).await?;
        let total = u64::try_from(found.len()).unwrap_or(u64::MAX);
        log::debug!("[{}] counted {total}", self.name);
        self.hooks.emit(&Event::PostCount { total, options })?;
        Ok(total)
    }

    /// Runs the computed pipeline.
    ///
    /// # Errors
    /// Normalizer, listener and store failures.
    pub async fn search(&self, options: &SearchOptions) -> Result<Vec<Document>, ControllerError> {
        log::debug!(
            "[{}] search for {:?} with {:?} sorted by {:?} at page {:?} with size {:?}",
            self.name,
            options.search,
            options.filter,
            options.sort,
            options.page,
            options.page_size
        );
        self.hooks.emit(&Event::PreSearch { options })?;
        let pipeline = self.compute_pipeline(options)?.to_documents();
        let result = self.store.aggregate(&pipeline).await?;
        self.hooks.emit(&Event::PostSearch { result: &result, options })?;
        Ok(result)
    }

    /// Stamps and stores `doc`, returning it as stored.
    ///
    /// # Errors
    /// Listener and store failures.
    pub async fn insert_one(&self, doc: &Document) -> Result<Option<Document>, ControllerError> {
        let doc = append_basic_schema(doc);
        self.hooks.emit(&Event::PreInsertOne { doc: &doc })?;
        self.store.insert_one(doc.clone()).await?;
        let id = doc.get_str(ID_FIELD).unwrap_or_default();
        let result = self.store.find_one(&id_filter(id)).await?;
        self.hooks.emit(&Event::PostInsertOne { result: result.as_ref(), doc: &doc })?;
        log::debug!("[{}] inserted document {id}", self.name);
        log_audit("insert_one", &self.name, 1);
        Ok(result)
    }

    /// Stamps and stores `docs` with one shared timestamp, returning them
    /// sorted by `createdAt`.
    ///
    /// # Errors
    /// Listener and store failures.
    pub async fn insert_many(&self, docs: &[Document]) -> Result<Vec<Document>, ControllerError> {
        let docs = append_basic_schema_many(docs);
        self.hooks.emit(&Event::PreInsertMany { docs: &docs })?;
        let ids: Vec<Bson> = docs.iter().filter_map(|d| d.get(ID_FIELD).cloned()).collect();
        self.store.insert_many(docs.clone()).await?;
        let filter = doc! { ID_FIELD: { "$in": ids } };
        let result = self.store.find(&filter, &FindOptions::sorted_by(doc! { CREATED_AT_FIELD: 1 })).await?;
        self.hooks.emit(&Event::PostInsertMany { result: &result, docs: &docs })?;
        log::debug!("[{}] inserted {} document(s)", self.name, result.len());
        log_audit("insert_many", &self.name, result.len());
        Ok(result)
    }

    /// # Errors
    /// Listener and store failures.
    pub async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, ControllerError> {
        log::debug!("[{}] find documents for {filter} with {options:?}", self.name);
        self.hooks.emit(&Event::PreFind { filter, options })?;
        let result = self.store.find(filter, options).await?;
        self.hooks.emit(&Event::PostFind { result: &result, filter, options })?;
        Ok(result)
    }

    /// # Errors
    /// Listener and store failures.
    pub async fn find_one(&self, filter: &Document) -> Result<Option<Document>, ControllerError> {
        log::debug!("[{}] find document for {filter}", self.name);
        self.hooks.emit(&Event::PreFindOne { filter })?;
        let result = self.store.find_one(filter).await?;
        self.hooks.emit(&Event::PostFindOne { result: result.as_ref(), filter })?;
        Ok(result)
    }

    /// # Errors
    /// Listener and store failures.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Document>, ControllerError> {
        log::debug!("[{}] find document by id {id}", self.name);
        self.hooks.emit(&Event::PreFindById { id })?;
        let result = self.store.find_one(&id_filter(id)).await?;
        self.hooks.emit(&Event::PostFindById { result: result.as_ref(), id })?;
        Ok(result)
    }

    /// Updates the first match and returns it re-read with `filter`.
    ///
    /// `update` is an update query or a plain partial document; `id` and
    /// `createdAt` are never written and `updatedAt` is refreshed.
    ///
    /// # Errors
    /// Listener and store failures.
    pub async fn update_one(&self, filter: &Document, update: Document) -> Result<Option<Document>, ControllerError> {
        let update = append_update_schema(update);
        self.hooks.emit(&Event::PreUpdateOne { filter, update: &update })?;
        let report = self.store.update_one(filter, &update).await?;
        let result = self.store.find_one(filter).await?;
        self.hooks.emit(&Event::PostUpdateOne { result: result.as_ref(), filter, update: &update })?;
        log::debug!("[{}] updated document for {filter}: {report:?}", self.name);
        log_audit("update_one", &self.name, usize::try_from(report.modified).unwrap_or(usize::MAX));
        Ok(result)
    }

    /// # Errors
    /// Listener and store failures.
    pub async fn update_many(&self, filter: &Document, update: Document) -> Result<Vec<Document>, ControllerError> {
        let update = append_update_schema(update);
        self.hooks.emit(&Event::PreUpdateMany { filter, update: &update })?;
        let report = self.store.update_many(filter, &update).await?;
        let result = self.store.find(filter, &FindOptions::default()).await?;
        self.hooks.emit(&Event::PostUpdateMany { result: &result, filter, update: &update })?;
        log::debug!("[{}] updated documents for {filter}: {report:?}", self.name);
        log_audit("update_many", &self.name, usize::try_from(report.modified).unwrap_or(usize::MAX));
        Ok(result)
    }

    /// # Errors
    /// Listener and store failures.
    pub async fn update_by_id(&self, id: &str, update: Document) -> Result<Option<Document>, ControllerError> {
        let update = append_update_schema(update);
        let filter = id_filter(id);
        self.hooks.emit(&Event::PreUpdateById { id, update: &update })?;
        let report = self.store.update_one(&filter, &update).await?;
        let result = self.store.find_one(&filter).await?;
        self.hooks.emit(&Event::PostUpdateById { result: result.as_ref(), id, update: &update })?;
        log::debug!("[{}] updated document by id {id}: {report:?}", self.name);
        log_audit("update_by_id", &self.name, usize::try_from(report.modified).unwrap_or(usize::MAX));
        Ok(result)
    }

    /// Deletes the first match and returns it as it was.
    ///
    /// # Errors
    /// Listener and store failures.
    pub async fn delete_one(&self, filter: &Document) -> Result<Option<Document>, ControllerError> {
        let result = self.store.find_one(filter).await?;
        self.hooks.emit(&Event::PreDeleteOne { filter })?;
        let report = self.store.delete_one(filter).await?;
        self.hooks.emit(&Event::PostDeleteOne { result: result.as_ref(), filter })?;
        log::debug!("[{}] deleted document for {filter}", self.name);
        log_audit("delete_one", &self.name, usize::try_from(report.deleted).unwrap_or(usize::MAX));
        Ok(result)
    }

    /// # Errors
    /// Listener and store failures.
    pub async fn delete_many(&self, filter: &Document) -> Result<Vec<Document>, ControllerError> {
        let result = self.store.find(filter, &FindOptions::default()).await?;
        self.hooks.emit(&Event::PreDeleteMany { filter })?;
        let report = self.store.delete_many(filter).await?;
        self.hooks.emit(&Event::PostDeleteMany { result: &result, filter })?;
        log::debug!("[{}] deleted {} document(s) for {filter}", self.name, report.deleted);
        log_audit("delete_many", &self.name, usize::try_from(report.deleted).unwrap_or(usize::MAX));
        Ok(result)
    }

    /// # Errors
    /// Listener and store failures.
    pub async fn delete_by_id(&self, id: &str) -> Result<Option<Document>, ControllerError> {
        let filter = id_filter(id);
        let result = self.store.find_one(&filter).await?;
        self.hooks.emit(&Event::PreDeleteById { id })?;
        let report = self.store.delete_one(&filter).await?;
        self.hooks.emit(&Event::PostDeleteById { result: result.as_ref(), id })?;
        log::debug!("[{}] deleted document by id {id}", self.name);
        log_audit("delete_by_id", &self.name, usize::try_from(report.deleted).unwrap_or(usize::MAX));
        Ok(result)
    }

    /// Drops the collection. A collection that does not exist is not an error.
    ///
    /// # Errors
    /// Listener failures and store failures other than `NamespaceNotFound`.
    pub async fn reset_database(&self) -> Result<(), ControllerError> {
        self.hooks.emit(&Event::PreReset)?;
        match self.store.drop_collection().await {
            Ok(()) => {}
            Err(ControllerError::NamespaceNotFound(ns)) => {
                log::debug!("[{}] reset skipped, namespace {ns} not found", self.name);
            }
            Err(e) => return Err(e),
        }
        self.hooks.emit(&Event::PostReset)?;
        log_audit("reset", &self.name, 0);
        Ok(())
    }
}
