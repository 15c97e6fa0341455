//! The document-store collaborator a controller delegates to.

mod aggregate;
mod apply;
mod eval;
mod expr;
mod memory;

pub use aggregate::run_pipeline;
pub use eval::{compare_bson, compare_docs, matches_filter};
pub use expr::eval_expr;
pub use memory::MemoryStore;

use crate::errors::ControllerError;
use async_trait::async_trait;
use bson::Document;

/// Options for `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// `{field: 1 | -1, ...}`
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    #[must_use]
    pub fn sorted_by(sort: Document) -> Self {
        Self { sort: Some(sort), ..Self::default() }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}

/// A single collection of a document database.
///
/// Filters, update documents and pipeline stages use the database's own
/// operator syntax (`$and`, `$set`, `$match`, ...).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, ControllerError>;

    async fn find_one(&self, filter: &Document) -> Result<Option<Document>, ControllerError>;

    async fn insert_one(&self, doc: Document) -> Result<(), ControllerError>;

    async fn insert_many(&self, docs: Vec<Document>) -> Result<(), ControllerError>;

    async fn update_one(&self, filter: &Document, update: &Document) -> Result<UpdateReport, ControllerError>;

    async fn update_many(&self, filter: &Document, update: &Document) -> Result<UpdateReport, ControllerError>;

    /// Applies `update` to the first match and returns the updated document.
    async fn find_one_and_update(
        &self,
        filter: &Document,
        update: &Document,
    ) -> Result<Option<Document>, ControllerError>;

    /// Removes the first match and returns it.
    async fn find_one_and_delete(&self, filter: &Document) -> Result<Option<Document>, ControllerError>;

    async fn delete_one(&self, filter: &Document) -> Result<DeleteReport, ControllerError>;

    async fn delete_many(&self, filter: &Document) -> Result<DeleteReport, ControllerError>;

    async fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, ControllerError>;

    /// Drops the collection; `NamespaceNotFound` when it does not exist.
    async fn drop_collection(&self) -> Result<(), ControllerError>;
}
