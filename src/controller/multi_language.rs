//! Collections holding one document per (slug, language) pair.

use super::core::{Controller, ControllerOptions};
use crate::errors::ControllerError;
use crate::query::update::retrieve_update_query_data;
use crate::query::{AggregateBuilder, SearchOptions};
use crate::store::DocumentStore;
use bson::{Bson, Document, doc};
use std::ops::Deref;
use std::sync::Arc;

pub const LANGUAGE_FIELD: &str = "language";

#[derive(Debug, Clone, Default)]
pub struct MultiLanguageOptions {
    /// Field shared by every language variant of one item.
    pub slug_field: String,
    /// Fields kept identical across the variants of one item.
    pub common_fields: Vec<String>,
    pub controller: ControllerOptions,
}

/// Result of a language-aware lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageMatch {
    /// `true` when no variant in the requested language exists and another
    /// variant was returned instead.
    pub is_fallback: bool,
    pub item: Option<Document>,
}

/// Stages collapsing the variants of each slug into the one matching
/// `language`, or the first variant when there is none.
#[must_use]
pub fn language_stages(slug_field: &str, collection: &str, language: Option<&str>) -> AggregateBuilder {
    let language = language.map_or(Bson::Null, |l| Bson::String(l.to_string()));
    let mut builder = AggregateBuilder::new();
    builder
        .group(doc! { "_id": format!("${slug_field}") })
        .lookup(doc! {
            "from": collection,
            "localField": "_id",
            "foreignField": slug_field,
            "as": "items",
        })
        .add_fields(doc! { "index": { "$indexOfArray": [format!("$items.{LANGUAGE_FIELD}"), language] } })
        .replace_root(doc! {
            "newRoot": {
                "$cond": {
                    "if": { "$ne": ["$index", -1] },
                    "then": { "$arrayElemAt": ["$items", "$index"] },
                    "else": { "$first": "$items" },
                }
            }
        });
    builder
}

/// A [`Controller`] whose searches return one variant per slug.
///
/// Everything a plain controller offers is reachable through `Deref`.
#[derive(Debug)]
pub struct MultiLanguageController<S: DocumentStore + ?Sized> {
    inner: Controller<S>,
    slug_field: String,
    common_fields: Vec<String>,
}

impl<S: DocumentStore + ?Sized> Deref for MultiLanguageController<S> {
    type Target = Controller<S>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<S: DocumentStore + ?Sized> MultiLanguageController<S> {
    /// Any `build_aggregate` in `options.controller` is replaced by the language stages.
    ///
    /// # Errors
    /// `InvalidCollection` for an unnamed store, `Config` for an empty slug field.
    pub fn new(store: Arc<S>, options: MultiLanguageOptions) -> Result<Self, ControllerError> {
        if options.slug_field.is_empty() {
            return Err(ControllerError::Config("slug field cannot be empty".into()));
        }
        let slug_field = options.slug_field;
        let collection = store.name().to_string();
        let slug = slug_field.clone();
        let controller = options.controller.build_aggregate(move |opts: &SearchOptions| {
            language_stages(&slug, &collection, opts.language.as_deref())
        });
        Ok(Self { inner: Controller::new(store, controller)?, slug_field, common_fields: options.common_fields })
    }

    #[must_use]
    pub fn slug_field(&self) -> &str {
        &self.slug_field
    }

    #[must_use]
    pub fn common_fields(&self) -> &[String] {
        &self.common_fields
    }

    #[must_use]
    pub const fn controller(&self) -> &Controller<S> {
        &self.inner
    }

    /// The variant of the first match in `language`, else any variant of it.
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_one_by_language(&self, language: &str, filter: &Document) -> Result<LanguageMatch, ControllerError> {
        log::debug!("[{}] find one by language {language} for {filter}", self.inner.name());
        let mut localized = filter.clone();
        localized.insert(LANGUAGE_FIELD, language);
        if let Some(item) = self.inner.store().find_one(&localized).await? {
            return Ok(LanguageMatch { is_fallback: false, item: Some(item) });
        }
        let item = self.inner.store().find_one(filter).await?;
        Ok(LanguageMatch { is_fallback: item.is_some(), item })
    }

    /// Updates the `language` variant of the first match.
    ///
    /// Common fields present in `update` are written to every variant of the
    /// slug. When the variant does not exist yet it is inserted from the
    /// update data instead. Returns the fresh lookup for the slug.
    ///
    /// # Errors
    /// Listener and store failures.
    pub async fn update_one_by_language(
        &self,
        language: &str,
        filter: &Document,
        update: Document,
    ) -> Result<LanguageMatch, ControllerError> {
        let found = self.find_one_by_language(language, filter).await?;
        let Some(item) = found.item else {
            return Ok(LanguageMatch { is_fallback: found.is_fallback, item: None });
        };
        let slug = item.get(&self.slug_field).cloned().unwrap_or(Bson::Null);
        let data = retrieve_update_query_data(&update);

        let mut common = Document::new();
        for field in &self.common_fields {
            match data.get(field) {
                None | Some(Bson::Null) => {}
                Some(v) => {
                    common.insert(field.clone(), v.clone());
                }
            }
        }
        let mut by_slug = Document::new();
        by_slug.insert(self.slug_field.clone(), slug.clone());
        self.inner.update_many(&by_slug, doc! { "$set": common }).await?;

        if found.is_fallback {
            let mut created = data;
            created.insert(self.slug_field.clone(), slug);
            if !created.contains_key(LANGUAGE_FIELD) {
                created.insert(LANGUAGE_FIELD, language);
            }
            self.inner.insert_one(&created).await?;
        } else {
            let mut localized = filter.clone();
            localized.insert(LANGUAGE_FIELD, language);
            self.inner.update_one(&localized, update).await?;
        }
        self.find_one_by_language(language, &by_slug).await
    }
}
