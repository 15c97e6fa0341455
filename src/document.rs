//! Bookkeeping fields stamped on every stored document.

use crate::query::update::to_update_query;
use bson::{Bson, Document};
use chrono::Utc;
use uuid::Uuid;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A fresh document identifier (UUID v4, hyphenated).
#[must_use]
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

fn now() -> bson::DateTime {
    bson::DateTime::from_millis(Utc::now().timestamp_millis())
}

fn stamp(doc: &Document, at: bson::DateTime) -> Document {
    let mut out = doc.clone();
    out.insert(ID_FIELD, new_document_id());
    out.insert(CREATED_AT_FIELD, at);
    out.insert(UPDATED_AT_FIELD, at);
    out
}

/// Adds `id`, `createdAt` and `updatedAt`, overriding any caller-supplied values.
#[must_use]
pub fn append_basic_schema(doc: &Document) -> Document {
    stamp(doc, now())
}

/// Same as [`append_basic_schema`] for a batch; every document shares one timestamp.
#[must_use]
pub fn append_basic_schema_many(docs: &[Document]) -> Vec<Document> {
    let at = now();
    docs.iter().map(|d| stamp(d, at)).collect()
}

/// Refreshes `updatedAt` and strips `id` / `createdAt` from the written data.
///
/// Update queries get the treatment inside `$set` (which is created when
/// missing); plain partial documents are wrapped into `$set`.
#[must_use]
pub fn append_update_schema(update: Document) -> Document {
    let at = now();
    let mut update = to_update_query(update);
    let mut set = match update.remove("$set") {
        Some(Bson::Document(set)) => set,
        _ => Document::new(),
    };
    set.remove(ID_FIELD);
    set.remove(CREATED_AT_FIELD);
    set.insert(UPDATED_AT_FIELD, at);
    update.insert("$set", set);
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn basic_schema_on_empty_document() {
        let d = append_basic_schema(&Document::new());
        assert!(d.contains_key(ID_FIELD));
        assert!(d.contains_key(CREATED_AT_FIELD));
        assert!(d.contains_key(UPDATED_AT_FIELD));
    }

    #[test]
    fn basic_schema_overrides_id() {
        let d = append_basic_schema(&doc! {"id": "mine", "foo": "bar"});
        assert_ne!(d.get_str(ID_FIELD).unwrap(), "mine");
        assert_eq!(d.get_str("foo").unwrap(), "bar");
    }

    #[test]
    fn batch_shares_timestamp_but_not_id() {
        let out = append_basic_schema_many(&[doc! {"foo": "bar"}, doc! {"foo": "baz"}]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get(CREATED_AT_FIELD), out[1].get(CREATED_AT_FIELD));
        assert_ne!(out[0].get_str(ID_FIELD).unwrap(), out[1].get_str(ID_FIELD).unwrap());
    }

    #[test]
    fn update_schema_plain_document() {
        let u = append_update_schema(doc! {"foo": "bar", "id": "xxx"});
        let set = u.get_document("$set").unwrap();
        assert_eq!(set.get_str("foo").unwrap(), "bar");
        assert!(!set.contains_key(ID_FIELD));
        assert!(!set.contains_key(CREATED_AT_FIELD));
        assert!(set.contains_key(UPDATED_AT_FIELD));
    }

    #[test]
    fn update_schema_update_query() {
        let u = append_update_schema(doc! {"$push": {"foo": "bar"}});
        assert_eq!(u.get_document("$push").unwrap(), &doc! {"foo": "bar"});
        let set = u.get_document("$set").unwrap();
        assert!(!set.contains_key(ID_FIELD));
        assert!(set.contains_key(UPDATED_AT_FIELD));
    }
}
