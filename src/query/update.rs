use bson::{Bson, Document};

/// Top-level keys that mark a document as an update query rather than a
/// plain partial document.
pub const UPDATE_OPERATORS: [&str; 15] = [
    "$currentDate",
    "$inc",
    "$min",
    "$max",
    "$mul",
    "$rename",
    "$set",
    "$setOnInsert",
    "$unset",
    "$addToSet",
    "$pop",
    "$pull",
    "$push",
    "$pushAll",
    "$bit",
];

#[must_use]
pub fn is_update_query(doc: &Document) -> bool {
    doc.keys().any(|k| UPDATE_OPERATORS.contains(&k.as_str()))
}

/// The data an update writes: a copy of `$set` for update queries, the
/// document itself otherwise.
#[must_use]
pub fn retrieve_update_query_data(doc: &Document) -> Document {
    if is_update_query(doc) {
        match doc.get("$set") {
            Some(Bson::Document(set)) => set.clone(),
            _ => Document::new(),
        }
    } else {
        doc.clone()
    }
}

/// Wraps a plain partial document into `$set`; update queries pass through.
#[must_use]
pub fn to_update_query(doc: Document) -> Document {
    if is_update_query(&doc) {
        doc
    } else {
        let mut out = Document::new();
        out.insert("$set", doc);
        out
    }
}

/// Merges two updates; operators of `to` win, `$set` contents are unioned
/// with `to` taking precedence.
#[must_use]
pub fn merge_update_query_data(from: Document, to: Document) -> Document {
    let from = to_update_query(from);
    let to = to_update_query(to);
    let mut data = retrieve_update_query_data(&from);
    data.extend(retrieve_update_query_data(&to));
    let mut out = from;
    out.extend(to);
    out.insert("$set", data);
    out
}
