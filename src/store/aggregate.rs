use super::apply::set_path;
use super::eval::{compare_docs, equals_or_contains, get_path, matches_filter};
use super::expr::eval_expr;
use crate::errors::ControllerError;
use bson::{Bson, Document};

/// Runs `pipeline` over `collection`.
///
/// `$lookup` may only join the collection itself (`from == name`).
pub fn run_pipeline(
    name: &str,
    collection: &[Document],
    pipeline: &[Document],
) -> Result<Vec<Document>, ControllerError> {
    let mut docs = collection.to_vec();
    for stage in pipeline {
        let (op, spec) = match stage.iter().next() {
            Some(entry) if stage.len() == 1 => entry,
            _ => return Err(ControllerError::Store(format!("malformed stage {stage}"))),
        };
        log::trace!("stage {op} over {} documents", docs.len());
        docs = match op.as_str() {
            "$match" => {
                let filter = as_doc(op, spec)?;
                let mut kept = Vec::with_capacity(docs.len());
                for d in docs {
                    if matches_filter(&d, filter)? {
                        kept.push(d);
                    }
                }
                kept
            }
            "$sort" => {
                let sort = as_doc(op, spec)?;
                docs.sort_by(|a, b| compare_docs(a, b, sort));
                docs
            }
            "$skip" => docs.into_iter().skip(as_count(op, spec)?).collect(),
            "$limit" => docs.into_iter().take(as_count(op, spec)?).collect(),
            "$count" => {
                let Bson::String(field) = spec else {
                    return Err(ControllerError::Store("$count expects a field name".into()));
                };
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(field.clone(), i64::try_from(docs.len()).unwrap_or(i64::MAX));
                    vec![out]
                }
            }
            "$group" => group(&docs, as_doc(op, spec)?)?,
            "$lookup" => lookup(name, collection, docs, as_doc(op, spec)?)?,
            "$addFields" => {
                let fields = as_doc(op, spec)?;
                let mut out = Vec::with_capacity(docs.len());
                for mut d in docs {
                    for (path, expr) in fields {
                        let value = eval_expr(&d, expr)?;
                        set_path(&mut d, path, value);
                    }
                    out.push(d);
                }
                out
            }
            "$replaceRoot" => {
                let new_root = as_doc(op, spec)?
                    .get("newRoot")
                    .ok_or_else(|| ControllerError::Store("$replaceRoot needs newRoot".into()))?;
                let mut out = Vec::with_capacity(docs.len());
                for d in &docs {
                    match eval_expr(d, new_root)? {
                        Bson::Document(root) => out.push(root),
                        other => {
                            return Err(ControllerError::Store(format!(
                                "newRoot must evaluate to a document, got {other}"
                            )));
                        }
                    }
                }
                out
            }
            other => return Err(ControllerError::Unsupported(format!("pipeline stage {other}"))),
        };
    }
    Ok(docs)
}

fn as_doc<'a>(op: &str, spec: &'a Bson) -> Result<&'a Document, ControllerError> {
    match spec {
        Bson::Document(d) => Ok(d),
        _ => Err(ControllerError::Store(format!("{op} expects a document"))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_count(op: &str, spec: &Bson) -> Result<usize, ControllerError> {
    let n = match spec {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(f) if f.fract() == 0.0 => *f as i64,
        _ => return Err(ControllerError::Store(format!("{op} expects an integer"))),
    };
    usize::try_from(n).map_err(|_| ControllerError::Store(format!("{op} must not be negative")))
}

/// `{_id: <expr>}`; accumulators are not evaluated. Groups keep first-seen order.
fn group(docs: &[Document], spec: &Document) -> Result<Vec<Document>, ControllerError> {
    if let Some(acc) = spec.keys().find(|k| k.as_str() != "_id") {
        return Err(ControllerError::Unsupported(format!("$group accumulator {acc}")));
    }
    let key_expr = spec.get("_id").cloned().unwrap_or(Bson::Null);
    let mut keys: Vec<Bson> = Vec::new();
    for d in docs {
        let key = eval_expr(d, &key_expr)?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys
        .into_iter()
        .map(|k| {
            let mut out = Document::new();
            out.insert("_id", k);
            out
        })
        .collect())
}

fn lookup(
    name: &str,
    collection: &[Document],
    docs: Vec<Document>,
    spec: &Document,
) -> Result<Vec<Document>, ControllerError> {
    let field = |key: &str| {
        spec.get_str(key)
            .map_err(|_| ControllerError::Store(format!("$lookup needs a string '{key}'")))
    };
    let (from, local, foreign, alias) = (field("from")?, field("localField")?, field("foreignField")?, field("as")?);
    if from != name {
        return Err(ControllerError::Unsupported(format!("$lookup from collection {from}")));
    }
    Ok(docs
        .into_iter()
        .map(|mut d| {
            let key = get_path(&d, local).cloned().unwrap_or(Bson::Null);
            let joined: Vec<Bson> = collection
                .iter()
                .filter(|other| match get_path(other, foreign) {
                    Some(v) => equals_or_contains(v, &key),
                    None => key == Bson::Null,
                })
                .cloned()
                .map(Bson::Document)
                .collect();
            d.insert(alias, joined);
            d
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn sample() -> Vec<Document> {
        vec![
            doc! {"slug": "a", "language": "en", "n": 1},
            doc! {"slug": "a", "language": "zh", "n": 2},
            doc! {"slug": "b", "language": "en", "n": 3},
        ]
    }

    #[test]
    fn match_sort_page_count() {
        let out = run_pipeline(
            "c",
            &sample(),
            &[doc! {"$match": {}}, doc! {"$sort": {"n": -1}}, doc! {"$limit": 2_i64}, doc! {"$skip": 1_i64}],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get_i32("n").unwrap(), 2);
        let count = run_pipeline("c", &sample(), &[doc! {"$count": "total"}]).unwrap();
        assert_eq!(count, vec![doc! {"total": 3_i64}]);
        assert!(run_pipeline("c", &[], &[doc! {"$count": "total"}]).unwrap().is_empty());
    }

    #[test]
    fn group_lookup_pick_language() {
        let pipeline = [
            doc! {"$group": {"_id": "$slug"}},
            doc! {"$lookup": {"from": "c", "localField": "_id", "foreignField": "slug", "as": "items"}},
            doc! {"$addFields": {"index": {"$indexOfArray": ["$items.language", "zh"]}}},
            doc! {"$replaceRoot": {"newRoot": {"$cond": {
                "if": {"$ne": ["$index", -1]},
                "then": {"$arrayElemAt": ["$items", "$index"]},
                "else": {"$first": "$items"},
            }}}},
        ];
        let out = run_pipeline("c", &sample(), &pipeline).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get_str("language").unwrap(), "zh");
        assert_eq!(out[1].get_str("language").unwrap(), "en");
    }

    #[test]
    fn unsupported_stage() {
        assert!(matches!(
            run_pipeline("c", &sample(), &[doc! {"$facet": {}}]),
            Err(ControllerError::Unsupported(_))
        ));
    }
}
