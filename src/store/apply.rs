use crate::errors::ControllerError;
use bson::{Bson, Document};

/// Applies an update query (`$set`, `$unset`, `$inc`) in place.
///
/// Returns whether the document changed.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, ControllerError> {
    let mut changed = false;
    for (op, arg) in update {
        let Bson::Document(fields) = arg else {
            return Err(ControllerError::Store(format!("{op} expects a document")));
        };
        for (path, value) in fields {
            changed |= match op.as_str() {
                "$set" => set_path(doc, path, value.clone()),
                "$unset" => unset_path(doc, path),
                "$inc" => inc_path(doc, path, value)?,
                other => {
                    return Err(ControllerError::Unsupported(format!("update operator {other}")));
                }
            };
        }
    }
    Ok(changed)
}

fn ensure_subdoc<'a>(root: &'a mut Document, key: &str) -> Option<&'a mut Document> {
    if !matches!(root.get(key), Some(Bson::Document(_))) {
        root.insert(key, Document::new());
    }
    match root.get_mut(key) {
        Some(Bson::Document(d)) => Some(d),
        _ => None,
    }
}

fn traverse_to_parent<'a, 'p>(root: &'a mut Document, path: &'p str) -> Option<(&'a mut Document, &'p str)> {
    let (parents, last) = match path.rsplit_once('.') {
        Some((parents, last)) => (Some(parents), last),
        None => (None, path),
    };
    let mut cur = root;
    if let Some(parents) = parents {
        for seg in parents.split('.') {
            cur = ensure_subdoc(cur, seg)?;
        }
    }
    Some((cur, last))
}

pub(super) fn set_path(root: &mut Document, path: &str, value: Bson) -> bool {
    let Some((parent, last)) = traverse_to_parent(root, path) else {
        return false;
    };
    let old = parent.insert(last, value.clone());
    old.as_ref() != Some(&value)
}

fn unset_path(root: &mut Document, path: &str) -> bool {
    let mut cur = root;
    let mut segs = path.split('.').peekable();
    while let Some(seg) = segs.next() {
        if segs.peek().is_none() {
            return cur.remove(seg).is_some();
        }
        match cur.get_mut(seg) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    false
}

fn inc_path(root: &mut Document, path: &str, by: &Bson) -> Result<bool, ControllerError> {
    let current = super::eval::get_path(root, path).cloned();
    let next = match current {
        None => by.clone(),
        Some(cur) => add(&cur, by).ok_or_else(|| {
            ControllerError::Store(format!("cannot $inc field '{path}' holding a non-numeric value"))
        })?,
    };
    if !matches!(next, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
        return Err(ControllerError::Store(format!("$inc on '{path}' expects a number")));
    }
    Ok(set_path(root, path, next))
}

#[allow(clippy::cast_precision_loss)]
fn add(a: &Bson, b: &Bson) -> Option<Bson> {
    Some(match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => match x.checked_add(*y) {
            Some(v) => Bson::Int32(v),
            None => Bson::Int64(i64::from(*x) + i64::from(*y)),
        },
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x).checked_add(*y)?),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x.checked_add(i64::from(*y))?),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x.checked_add(*y)?),
        (Bson::Double(x), Bson::Double(y)) => Bson::Double(x + y),
        (Bson::Double(x), Bson::Int32(y)) | (Bson::Int32(y), Bson::Double(x)) => Bson::Double(x + f64::from(*y)),
        (Bson::Double(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Double(x)) => Bson::Double(x + *y as f64),
        _ => return None,
    })
}
