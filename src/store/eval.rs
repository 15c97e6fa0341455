use crate::errors::ControllerError;
use bson::{Bson, Document};
use std::cmp::Ordering;

// Safety limit to prevent resource abuse
const MAX_PATH_DEPTH: usize = 32;

/// Evaluates a filter document against `doc`.
///
/// Supports field equality (including array membership), the comparison
/// operators `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex` and the
/// logical operators `$and $or $nor`.
///
/// # Errors
/// `Unsupported` for any other operator.
pub fn matches_filter(doc: &Document, filter: &Document) -> Result<bool, ControllerError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for f in sub_filters(key, cond)? {
                    if !matches_filter(doc, f)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => any_matches(doc, sub_filters(key, cond)?)?,
            "$nor" => !any_matches(doc, sub_filters(key, cond)?)?,
            op if op.starts_with('$') => {
                return Err(ControllerError::Unsupported(format!("query operator {op}")));
            }
            path => match_field(get_path(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_matches(doc: &Document, filters: Vec<&Document>) -> Result<bool, ControllerError> {
    for f in filters {
        if matches_filter(doc, f)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn sub_filters<'a>(op: &str, cond: &'a Bson) -> Result<Vec<&'a Document>, ControllerError> {
    let Bson::Array(items) = cond else {
        return Err(ControllerError::Unsupported(format!("{op} expects an array")));
    };
    items
        .iter()
        .map(|b| match b {
            Bson::Document(d) => Ok(d),
            _ => Err(ControllerError::Unsupported(format!("{op} expects documents"))),
        })
        .collect()
}

fn is_operator_document(cond: &Bson) -> Option<&Document> {
    match cond {
        Bson::Document(d) if !d.is_empty() && d.keys().all(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn match_field(value: Option<&Bson>, cond: &Bson) -> Result<bool, ControllerError> {
    let Some(ops) = is_operator_document(cond) else {
        return Ok(match value {
            None => matches!(cond, Bson::Null),
            Some(v) => equals_or_contains(v, cond),
        });
    };
    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => value.is_some_and(|v| equals_or_contains(v, arg)),
            "$ne" => !value.is_some_and(|v| equals_or_contains(v, arg)),
            "$gt" => value.is_some_and(|v| ordered(v, arg, |o| o == Ordering::Greater)),
            "$gte" => value.is_some_and(|v| ordered(v, arg, |o| o != Ordering::Less)),
            "$lt" => value.is_some_and(|v| ordered(v, arg, |o| o == Ordering::Less)),
            "$lte" => value.is_some_and(|v| ordered(v, arg, |o| o != Ordering::Greater)),
            "$in" => value.is_some_and(|v| in_set(v, arg)),
            "$nin" => !value.is_some_and(|v| in_set(v, arg)),
            "$exists" => value.is_some() == truthy(arg),
            "$regex" => regex_match(value, arg, ops.get("$options"))?,
            "$options" => true,
            other => {
                return Err(ControllerError::Unsupported(format!("query operator {other}")));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(super) fn equals(a: &Bson, b: &Bson) -> bool {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

pub(super) fn equals_or_contains(v: &Bson, target: &Bson) -> bool {
    equals(v, target) || matches!(v, Bson::Array(items) if items.iter().any(|i| equals(i, target)))
}

fn in_set(v: &Bson, set: &Bson) -> bool {
    match set {
        Bson::Array(items) => items.iter().any(|x| equals_or_contains(v, x)),
        _ => false,
    }
}

/// Range operators only compare values of the same kind (numbers compare across widths).
fn ordered(a: &Bson, b: &Bson, pred: impl Fn(Ordering) -> bool) -> bool {
    kind_rank(a) == kind_rank(b) && pred(compare_bson(a, b))
}

pub(super) fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

#[cfg(feature = "regex")]
fn regex_match(value: Option<&Bson>, pattern: &Bson, options: Option<&Bson>) -> Result<bool, ControllerError> {
    let Bson::String(pattern) = pattern else {
        return Err(ControllerError::Unsupported("$regex expects a string".into()));
    };
    let flags = options.and_then(Bson::as_str).unwrap_or("");
    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| ControllerError::Store(format!("invalid $regex: {e}")))?;
    Ok(match value {
        Some(Bson::String(s)) => re.is_match(s),
        Some(Bson::Array(items)) => items.iter().any(|i| matches!(i, Bson::String(s) if re.is_match(s))),
        _ => false,
    })
}

#[cfg(not(feature = "regex"))]
fn regex_match(_value: Option<&Bson>, _pattern: &Bson, _options: Option<&Bson>) -> Result<bool, ControllerError> {
    Err(ControllerError::Unsupported("$regex requires the `regex` feature".into()))
}

/// Orders documents by a `{field: 1 | -1}` sort specification.
///
/// A missing field sorts like `null`.
pub fn compare_docs(a: &Document, b: &Document, sort: &Document) -> Ordering {
    sort.iter().fold(Ordering::Equal, |acc, (field, dir)| {
        acc.then_with(|| {
            let x = get_path(a, field).unwrap_or(&Bson::Null);
            let y = get_path(b, field).unwrap_or(&Bson::Null);
            let ord = compare_bson(x, y);
            if numeric(dir).is_some_and(|d| d < 0.0) { ord.reverse() } else { ord }
        })
    })
}

pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut segs = 0usize;
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

#[allow(clippy::cast_precision_loss)]
fn numeric(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse().ok(),
        _ => None,
    }
}

/// Bucket of a value when kinds are mixed in one sort; all numbers share one.
const fn kind_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) | Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 12,
        Bson::MaxKey => 13,
    }
}

/// Total order over BSON values: kind bucket first, then value inside the bucket.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    kind_rank(a).cmp(&kind_rank(b)).then_with(|| match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => (x.time, x.increment).cmp(&(y.time, y.increment)),
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn equality_and_membership() {
        let d = doc! {"name": "alice", "tags": ["a", "b"], "age": 30};
        assert!(matches_filter(&d, &doc! {"name": "alice"}).unwrap());
        assert!(matches_filter(&d, &doc! {"tags": "b"}).unwrap());
        assert!(matches_filter(&d, &doc! {"age": 30.0}).unwrap());
        assert!(!matches_filter(&d, &doc! {"name": "bob"}).unwrap());
        assert!(matches_filter(&d, &doc! {"missing": null}).unwrap());
    }

    #[test]
    fn logical_and_comparison() {
        let d = doc! {"age": 30, "info": {"visits": 3}};
        let f = doc! {"$and": [{"age": {"$gt": 18, "$lte": 30}}, {"$or": [{"info.visits": {"$in": [1, 3]}}, {"x": 1}]}]};
        assert!(matches_filter(&d, &f).unwrap());
        assert!(!matches_filter(&d, &doc! {"age": {"$gt": "10"}}).unwrap());
        assert!(matches_filter(&d, &doc! {"$nor": [{"age": 1}]}).unwrap());
        assert!(matches_filter(&d, &doc! {"gone": {"$exists": false}}).unwrap());
    }

    #[cfg(feature = "regex")]
    #[test]
    fn regex_with_options() {
        let d = doc! {"foo": "BaZ"};
        assert!(matches_filter(&d, &doc! {"foo": {"$regex": "baz", "$options": "i"}}).unwrap());
        assert!(!matches_filter(&d, &doc! {"foo": {"$regex": "baz"}}).unwrap());
    }

    #[test]
    fn unknown_operator_is_unsupported() {
        let d = doc! {"a": 1};
        assert!(matches!(
            matches_filter(&d, &doc! {"$expr": {"$gt": ["$a", 0]}}),
            Err(ControllerError::Unsupported(_))
        ));
    }

    #[test]
    fn sort_direction() {
        let a = doc! {"n": 1};
        let b = doc! {"n": 2};
        assert_eq!(compare_docs(&a, &b, &doc! {"n": 1}), Ordering::Less);
        assert_eq!(compare_docs(&a, &b, &doc! {"n": -1}), Ordering::Greater);
        assert_eq!(compare_docs(&a, &b, &doc! {"n": -1.0}), Ordering::Greater);
    }

    #[test]
    fn later_keys_break_ties() {
        let a = doc! {"k": "x", "n": 5};
        let b = doc! {"k": "x", "n": 2};
        assert_eq!(compare_docs(&a, &b, &doc! {"k": 1, "n": 1}), Ordering::Greater);
        assert_eq!(compare_docs(&a, &b, &doc! {"k": 1, "n": -1}), Ordering::Less);
        assert_eq!(compare_docs(&a, &a, &doc! {"k": 1, "n": 1}), Ordering::Equal);
    }

    #[test]
    fn missing_field_sorts_with_null() {
        let present = doc! {"n": 0};
        let missing = doc! {};
        assert_eq!(compare_docs(&missing, &present, &doc! {"n": 1}), Ordering::Less);
        assert_eq!(compare_docs(&missing, &doc! {"n": null}, &doc! {"n": 1}), Ordering::Equal);
    }

    #[test]
    fn mixed_kinds_use_buckets() {
        let at = Bson::DateTime(bson::DateTime::from_millis(5));
        assert_eq!(compare_bson(&Bson::Int32(3), &Bson::Double(2.5)), Ordering::Greater);
        assert_eq!(compare_bson(&Bson::Int64(7), &Bson::Int32(7)), Ordering::Equal);
        assert_eq!(compare_bson(&Bson::Int64(1_000), &Bson::String("1".into())), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Boolean(false), &at), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Null, &Bson::Int32(i32::MIN)), Ordering::Less);
        assert_eq!(
            compare_bson(&at, &Bson::DateTime(bson::DateTime::from_millis(4))),
            Ordering::Greater
        );
    }

    #[test]
    fn range_operators_skip_other_kinds() {
        let d = doc! {"v": "10", "w": 3_i64};
        assert!(!matches_filter(&d, &doc! {"v": {"$gt": 1}}).unwrap());
        assert!(matches_filter(&d, &doc! {"w": {"$gte": 3.0, "$lt": 4}}).unwrap());
    }
}
