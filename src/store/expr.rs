//! The small aggregation-expression subset needed by `$group`, `$addFields`
//! and `$replaceRoot`.

use super::eval::{equals, truthy};
use crate::errors::ControllerError;
use bson::{Bson, Document};

/// Evaluates `expr` against `doc`.
///
/// Field paths (`"$a.b"`) traverse arrays, so `"$items.language"` yields the
/// `language` of every element of `items`. Supported operators:
/// `$indexOfArray $arrayElemAt $first $cond $eq $ne`.
pub fn eval_expr(doc: &Document, expr: &Bson) -> Result<Bson, ControllerError> {
    match expr {
        Bson::String(s) if s.starts_with('$') && !s.starts_with("$$") => {
            let parts: Vec<&str> = s[1..].split('.').collect();
            Ok(resolve(&Bson::Document(doc.clone()), &parts).unwrap_or(Bson::Null))
        }
        Bson::Document(d) => match d.iter().next() {
            Some((op, arg)) if d.len() == 1 && op.starts_with('$') => eval_operator(doc, op, arg),
            _ => {
                let mut out = Document::new();
                for (k, v) in d {
                    out.insert(k.clone(), eval_expr(doc, v)?);
                }
                Ok(Bson::Document(out))
            }
        },
        Bson::Array(items) => Ok(Bson::Array(
            items.iter().map(|i| eval_expr(doc, i)).collect::<Result<_, _>>()?,
        )),
        other => Ok(other.clone()),
    }
}

fn resolve(value: &Bson, parts: &[&str]) -> Option<Bson> {
    let Some((head, rest)) = parts.split_first() else {
        return Some(value.clone());
    };
    match value {
        Bson::Document(d) => resolve(d.get(*head)?, rest),
        Bson::Array(items) => Some(Bson::Array(items.iter().filter_map(|i| resolve(i, parts)).collect())),
        _ => None,
    }
}

fn args<'a>(op: &str, arg: &'a Bson, n: usize) -> Result<&'a [Bson], ControllerError> {
    match arg {
        Bson::Array(items) if items.len() == n => Ok(items),
        _ => Err(ControllerError::Store(format!("{op} expects {n} arguments"))),
    }
}

fn eval_operator(doc: &Document, op: &str, arg: &Bson) -> Result<Bson, ControllerError> {
    match op {
        "$indexOfArray" => {
            let a = args(op, arg, 2)?;
            let (haystack, needle) = (eval_expr(doc, &a[0])?, eval_expr(doc, &a[1])?);
            match haystack {
                Bson::Array(items) => {
                    let idx = items.iter().position(|i| equals(i, &needle));
                    Ok(Bson::Int32(idx.and_then(|i| i32::try_from(i).ok()).unwrap_or(-1)))
                }
                Bson::Null => Ok(Bson::Null),
                _ => Err(ControllerError::Store("$indexOfArray expects an array".into())),
            }
        }
        "$arrayElemAt" => {
            let a = args(op, arg, 2)?;
            let (array, index) = (eval_expr(doc, &a[0])?, eval_expr(doc, &a[1])?);
            let Bson::Array(items) = array else {
                return Ok(Bson::Null);
            };
            let index = match index {
                Bson::Int32(i) => i64::from(i),
                Bson::Int64(i) => i,
                _ => return Err(ControllerError::Store("$arrayElemAt expects an integer index".into())),
            };
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let at = if index < 0 { len + index } else { index };
            Ok(usize::try_from(at).ok().and_then(|i| items.get(i).cloned()).unwrap_or(Bson::Null))
        }
        "$first" => match eval_expr(doc, arg)? {
            Bson::Array(items) => Ok(items.first().cloned().unwrap_or(Bson::Null)),
            _ => Ok(Bson::Null),
        },
        "$cond" => {
            let (cond, then, otherwise) = match arg {
                Bson::Document(d) => match (d.get("if"), d.get("then"), d.get("else")) {
                    (Some(i), Some(t), Some(e)) => (i, t, e),
                    _ => return Err(ControllerError::Store("$cond needs if, then and else".into())),
                },
                _ => {
                    let a = args(op, arg, 3)?;
                    (&a[0], &a[1], &a[2])
                }
            };
            if truthy(&eval_expr(doc, cond)?) { eval_expr(doc, then) } else { eval_expr(doc, otherwise) }
        }
        "$eq" | "$ne" => {
            let a = args(op, arg, 2)?;
            let same = equals(&eval_expr(doc, &a[0])?, &eval_expr(doc, &a[1])?);
            Ok(Bson::Boolean(if op == "$eq" { same } else { !same }))
        }
        other => Err(ControllerError::Unsupported(format!("expression operator {other}"))),
    }
}
