//! Compiles `search` / `filter` inputs into match stages.
//!
//! Every clause is routed to exactly one of two phases. Fields whose name
//! contains one of the configured post-match keywords are evaluated after the
//! custom stages of the pipeline (where derived fields exist); all other
//! fields are evaluated in the first match stage.

use super::normalize::normalize;
use super::pair::Pairs;
use super::pipeline::{AggregateBuilder, Stage, compute_option, compute_sort};
use super::search::transform_regexp_search;
use crate::errors::ControllerError;
use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query settings a controller applies to every search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Fields a free-text search term is matched against.
    #[serde(default)]
    pub search_fields: Vec<String>,
    /// Wrap plain search terms into a case-insensitive `$regex`.
    #[serde(default)]
    pub auto_regexp_search: bool,
    /// Substrings that route a field to the post-match stage.
    #[serde(default)]
    pub post_match_keywords: Vec<String>,
}

impl SearchConfig {
    #[must_use]
    pub fn is_post_match(&self, field: &str) -> bool {
        self.post_match_keywords.iter().any(|k| field.contains(k.as_str()))
    }
}

/// The two shapes a filter arrives in.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterInput {
    /// `key:value,key:value`
    Text(String),
    /// Already split into keys; values are still raw.
    Structured(Map<String, Value>),
}

impl From<&str> for FilterInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FilterInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Map<String, Value>> for FilterInput {
    fn from(m: Map<String, Value>) -> Self {
        Self::Structured(m)
    }
}

/// Inputs of a search or count call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub search: Option<Value>,
    pub filter: Option<FilterInput>,
    /// `+foo,-bar`
    pub sort: Option<String>,
    /// 1-based.
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    /// Preferred language for language-aware controllers.
    pub language: Option<String>,
}

impl SearchOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<Value>) -> Self {
        self.search = Some(term.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<FilterInput>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }

    #[must_use]
    pub const fn page(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pre,
    Post,
}

impl Phase {
    fn accepts(self, config: &SearchConfig, field: &str) -> bool {
        config.is_post_match(field) == (self == Self::Post)
    }
}

fn is_searchable(term: &Value) -> bool {
    match term {
        Value::String(s) => !s.is_empty(),
        Value::Object(m) => !m.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn clause(field: &str, value: Bson) -> Bson {
    let mut d = Document::new();
    d.insert(field, value);
    Bson::Document(d)
}

fn collect_clauses(
    config: &SearchConfig,
    options: &SearchOptions,
    phase: Phase,
) -> Result<Vec<Bson>, ControllerError> {
    let mut clauses = Vec::new();

    let term = options.search.as_ref().filter(|t| is_searchable(t));
    if let Some(raw) = &options.search
        && (term.is_none() || config.search_fields.is_empty())
        && phase == Phase::Pre
    {
        log::debug!("search term {raw} ignored ({} search field(s))", config.search_fields.len());
    }
    if let Some(term) = term
        && !config.search_fields.is_empty()
    {
        let term = if config.auto_regexp_search {
            transform_regexp_search(term.clone())
        } else {
            term.clone()
        };
        let value = normalize(&term)?;
        let fan_out: Vec<Bson> = config
            .search_fields
            .iter()
            .filter(|f| phase.accepts(config, f))
            .map(|f| clause(f, value.clone()))
            .collect();
        if !fan_out.is_empty() {
            clauses.push(Bson::Document(doc! { "$or": fan_out }));
        }
    }

    match &options.filter {
        Some(FilterInput::Text(text)) => {
            for pair in Pairs::new(text) {
                if pair.key.is_empty() || pair.value.is_empty() {
                    log::debug!("malformed filter pair skipped: {pair:?}");
                    continue;
                }
                if phase.accepts(config, &pair.key) {
                    clauses.push(clause(&pair.key, normalize(&Value::String(pair.value))?));
                }
            }
        }
        Some(FilterInput::Structured(map)) => {
            for (key, raw) in map {
                if phase.accepts(config, key) {
                    clauses.push(clause(key, normalize(raw)?));
                }
            }
        }
        None => {}
    }
    Ok(clauses)
}

/// Match stage evaluated before any custom stage.
///
/// Always present; with no clause it matches everything (`{"$match": {}}`).
///
/// # Errors
/// Propagates normalizer failures such as `InvalidOperator`.
pub fn compute_pre_query(
    config: &SearchConfig,
    options: &SearchOptions,
) -> Result<AggregateBuilder, ControllerError> {
    log::trace!("compute pre query search={:?} filter={:?}", options.search, options.filter);
    let clauses = collect_clauses(config, options, Phase::Pre)?;
    let filter = if clauses.is_empty() { Document::new() } else { doc! { "$and": clauses } };
    Ok(Stage::Match(filter).into())
}

/// Match stage evaluated after the custom stages, or `None` when no clause
/// is routed there.
///
/// # Errors
/// Propagates normalizer failures such as `InvalidOperator`.
pub fn compute_post_query(
    config: &SearchConfig,
    options: &SearchOptions,
) -> Result<Option<AggregateBuilder>, ControllerError> {
    log::trace!("compute post query search={:?} filter={:?}", options.search, options.filter);
    let clauses = collect_clauses(config, options, Phase::Post)?;
    if clauses.is_empty() {
        return Ok(None);
    }
    Ok(Some(Stage::Match(doc! { "$and": clauses }).into()))
}

/// `[pre-match, custom..., post-match?, sort?, limit+skip?]`
///
/// # Errors
/// Propagates normalizer failures such as `InvalidOperator`.
pub fn compute_pipeline(
    config: &SearchConfig,
    options: &SearchOptions,
    custom: AggregateBuilder,
) -> Result<AggregateBuilder, ControllerError> {
    let mut builder = compute_pre_query(config, options)?;
    builder.concat(custom);
    if let Some(post) = compute_post_query(config, options)? {
        builder.concat(post);
    }
    if let Some(sort) = compute_sort(options.sort.as_deref()) {
        builder.concat(sort);
    }
    if let Some(page) = compute_option(options.page, options.page_size) {
        builder.concat(page);
    }
    log::debug!("computed pipeline with {} stage(s)", builder.len());
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(fields: &[&str], keywords: &[&str]) -> SearchConfig {
        SearchConfig {
            search_fields: fields.iter().map(ToString::to_string).collect(),
            auto_regexp_search: false,
            post_match_keywords: keywords.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn empty_inputs_match_all() {
        let pre = compute_pre_query(&SearchConfig::default(), &SearchOptions::new()).unwrap();
        assert_eq!(pre.to_documents(), vec![doc! {"$match": {}}]);
        assert!(compute_post_query(&SearchConfig::default(), &SearchOptions::new()).unwrap().is_none());
    }

    #[test]
    fn search_without_fields_is_ignored() {
        let opts = SearchOptions::new().search("baz").filter("foo:baz,bar:baz");
        let pre = compute_pre_query(&config(&[], &[]), &opts).unwrap();
        assert_eq!(pre.to_documents(), vec![doc! {"$match": {"$and": [{"foo": "baz"}, {"bar": "baz"}]}}]);
    }

    #[test]
    fn search_fields_split_by_phase() {
        let cfg = config(&["name", "scoreLabel"], &["score"]);
        let opts = SearchOptions::new().search("x");
        let pre = compute_pre_query(&cfg, &opts).unwrap();
        assert_eq!(pre.to_documents(), vec![doc! {"$match": {"$and": [{"$or": [{"name": "x"}]}]}}]);
        let post = compute_post_query(&cfg, &opts).unwrap().unwrap();
        assert_eq!(post.to_documents(), vec![doc! {"$match": {"$and": [{"$or": [{"scoreLabel": "x"}]}]}}]);
    }

    #[test]
    fn no_eligible_search_field_emits_no_or() {
        let cfg = config(&["score"], &["score"]);
        let pre = compute_pre_query(&cfg, &SearchOptions::new().search("x")).unwrap();
        assert_eq!(pre.to_documents(), vec![doc! {"$match": {}}]);
    }

    #[test]
    fn structured_filter_routes_like_text() {
        let mut map = Map::new();
        map.insert("score".into(), json!("1"));
        map.insert("name".into(), json!("a"));
        let cfg = config(&[], &["score"]);
        let opts = SearchOptions::new().filter(map);
        let pre = compute_pre_query(&cfg, &opts).unwrap();
        assert_eq!(pre.to_documents(), vec![doc! {"$match": {"$and": [{"name": "a"}]}}]);
        let post = compute_post_query(&cfg, &opts).unwrap().unwrap();
        assert_eq!(post.to_documents(), vec![doc! {"$match": {"$and": [{"score": 1}]}}]);
    }

    #[test]
    fn array_search_terms_fan_out() {
        let cfg = config(&["tags"], &[]);
        let pre = compute_pre_query(&cfg, &SearchOptions::new().search(json!(["x", "2"]))).unwrap();
        assert_eq!(pre.to_documents(), vec![doc! {"$match": {"$and": [{"$or": [{"tags": ["x", 2]}]}]}}]);
    }

    #[test]
    fn scalar_and_empty_search_terms_are_ignored() {
        let cfg = config(&["tags"], &[]);
        for term in [json!(5), json!(true), json!([]), json!({}), json!("")] {
            let pre = compute_pre_query(&cfg, &SearchOptions::new().search(term.clone())).unwrap();
            assert_eq!(pre.to_documents(), vec![doc! {"$match": {}}], "{term}");
        }
    }

    #[test]
    fn empty_values_are_skipped() {
        let opts = SearchOptions::new().filter("foo:,bar:1");
        let pre = compute_pre_query(&config(&[], &[]), &opts).unwrap();
        assert_eq!(pre.to_documents(), vec![doc! {"$match": {"$and": [{"bar": 1}]}}]);
    }

    #[test]
    fn forbidden_operator_in_filter_fails() {
        let opts = SearchOptions::new().filter("foo:{\"$function\":{\"body\":\"\"}}");
        let err = compute_pre_query(&config(&[], &[]), &opts).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidOperator(_)));
    }
}
