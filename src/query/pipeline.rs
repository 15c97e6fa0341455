use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    const fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// One aggregation stage descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Document),
    Sort(Document),
    Skip(u64),
    Limit(u64),
    Group(Document),
    Lookup(Document),
    AddFields(Document),
    ReplaceRoot(Document),
    Count(String),
}

impl Stage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Group(_) => "$group",
            Self::Lookup(_) => "$lookup",
            Self::AddFields(_) => "$addFields",
            Self::ReplaceRoot(_) => "$replaceRoot",
            Self::Count(_) => "$count",
        }
    }

    /// Renders the stage the way an aggregation executor expects it.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let body = match self {
            Self::Match(d)
            | Self::Sort(d)
            | Self::Group(d)
            | Self::Lookup(d)
            | Self::AddFields(d)
            | Self::ReplaceRoot(d) => Bson::Document(d.clone()),
            Self::Skip(n) | Self::Limit(n) => Bson::Int64(i64::try_from(*n).unwrap_or(i64::MAX)),
            Self::Count(field) => Bson::String(field.clone()),
        };
        let mut out = Document::new();
        out.insert(self.name(), body);
        out
    }
}

/// Ordered list of stages, built fluently and concatenated in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateBuilder {
    stages: Vec<Stage>,
}

impl AggregateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Stage) -> &mut Self {
        self.stages.push(stage);
        self
    }

    pub fn match_stage(&mut self, filter: Document) -> &mut Self {
        self.push(Stage::Match(filter))
    }

    pub fn sort(&mut self, spec: Document) -> &mut Self {
        self.push(Stage::Sort(spec))
    }

    pub fn skip(&mut self, n: u64) -> &mut Self {
        self.push(Stage::Skip(n))
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.push(Stage::Limit(n))
    }

    pub fn group(&mut self, spec: Document) -> &mut Self {
        self.push(Stage::Group(spec))
    }

    pub fn lookup(&mut self, spec: Document) -> &mut Self {
        self.push(Stage::Lookup(spec))
    }

    pub fn add_fields(&mut self, spec: Document) -> &mut Self {
        self.push(Stage::AddFields(spec))
    }

    pub fn replace_root(&mut self, spec: Document) -> &mut Self {
        self.push(Stage::ReplaceRoot(spec))
    }

    pub fn count(&mut self, field: &str) -> &mut Self {
        self.push(Stage::Count(field.to_string()))
    }

    /// Appends every stage of `other` after the current ones.
    pub fn concat(&mut self, other: Self) -> &mut Self {
        self.stages.extend(other.stages);
        self
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}

impl From<Stage> for AggregateBuilder {
    fn from(stage: Stage) -> Self {
        Self { stages: vec![stage] }
    }
}

/// Parses `+foo,-bar, baz` into sort keys; tokens with an empty field are dropped.
#[must_use]
pub fn parse_sort(spec: &str) -> Vec<SortSpec> {
    spec.split(',')
        .filter_map(|token| {
            let token = token.trim();
            let (order, field) = match token.strip_prefix('-') {
                Some(rest) => (Order::Desc, rest),
                None => (Order::Asc, token.strip_prefix('+').unwrap_or(token)),
            };
            let field = field.trim();
            (!field.is_empty()).then(|| SortSpec { field: field.to_string(), order })
        })
        .collect()
}

/// Sort stage for a sort spec, or `None` when no spec (or no usable key) is given.
#[must_use]
pub fn compute_sort(spec: Option<&str>) -> Option<AggregateBuilder> {
    log::trace!("compute sort {spec:?}");
    let keys = parse_sort(spec?);
    if keys.is_empty() {
        return None;
    }
    let mut sort = Document::new();
    for key in keys {
        sort.insert(key.field, key.order.direction());
    }
    Some(Stage::Sort(sort).into())
}

/// Pagination stages: `$limit` of `page_size + skip` followed by `$skip`.
///
/// Both `page` (1-based) and `page_size` must be given; page `0` is read as
/// the first page.
#[must_use]
pub fn compute_option(page: Option<u64>, page_size: Option<u64>) -> Option<AggregateBuilder> {
    log::trace!("compute option page={page:?} page_size={page_size:?}");
    let (page, page_size) = (page?, page_size?);
    let skip = if page > 0 { (page - 1).saturating_mul(page_size) } else { 0 };
    let mut builder = AggregateBuilder::new();
    builder.limit(page_size.saturating_add(skip)).skip(skip);
    Some(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sort_variants() {
        let cases = [
            ("+foo,", doc! {"foo": 1}),
            ("foo,", doc! {"foo": 1}),
            ("-foo,bar", doc! {"foo": -1, "bar": 1}),
            ("+foo,-bar", doc! {"foo": 1, "bar": -1}),
            (" foo,-bar", doc! {"foo": 1, "bar": -1}),
        ];
        for (spec, expected) in cases {
            let built = compute_sort(Some(spec)).unwrap();
            assert_eq!(built.to_documents(), vec![doc! {"$sort": expected}], "spec {spec:?}");
        }
    }

    #[test]
    fn sort_absent_or_empty() {
        assert!(compute_sort(None).is_none());
        assert!(compute_sort(Some(" , ,")).is_none());
    }

    #[test]
    fn option_limit_before_skip() {
        assert!(compute_option(None, Some(10)).is_none());
        assert!(compute_option(Some(1), None).is_none());
        let p = compute_option(Some(10), Some(10)).unwrap();
        assert_eq!(p.to_documents(), vec![doc! {"$limit": 100_i64}, doc! {"$skip": 90_i64}]);
        let p = compute_option(Some(0), Some(10)).unwrap();
        assert_eq!(p.to_documents(), vec![doc! {"$limit": 10_i64}, doc! {"$skip": 0_i64}]);
    }

    #[test]
    fn concat_keeps_order() {
        let mut a = AggregateBuilder::new();
        a.match_stage(doc! {});
        let mut b = AggregateBuilder::new();
        b.count("total");
        a.concat(b);
        assert_eq!(a.to_documents(), vec![doc! {"$match": {}}, doc! {"$count": "total"}]);
    }
}
