use std::collections::BTreeMap;

use serde::Serialize;

/// One value in a query specification: `difficulty=easy` or `duration[gte]=5`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Scalar(String),
    Map(BTreeMap<String, String>),
}

impl QueryValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            QueryValue::Scalar(s) => Some(s),
            QueryValue::Map(_) => None,
        }
    }
}

/// Comparison applied by a single filter predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    /// Operator key the builder does not recognise, carried through verbatim
    Unrecognized(String),
}

impl FilterOp {
    /// Maps a query-string operator key onto a store comparison
    pub fn from_query_key(key: &str) -> Self {
        match key {
            "gte" => FilterOp::Gte,
            "gt" => FilterOp::Gt,
            "lte" => FilterOp::Lte,
            "lt" => FilterOp::Lt,
            other => FilterOp::Unrecognized(other.to_string()),
        }
    }

    pub fn to_sql(&self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => Some("="),
            FilterOp::Gt => Some(">"),
            FilterOp::Gte => Some(">="),
            FilterOp::Lt => Some("<"),
            FilterOp::Lte => Some("<="),
            FilterOp::In | FilterOp::Unrecognized(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), op: FilterOp::Eq, value: FilterValue::One(value.into()) }
    }

    pub fn one_of<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            op: FilterOp::In,
            value: FilterValue::Many(values.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    /// `-price` sorts descending, `price` ascending
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (field, direction) = match token.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Desc),
            None => (token.strip_prefix('+').unwrap_or(token), SortDirection::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self { field: field.to_string(), direction })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Projection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Whether `field` survives this projection; `id` always does
    pub fn includes(&self, field: &str) -> bool {
        if field == "id" {
            return true;
        }
        match self {
            Projection::All => true,
            Projection::Include(fields) => fields.iter().any(|f| f == field),
            Projection::Exclude(fields) => !fields.iter().any(|f| f == field),
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::All
    }
}

/// Store-agnostic description of a read: what to match, how to order,
/// which fields to return and which window of results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryOptions {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: i64,
    pub limit: Option<i64>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}
