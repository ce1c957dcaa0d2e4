use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::types::QueryValue;

/// Parsed URL query string. Bracketed keys become nested maps:
/// `duration[gte]=5&difficulty=easy` -> `{duration: {gte: "5"}, difficulty: "easy"}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    entries: BTreeMap<String, QueryValue>,
}

impl QuerySpec {
    pub fn parse(raw: &str) -> Self {
        let mut spec = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            spec.insert(&key, value.into_owned());
        }
        spec
    }

    /// Build a fixed specification, as if each pair came from the URL
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut spec = Self::default();
        for (key, value) in pairs {
            spec.insert(key, value.to_string());
        }
        spec
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(QueryValue::as_scalar)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: &str, value: String) {
        match split_bracketed(key) {
            Some((field, op)) => match self.entries.get_mut(field) {
                Some(QueryValue::Map(map)) => {
                    map.insert(op.to_string(), value);
                }
                _ => {
                    let mut map = BTreeMap::new();
                    map.insert(op.to_string(), value);
                    self.entries.insert(field.to_string(), QueryValue::Map(map));
                }
            },
            // Last occurrence wins for repeated scalar keys
            None => {
                self.entries.insert(key.to_string(), QueryValue::Scalar(value));
            }
        }
    }
}

/// `price[gte]` -> `("price", "gte")`
fn split_bracketed(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    if open == 0 || !key.ends_with(']') {
        return None;
    }
    Some((&key[..open], &key[open + 1..key.len() - 1]))
}

#[async_trait]
impl<S> FromRequestParts<S> for QuerySpec
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.uri.query().map(QuerySpec::parse).unwrap_or_default())
    }
}
