//! Translates a [`QuerySpec`] into [`QueryOptions`] in four stages:
//! filter, sort, field projection and pagination.
//!
//! Each stage consumes the builder and returns it, so callers chain them in
//! the order they want applied:
//!
//! ```ignore
//! let options = ApiFeatures::new(QueryOptions::new(), &spec)
//!     .filter()
//!     .sort()
//!     .limit_fields()?
//!     .paginate()?
//!     .into_options();
//! ```

use super::error::FilterError;
use super::query_spec::QuerySpec;
use super::types::{FilterOp, FilterValue, Predicate, Projection, QueryOptions, QueryValue, SortKey};

/// Keys that steer pagination, ordering and projection instead of filtering
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Newest documents first
pub const DEFAULT_SORT: &str = "-createdAt";

/// Internal bookkeeping field hidden unless explicitly requested
pub const VERSION_FIELD: &str = "version";

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;

pub struct ApiFeatures<'a> {
    spec: &'a QuerySpec,
    options: QueryOptions,
    default_limit: i64,
}

impl<'a> ApiFeatures<'a> {
    pub fn new(base: QueryOptions, spec: &'a QuerySpec) -> Self {
        Self { spec, options: base, default_limit: DEFAULT_LIMIT }
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Runs every stage in the canonical order
    pub fn build(base: QueryOptions, spec: &'a QuerySpec, default_limit: i64) -> Result<QueryOptions, FilterError> {
        Ok(Self::new(base, spec)
            .with_default_limit(default_limit)
            .filter()
            .sort()
            .limit_fields()?
            .paginate()?
            .into_options())
    }

    /// Every non-reserved key becomes a predicate. Operator maps such as
    /// `{gte: "5"}` become comparisons; scalars become equality.
    pub fn filter(mut self) -> Self {
        for (field, value) in self.spec.iter() {
            if RESERVED_KEYS.contains(&field.as_str()) {
                continue;
            }
            match value {
                QueryValue::Scalar(s) => {
                    self.options.predicates.push(Predicate::eq(field.clone(), s.clone()));
                }
                QueryValue::Map(ops) => {
                    for (key, operand) in ops {
                        self.options.predicates.push(Predicate {
                            field: field.clone(),
                            op: FilterOp::from_query_key(key),
                            value: FilterValue::One(operand.clone()),
                        });
                    }
                }
            }
        }
        self
    }

    pub fn sort(mut self) -> Self {
        match self.spec.scalar("sort") {
            Some(sort) => {
                self.options.sort = sort.split(',').filter_map(SortKey::parse).collect();
            }
            None if self.options.sort.is_empty() => {
                self.options.sort = SortKey::parse(DEFAULT_SORT).into_iter().collect();
            }
            None => {}
        }
        self
    }

    pub fn limit_fields(mut self) -> Result<Self, FilterError> {
        self.options.projection = match self.spec.scalar("fields") {
            Some(fields) => parse_projection(fields)?,
            None => Projection::Exclude(vec![VERSION_FIELD.to_string()]),
        };
        Ok(self)
    }

    pub fn paginate(mut self) -> Result<Self, FilterError> {
        let page = parse_positive(self.spec.scalar("page"), "page", DEFAULT_PAGE)?;
        let limit = parse_positive(self.spec.scalar("limit"), "limit", self.default_limit)?;
        self.options.skip = (page - 1).saturating_mul(limit);
        self.options.limit = Some(limit);
        Ok(self)
    }

    pub fn into_options(self) -> QueryOptions {
        self.options
    }
}

fn parse_projection(fields: &str) -> Result<Projection, FilterError> {
    let names: Vec<&str> = fields.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if names.is_empty() {
        return Ok(Projection::Exclude(vec![VERSION_FIELD.to_string()]));
    }

    let excluded = names.iter().filter(|n| n.starts_with('-')).count();
    if excluded == 0 {
        Ok(Projection::Include(names.into_iter().map(String::from).collect()))
    } else if excluded == names.len() {
        Ok(Projection::Exclude(names.into_iter().map(|n| n[1..].to_string()).collect()))
    } else {
        Err(FilterError::MixedProjection)
    }
}

/// Absent, non-numeric or zero values fall back to `default`
fn parse_positive(raw: Option<&str>, param: &'static str, default: i64) -> Result<i64, FilterError> {
    let Some(raw) = raw else { return Ok(default) };
    match raw.trim().parse::<i64>() {
        Ok(0) | Err(_) => Ok(default),
        Ok(n) if n < 0 => Err(FilterError::InvalidPagination { param, value: raw.to_string() }),
        Ok(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SortDirection;

    fn build(query: &str) -> QueryOptions {
        let spec = QuerySpec::parse(query);
        ApiFeatures::build(QueryOptions::new(), &spec, DEFAULT_LIMIT).expect("valid query")
    }

    #[test]
    fn reserved_keys_never_become_predicates() {
        let options = build("page=2&sort=price&limit=5&fields=name&difficulty=easy&price[lt]=500");

        for predicate in &options.predicates {
            assert!(!RESERVED_KEYS.contains(&predicate.field.as_str()), "leaked {:?}", predicate);
        }
        assert_eq!(options.predicates.len(), 2);
    }

    #[test]
    fn operator_keys_become_comparisons() {
        let options = build("duration[gte]=5");
        assert_eq!(
            options.predicates,
            vec![Predicate { field: "duration".into(), op: FilterOp::Gte, value: FilterValue::One("5".into()) }]
        );
    }

    #[test]
    fn scalar_values_become_equality() {
        let options = build("difficulty=easy");
        assert_eq!(options.predicates, vec![Predicate::eq("difficulty", "easy")]);
    }

    #[test]
    fn unknown_operator_keys_pass_through() {
        let options = build("price[ne]=10");
        assert_eq!(options.predicates[0].op, FilterOp::Unrecognized("ne".into()));
    }

    #[test]
    fn base_predicates_are_kept() {
        let spec = QuerySpec::parse("name=Ana");
        let base = QueryOptions::new().with_predicate(Predicate::one_of("role", ["guide", "lead-guide"]));
        let options = ApiFeatures::new(base, &spec).filter().into_options();
        assert_eq!(options.predicates.len(), 2);
        assert_eq!(options.predicates[0].op, FilterOp::In);
    }

    #[test]
    fn sort_splits_on_commas_with_direction_prefix() {
        let options = build("sort=-ratingsAverage,price");
        assert_eq!(
            options.sort,
            vec![
                SortKey { field: "ratingsAverage".into(), direction: SortDirection::Desc },
                SortKey { field: "price".into(), direction: SortDirection::Asc },
            ]
        );
    }

    #[test]
    fn sort_defaults_to_newest_first() {
        let options = build("");
        assert_eq!(options.sort, vec![SortKey { field: "createdAt".into(), direction: SortDirection::Desc }]);
    }

    #[test]
    fn projection_defaults_to_hiding_version() {
        let options = build("");
        assert_eq!(options.projection, Projection::Exclude(vec!["version".into()]));
        assert!(!options.projection.includes("version"));
        assert!(options.projection.includes("name"));
    }

    #[test]
    fn projection_includes_requested_fields_and_id() {
        let options = build("fields=name,price");
        assert!(options.projection.includes("id"));
        assert!(options.projection.includes("price"));
        assert!(!options.projection.includes("summary"));
    }

    #[test]
    fn projection_rejects_mixed_modes() {
        let spec = QuerySpec::parse("fields=name,-price");
        let result = ApiFeatures::new(QueryOptions::new(), &spec).limit_fields();
        assert_eq!(result.err(), Some(FilterError::MixedProjection));
    }

    #[test]
    fn pagination_skips_whole_pages() {
        let options = build("page=2&limit=10");
        assert_eq!(options.skip, 10);
        assert_eq!(options.limit, Some(10));
    }

    #[test]
    fn pagination_defaults() {
        let options = build("page=abc&limit=0");
        assert_eq!(options.skip, 0);
        assert_eq!(options.limit, Some(DEFAULT_LIMIT));
    }

    #[test]
    fn negative_pagination_is_rejected() {
        let spec = QuerySpec::parse("page=-1");
        let result = ApiFeatures::new(QueryOptions::new(), &spec).paginate();
        assert!(matches!(result, Err(FilterError::InvalidPagination { param: "page", .. })));
    }
}
