use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use sqlx::{
    self,
    postgres::{PgArguments, PgRow},
    FromRow, Postgres,
};
use std::marker::PhantomData;

use crate::database::manager::DatabaseError;
use crate::database::models::{Document, FieldDef, FieldKind};
use crate::filter::{FilterOp, FilterValue, Predicate, Projection, QueryOptions, SortKey};

/// Typed bind parameter produced by coercing a query-string value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Boolean(bool),
}

/// Rendered statement plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Coerce a raw value for comparison against `field` (against one element
/// for array fields). Failure mirrors a document store's cast error.
pub fn coerce(field: &FieldDef, raw: &str) -> Result<SqlParam, DatabaseError> {
    let invalid = || DatabaseError::InvalidValue {
        field: field.name.to_string(),
        value: raw.to_string(),
    };

    match field.kind.element() {
        FieldKind::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(SqlParam::Number)
            .ok_or_else(invalid),
        FieldKind::Timestamp => parse_timestamp(raw).map(SqlParam::Timestamp).ok_or_else(invalid),
        FieldKind::Boolean => match raw.trim() {
            "true" => Ok(SqlParam::Boolean(true)),
            "false" => Ok(SqlParam::Boolean(false)),
            _ => Err(invalid()),
        },
        _ => Ok(SqlParam::Text(raw.to_string())),
    }
}

/// RFC 3339 instants or bare `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Rewrites the timestamps `json_build_object` emits (`+00:00` offsets,
/// microseconds) into the same form the typed records serialize to
pub fn normalize_timestamps<T: Document>(doc: &mut Value) {
    let Some(map) = doc.as_object_mut() else { return };
    for field in T::FIELDS {
        if !matches!(field.kind, FieldKind::Timestamp | FieldKind::TimestampArray) {
            continue;
        }
        match map.get_mut(field.name) {
            Some(Value::String(raw)) => normalize_instant(raw),
            Some(Value::Array(items)) => items.iter_mut().for_each(|item| {
                if let Value::String(raw) = item {
                    normalize_instant(raw);
                }
            }),
            _ => {}
        }
    }
}

fn normalize_instant(raw: &mut String) {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        *raw = instant.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true);
    }
}

/// Renders [`QueryOptions`] against a document's field catalogue.
///
/// Every document is returned as one JSON object built from the projected
/// columns, keyed by public field name. Predicates on unknown fields and
/// unrecognized operators render as `FALSE`; unknown sort keys and
/// projection entries are skipped.
pub struct QueryBuilder<T> {
    params: Vec<SqlParam>,
    _phantom: PhantomData<T>,
}

impl<T: Document> QueryBuilder<T> {
    fn new() -> Self {
        Self {
            params: vec![],
            _phantom: PhantomData,
        }
    }

    pub fn select(options: &QueryOptions) -> Result<SqlResult, DatabaseError> {
        let mut builder = Self::new();
        let where_clause = builder.where_clause(&options.predicates)?;

        let mut query = format!(
            "SELECT {} AS \"document\" FROM \"{}\" WHERE {}",
            Self::projection(&options.projection),
            T::TABLE,
            where_clause
        );

        let order_by = Self::order_by(&options.sort);
        if !order_by.is_empty() {
            query.push(' ');
            query.push_str(&order_by);
        }
        if let Some(limit) = options.limit {
            query.push_str(&format!(" LIMIT {}", limit.max(0)));
        }
        if options.skip > 0 {
            query.push_str(&format!(" OFFSET {}", options.skip));
        }

        Ok(SqlResult {
            query,
            params: builder.params,
        })
    }

    fn where_clause(&mut self, predicates: &[Predicate]) -> Result<String, DatabaseError> {
        let mut conditions = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            conditions.push(self.condition(predicate)?);
        }
        if conditions.is_empty() {
            Ok("TRUE".to_string())
        } else {
            Ok(conditions.join(" AND "))
        }
    }

    fn condition(&mut self, predicate: &Predicate) -> Result<String, DatabaseError> {
        let Some(field) = T::field(&predicate.field) else {
            return Ok("FALSE".to_string());
        };
        let column = format!("\"{}\"", field.column);

        match (&predicate.op, &predicate.value) {
            (FilterOp::Unrecognized(_), _) => Ok("FALSE".to_string()),
            (FilterOp::In, FilterValue::Many(values)) | (FilterOp::Eq, FilterValue::Many(values)) => {
                if values.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    let param = coerce(field, value)?;
                    placeholders.push(self.param(param));
                }
                if field.kind.is_array() {
                    Ok(format!("{} && ARRAY[{}]", column, placeholders.join(", ")))
                } else {
                    Ok(format!("{} IN ({})", column, placeholders.join(", ")))
                }
            }
            (FilterOp::In, FilterValue::One(value)) => self.comparison(field, &column, &FilterOp::Eq, value),
            (op, FilterValue::One(value)) => self.comparison(field, &column, op, value),
            (_, FilterValue::Many(_)) => Ok("FALSE".to_string()),
        }
    }

    fn comparison(&mut self, field: &FieldDef, column: &str, op: &FilterOp, raw: &str) -> Result<String, DatabaseError> {
        let Some(sql_op) = op.to_sql() else {
            return Ok("FALSE".to_string());
        };
        let placeholder = self.param(coerce(field, raw)?);

        if field.kind.is_array() {
            // Matches when any element satisfies the comparison
            Ok(format!("{} {} ANY({})", placeholder, flip(sql_op), column))
        } else {
            Ok(format!("{} {} {}", column, sql_op, placeholder))
        }
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn order_by(sort: &[SortKey]) -> String {
        let parts: Vec<String> = sort
            .iter()
            .filter_map(|key| {
                T::field(&key.field).map(|f| format!("\"{}\" {}", f.column, key.direction.to_sql()))
            })
            .collect();

        if parts.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", parts.join(", "))
        }
    }

    fn projection(projection: &Projection) -> String {
        let pairs: Vec<String> = T::FIELDS
            .iter()
            .filter(|f| projection.includes(f.name))
            .map(|f| format!("'{}', \"{}\"", f.name, f.column))
            .collect();
        format!("json_build_object({})", pairs.join(", "))
    }
}

/// Operator with its operands swapped: `col > $1` is `$1 < col`
fn flip(op: &str) -> &str {
    match op {
        ">" => "<",
        ">=" => "<=",
        "<" => ">",
        "<=" => ">=",
        other => other,
    }
}

pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        SqlParam::Text(s) => q.bind(s.as_str()),
        SqlParam::Number(n) => q.bind(*n),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Boolean(b) => q.bind(*b),
    }
}

pub fn bind_param_query_scalar<'q, O>(
    q: sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>,
    v: &'q SqlParam,
) -> sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>
where
    (O,): for<'r> FromRow<'r, PgRow>,
{
    match v {
        SqlParam::Text(s) => q.bind(s.as_str()),
        SqlParam::Number(n) => q.bind(*n),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Boolean(b) => q.bind(*b),
    }
}
