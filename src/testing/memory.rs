//! In-memory repositories that evaluate [`QueryOptions`] the same way the
//! SQL renderer does, over each record's JSON form.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::database::models::{
    Document, FieldDef, FieldKind, MonthlyPlan, NewUser, Tour, TourChanges, TourDraft, TourStats, User, UserChanges,
};
use crate::database::postgres::year_bounds;
use crate::database::query_builder::{coerce, parse_timestamp, SqlParam};
use crate::database::{DatabaseError, TourRepository, UserRepository};
use crate::filter::{FilterOp, FilterValue, Predicate, QueryOptions, SortDirection};
use crate::types::ObjectId;

/// Full document as the store sees it, including bookkeeping fields the
/// API representation hides
fn document<T: Serialize>(record: &T, version: i32) -> Map<String, Value> {
    let mut doc = match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    doc.insert("version".to_string(), Value::from(version));
    doc
}

fn find_documents<T: Document>(
    docs: Vec<Map<String, Value>>,
    options: &QueryOptions,
) -> Result<Vec<Value>, DatabaseError> {
    let mut matched = Vec::new();
    for doc in docs {
        if matches_all::<T>(&doc, &options.predicates)? {
            matched.push(doc);
        }
    }

    matched.sort_by(|a, b| {
        for key in &options.sort {
            let Some(field) = T::field(&key.field) else { continue };
            let ordering = compare_values(field, a.get(field.name), b.get(field.name));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    let skip = usize::try_from(options.skip).unwrap_or(0);
    let limit = options.limit.and_then(|l| usize::try_from(l).ok()).unwrap_or(usize::MAX);

    Ok(matched
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|doc| {
            let projected = T::FIELDS
                .iter()
                .filter(|f| options.projection.includes(f.name))
                .map(|f| (f.name.to_string(), doc.get(f.name).cloned().unwrap_or(Value::Null)))
                .collect();
            Value::Object(projected)
        })
        .collect())
}

fn matches_all<T: Document>(doc: &Map<String, Value>, predicates: &[Predicate]) -> Result<bool, DatabaseError> {
    for predicate in predicates {
        if !matches::<T>(doc, predicate)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches<T: Document>(doc: &Map<String, Value>, predicate: &Predicate) -> Result<bool, DatabaseError> {
    let Some(field) = T::field(&predicate.field) else {
        return Ok(false);
    };
    let value = doc.get(field.name).unwrap_or(&Value::Null);
    let elements: Vec<&Value> = match value {
        Value::Array(items) if field.kind.is_array() => items.iter().collect(),
        other => vec![other],
    };

    match (&predicate.op, &predicate.value) {
        (FilterOp::Unrecognized(_), _) => Ok(false),
        (FilterOp::In | FilterOp::Eq, FilterValue::Many(values)) => {
            let params = values.iter().map(|v| coerce(field, v)).collect::<Result<Vec<_>, _>>()?;
            Ok(elements
                .iter()
                .any(|e| params.iter().any(|p| compare_param(e, p) == Some(Ordering::Equal))))
        }
        (op, FilterValue::One(raw)) => {
            let param = coerce(field, raw)?;
            Ok(elements.iter().any(|e| {
                let Some(ordering) = compare_param(e, &param) else { return false };
                match op {
                    FilterOp::Eq | FilterOp::In => ordering == Ordering::Equal,
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Gte => ordering != Ordering::Less,
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Lte => ordering != Ordering::Greater,
                    FilterOp::Unrecognized(_) => false,
                }
            }))
        }
        (_, FilterValue::Many(_)) => Ok(false),
    }
}

fn compare_param(value: &Value, param: &SqlParam) -> Option<Ordering> {
    match param {
        SqlParam::Text(s) => value.as_str().map(|v| v.cmp(s.as_str())),
        SqlParam::Number(n) => value.as_f64().and_then(|v| v.partial_cmp(n)),
        SqlParam::Boolean(b) => value.as_bool().map(|v| v.cmp(b)),
        SqlParam::Timestamp(t) => value.as_str().and_then(parse_timestamp).map(|v| v.cmp(t)),
    }
}

// Nulls sort after values ascending, as in Postgres
fn compare_values(field: &FieldDef, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match field.kind {
            FieldKind::Number => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
            FieldKind::Timestamp => a
                .as_str()
                .and_then(parse_timestamp)
                .cmp(&b.as_str().and_then(parse_timestamp)),
            FieldKind::Boolean => a.as_bool().cmp(&b.as_bool()),
            _ => a.as_str().cmp(&b.as_str()),
        },
    }
}

fn duplicate(field: &str, value: &str) -> DatabaseError {
    DatabaseError::UniqueViolation {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[derive(Default)]
pub struct MemoryTourRepository {
    tours: Mutex<Vec<Tour>>,
    offline: AtomicBool,
    broken: AtomicBool,
}

impl MemoryTourRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail as if the store were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Makes every call fail with an unanticipated query error
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, AtomicOrdering::SeqCst);
    }

    pub fn all(&self) -> Vec<Tour> {
        self.tours.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<(), DatabaseError> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            Err(DatabaseError::Unavailable("connection refused".to_string()))
        } else if self.broken.load(AtomicOrdering::SeqCst) {
            Err(DatabaseError::QueryError("relation \"tours\" does not exist".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TourRepository for MemoryTourRepository {
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.check_online()
    }

    async fn find(&self, options: &QueryOptions) -> Result<Vec<Value>, DatabaseError> {
        self.check_online()?;
        let docs = self.all().iter().map(|t| document(t, t.version)).collect();
        find_documents::<Tour>(docs, options)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Tour>, DatabaseError> {
        self.check_online()?;
        Ok(self.all().into_iter().find(|t| t.id == id))
    }

    async fn insert(&self, draft: TourDraft) -> Result<Tour, DatabaseError> {
        self.check_online()?;
        let mut tours = self.tours.lock().unwrap();
        let name = draft.name.unwrap_or_default();
        if tours.iter().any(|t| t.name == name) {
            return Err(duplicate("name", &name));
        }

        let now = Utc::now();
        let tour = Tour {
            id: ObjectId::generate().into_string(),
            name,
            duration: draft.duration.unwrap_or_default(),
            max_group_size: draft.max_group_size.unwrap_or_default(),
            difficulty: draft.difficulty.ok_or_else(|| DatabaseError::CheckViolation("tours_difficulty_check".into()))?,
            ratings_average: draft.ratings_average.unwrap_or(TourDraft::DEFAULT_RATING),
            ratings_quantity: draft.ratings_quantity.unwrap_or(0),
            price: draft.price.unwrap_or_default(),
            summary: draft.summary.unwrap_or_default(),
            description: draft.description,
            image_cover: draft.image_cover.unwrap_or_default(),
            images: draft.images,
            start_dates: draft.start_dates,
            guides: vec![],
            created_at: now,
            updated_at: now,
            version: 0,
        };
        tours.push(tour.clone());
        Ok(tour)
    }

    async fn update(&self, id: &str, changes: TourChanges) -> Result<Option<Tour>, DatabaseError> {
        self.check_online()?;
        let mut tours = self.tours.lock().unwrap();
        if let Some(name) = &changes.name {
            if tours.iter().any(|t| t.id != id && &t.name == name) {
                return Err(duplicate("name", name));
            }
        }
        let Some(tour) = tours.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        if let Some(v) = changes.name { tour.name = v; }
        if let Some(v) = changes.duration { tour.duration = v; }
        if let Some(v) = changes.max_group_size { tour.max_group_size = v; }
        if let Some(v) = changes.difficulty { tour.difficulty = v; }
        if let Some(v) = changes.ratings_average { tour.ratings_average = v; }
        if let Some(v) = changes.ratings_quantity { tour.ratings_quantity = v; }
        if let Some(v) = changes.price { tour.price = v; }
        if let Some(v) = changes.summary { tour.summary = v; }
        if let Some(v) = changes.description { tour.description = Some(v); }
        if let Some(v) = changes.image_cover { tour.image_cover = v; }
        if let Some(v) = changes.images { tour.images = v; }
        if let Some(v) = changes.start_dates { tour.start_dates = v; }
        tour.version += 1;
        tour.updated_at = Utc::now();
        Ok(Some(tour.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        self.check_online()?;
        let mut tours = self.tours.lock().unwrap();
        let before = tours.len();
        tours.retain(|t| t.id != id);
        Ok(tours.len() != before)
    }

    async fn add_guide(&self, id: &str, guide_id: &str) -> Result<bool, DatabaseError> {
        self.check_online()?;
        let mut tours = self.tours.lock().unwrap();
        let Some(tour) = tours.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        if !tour.guides.iter().any(|g| g == guide_id) {
            tour.guides.push(guide_id.to_string());
        }
        Ok(true)
    }

    async fn stats(&self, min_rating: f64) -> Result<Vec<TourStats>, DatabaseError> {
        self.check_online()?;
        let mut groups: BTreeMap<String, Vec<Tour>> = BTreeMap::new();
        for tour in self.all().into_iter().filter(|t| t.ratings_average >= min_rating) {
            groups.entry(tour.difficulty.as_str().to_uppercase()).or_default().push(tour);
        }

        let mut stats: Vec<TourStats> = groups
            .into_iter()
            .map(|(difficulty, tours)| {
                let n = tours.len() as f64;
                let prices = tours.iter().map(|t| t.price);
                TourStats {
                    difficulty,
                    num_tours: tours.len() as i64,
                    avg_rating: tours.iter().map(|t| t.ratings_average).sum::<f64>() / n,
                    avg_price: prices.clone().sum::<f64>() / n,
                    min_price: prices.clone().fold(f64::INFINITY, f64::min),
                    max_price: prices.fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.avg_price.partial_cmp(&b.avg_price).unwrap_or(Ordering::Equal));
        Ok(stats)
    }

    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlan>, DatabaseError> {
        self.check_online()?;
        let (start, end) = year_bounds(year)?;
        let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for tour in self.all() {
            for date in tour.start_dates.iter().filter(|d| **d >= start && **d < end) {
                months.entry(date.month()).or_default().push(tour.name.clone());
            }
        }

        let mut plan: Vec<MonthlyPlan> = months
            .into_iter()
            .map(|(month, mut tours)| {
                tours.sort();
                MonthlyPlan {
                    month: month as i32,
                    num_tour_starts: tours.len() as i64,
                    tours,
                }
            })
            .collect();
        plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts).then(a.month.cmp(&b.month)));
        Ok(plan)
    }
}

#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<User> {
        self.all().into_iter().find(|u| u.id == id)
    }

    /// Overwrites a stored record wholesale
    pub fn put(&self, user: User) {
        let mut users = self.users.lock().unwrap();
        users.retain(|u| u.id != user.id);
        users.push(user);
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find(&self, options: &QueryOptions) -> Result<Vec<Value>, DatabaseError> {
        let docs = self.all().iter().map(|u| document(u, u.version)).collect();
        find_documents::<User>(docs, options)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let email = email.trim().to_lowercase();
        Ok(self.all().into_iter().find(|u| u.email == email))
    }

    async fn find_by_reset_token(&self, hashed_token: &str, now: DateTime<Utc>) -> Result<Option<User>, DatabaseError> {
        Ok(self.all().into_iter().find(|u| {
            u.password_reset_token.as_deref() == Some(hashed_token)
                && u.password_reset_expires.map_or(false, |expires| expires > now)
        }))
    }

    async fn insert(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut users = self.users.lock().unwrap();
        let email = user.email.trim().to_lowercase();
        if users.iter().any(|u| u.email == email) {
            return Err(duplicate("email", &email));
        }

        let now = Utc::now();
        let user = User {
            id: ObjectId::generate().into_string(),
            name: user.name,
            email,
            role: user.role,
            photo: user.photo,
            password: user.password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            tours: vec![],
            created_at: now,
            updated_at: now,
            version: 0,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<User>, DatabaseError> {
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(duplicate("email", email));
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        if let Some(v) = changes.name { user.name = v; }
        if let Some(v) = changes.email { user.email = v; }
        if let Some(v) = changes.photo { user.photo = Some(v); }
        if let Some(v) = changes.role { user.role = v; }
        user.version += 1;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_password(&self, id: &str, password_hash: &str, changed_at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        user.password = password_hash.to_string();
        user.password_changed_at = Some(changed_at);
        user.password_reset_token = None;
        user.password_reset_expires = None;
        user.version += 1;
        Ok(true)
    }

    async fn set_reset_token(&self, id: &str, token: Option<(&str, DateTime<Utc>)>) -> Result<bool, DatabaseError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        user.password_reset_token = token.map(|(hash, _)| hash.to_string());
        user.password_reset_expires = token.map(|(_, expires)| expires);
        Ok(true)
    }

    async fn add_tour(&self, id: &str, tour_id: &str) -> Result<bool, DatabaseError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        if !user.tours.iter().any(|t| t == tour_id) {
            user.tours.push(tour_id.to_string());
        }
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}
