use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::database::manager::DatabaseError;
use crate::database::models::{MonthlyPlan, NewUser, Tour, TourChanges, TourDraft, TourStats, User, UserChanges};
use crate::filter::QueryOptions;

/// Persistence for tours. `find` returns projected documents keyed by
/// public field name; the typed methods return whole records.
#[async_trait]
pub trait TourRepository: Send + Sync {
    /// Round trip to the backing store
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn find(&self, options: &QueryOptions) -> Result<Vec<Value>, DatabaseError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Tour>, DatabaseError>;

    async fn insert(&self, draft: TourDraft) -> Result<Tour, DatabaseError>;

    /// Applies `changes`, bumps `version`; `None` when no such tour
    async fn update(&self, id: &str, changes: TourChanges) -> Result<Option<Tour>, DatabaseError>;

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError>;

    /// Adds `guide_id` to the tour's guides unless already present
    async fn add_guide(&self, id: &str, guide_id: &str) -> Result<bool, DatabaseError>;

    /// Per-difficulty aggregates over tours rated at least `min_rating`,
    /// cheapest average first
    async fn stats(&self, min_rating: f64) -> Result<Vec<TourStats>, DatabaseError>;

    /// Tour starts per month of `year`, busiest month first
    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlan>, DatabaseError>;
}

/// Persistence for users, including credential bookkeeping
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find(&self, options: &QueryOptions) -> Result<Vec<Value>, DatabaseError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// User holding `hashed_token` whose reset window is still open at `now`
    async fn find_by_reset_token(&self, hashed_token: &str, now: DateTime<Utc>) -> Result<Option<User>, DatabaseError>;

    async fn insert(&self, user: NewUser) -> Result<User, DatabaseError>;

    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<User>, DatabaseError>;

    /// Stores a new hash, records when it changed and clears any reset token
    async fn set_password(&self, id: &str, password_hash: &str, changed_at: DateTime<Utc>) -> Result<bool, DatabaseError>;

    /// Stores (or with `None`, clears) a reset token digest and its expiry
    async fn set_reset_token(&self, id: &str, token: Option<(&str, DateTime<Utc>)>) -> Result<bool, DatabaseError>;

    async fn add_tour(&self, id: &str, tour_id: &str) -> Result<bool, DatabaseError>;

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError>;
}
