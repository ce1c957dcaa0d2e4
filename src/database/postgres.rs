use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use sqlx::{Encode, PgPool, Postgres, Type};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    Document, MonthlyPlan, NewUser, Tour, TourChanges, TourDraft, TourStats, User, UserChanges,
};
use crate::database::query_builder::{bind_param_query_scalar, normalize_timestamps, QueryBuilder};
use crate::database::repository::{TourRepository, UserRepository};
use crate::filter::QueryOptions;
use crate::types::ObjectId;

/// Run a rendered find and collect the projected documents
async fn find_documents<T: Document>(pool: &PgPool, options: &QueryOptions) -> Result<Vec<Value>, DatabaseError> {
    let sql = QueryBuilder::<T>::select(options)?;
    tracing::debug!(query = %sql.query, params = sql.params.len(), "find");

    let mut q = sqlx::query_scalar::<_, Value>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_scalar(q, p);
    }
    let mut docs = q.fetch_all(pool).await?;
    docs.iter_mut().for_each(normalize_timestamps::<T>);
    Ok(docs)
}

/// Appends `, "column" = $n` when a value is present
fn push_set<'args, T>(qb: &mut sqlx::QueryBuilder<'args, Postgres>, column: &str, value: Option<T>)
where
    T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
{
    if let Some(value) = value {
        qb.push(format!(", \"{}\" = ", column));
        qb.push_bind(value);
    }
}

#[derive(Clone)]
pub struct PgTourRepository {
    pool: PgPool,
}

impl PgTourRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TourRepository for PgTourRepository {
    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn find(&self, options: &QueryOptions) -> Result<Vec<Value>, DatabaseError> {
        find_documents::<Tour>(&self.pool, options).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Tour>, DatabaseError> {
        let tour = sqlx::query_as::<_, Tour>(r#"SELECT * FROM "tours" WHERE "id" = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tour)
    }

    async fn insert(&self, draft: TourDraft) -> Result<Tour, DatabaseError> {
        let tour = sqlx::query_as::<_, Tour>(
            r#"INSERT INTO "tours" (
                "id", "name", "duration", "max_group_size", "difficulty", "ratings_average",
                "ratings_quantity", "price", "summary", "description", "image_cover", "images", "start_dates"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *"#,
        )
        .bind(ObjectId::generate().into_string())
        .bind(draft.name)
        .bind(draft.duration)
        .bind(draft.max_group_size)
        .bind(draft.difficulty.map(|d| d.as_str()))
        .bind(draft.ratings_average.unwrap_or(TourDraft::DEFAULT_RATING))
        .bind(draft.ratings_quantity.unwrap_or(0))
        .bind(draft.price)
        .bind(draft.summary)
        .bind(draft.description)
        .bind(draft.image_cover)
        .bind(draft.images)
        .bind(draft.start_dates)
        .fetch_one(&self.pool)
        .await?;
        Ok(tour)
    }

    async fn update(&self, id: &str, changes: TourChanges) -> Result<Option<Tour>, DatabaseError> {
        let mut qb = sqlx::QueryBuilder::<Postgres>::new(
            r#"UPDATE "tours" SET "updated_at" = now(), "version" = "version" + 1"#,
        );
        push_set(&mut qb, "name", changes.name);
        push_set(&mut qb, "duration", changes.duration);
        push_set(&mut qb, "max_group_size", changes.max_group_size);
        push_set(&mut qb, "difficulty", changes.difficulty.map(|d| d.as_str()));
        push_set(&mut qb, "ratings_average", changes.ratings_average);
        push_set(&mut qb, "ratings_quantity", changes.ratings_quantity);
        push_set(&mut qb, "price", changes.price);
        push_set(&mut qb, "summary", changes.summary);
        push_set(&mut qb, "description", changes.description);
        push_set(&mut qb, "image_cover", changes.image_cover);
        push_set(&mut qb, "images", changes.images);
        push_set(&mut qb, "start_dates", changes.start_dates);
        qb.push(r#" WHERE "id" = "#);
        qb.push_bind(id.to_string());
        qb.push(" RETURNING *");

        let tour = qb.build_query_as::<Tour>().fetch_optional(&self.pool).await?;
        Ok(tour)
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(r#"DELETE FROM "tours" WHERE "id" = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_guide(&self, id: &str, guide_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"UPDATE "tours" SET
                "guides" = CASE WHEN $2 = ANY("guides") THEN "guides" ELSE array_append("guides", $2) END,
                "updated_at" = now(),
                "version" = "version" + 1
            WHERE "id" = $1"#,
        )
        .bind(id)
        .bind(guide_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, min_rating: f64) -> Result<Vec<TourStats>, DatabaseError> {
        let stats = sqlx::query_as::<_, TourStats>(
            r#"SELECT
                UPPER("difficulty") AS "difficulty",
                COUNT(*) AS "num_tours",
                AVG("ratings_average") AS "avg_rating",
                AVG("price") AS "avg_price",
                MIN("price") AS "min_price",
                MAX("price") AS "max_price"
            FROM "tours"
            WHERE "ratings_average" >= $1
            GROUP BY UPPER("difficulty")
            ORDER BY "avg_price" ASC"#,
        )
        .bind(min_rating)
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlan>, DatabaseError> {
        let (from, to) = year_bounds(year)?;
        let plan = sqlx::query_as::<_, MonthlyPlan>(
            r#"SELECT
                EXTRACT(MONTH FROM s."start_date" AT TIME ZONE 'UTC')::INT4 AS "month",
                COUNT(*) AS "num_tour_starts",
                array_agg(t."name" ORDER BY t."name") AS "tours"
            FROM "tours" t, unnest(t."start_dates") AS s("start_date")
            WHERE s."start_date" >= $1 AND s."start_date" < $2
            GROUP BY 1
            ORDER BY "num_tour_starts" DESC, "month" ASC"#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(plan)
    }
}

/// `[Jan 1 of year, Jan 1 of year + 1)` in UTC
pub fn year_bounds(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), DatabaseError> {
    let invalid = || DatabaseError::InvalidValue {
        field: "year".to_string(),
        value: year.to_string(),
    };
    let start = |y: i32| Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).single().ok_or_else(invalid);
    let next = year.checked_add(1).ok_or_else(invalid)?;
    Ok((start(year)?, start(next)?))
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find(&self, options: &QueryOptions) -> Result<Vec<Value>, DatabaseError> {
        find_documents::<User>(&self.pool, options).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM "users" WHERE "id" = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM "users" WHERE "email" = $1"#)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_reset_token(&self, hashed_token: &str, now: DateTime<Utc>) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT * FROM "users" WHERE "password_reset_token" = $1 AND "password_reset_expires" > $2"#,
        )
        .bind(hashed_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO "users" ("id", "name", "email", "role", "photo", "password")
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *"#,
        )
        .bind(ObjectId::generate().into_string())
        .bind(user.name.trim())
        .bind(user.email.trim().to_lowercase())
        .bind(user.role.as_str())
        .bind(user.photo)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<User>, DatabaseError> {
        let changes = changes.normalized();
        let mut qb = sqlx::QueryBuilder::<Postgres>::new(
            r#"UPDATE "users" SET "updated_at" = now(), "version" = "version" + 1"#,
        );
        push_set(&mut qb, "name", changes.name);
        push_set(&mut qb, "email", changes.email);
        push_set(&mut qb, "photo", changes.photo);
        push_set(&mut qb, "role", changes.role.map(|r| r.as_str()));
        qb.push(r#" WHERE "id" = "#);
        qb.push_bind(id.to_string());
        qb.push(" RETURNING *");

        let user = qb.build_query_as::<User>().fetch_optional(&self.pool).await?;
        Ok(user)
    }

    async fn set_password(&self, id: &str, password_hash: &str, changed_at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"UPDATE "users" SET
                "password" = $2,
                "password_changed_at" = $3,
                "password_reset_token" = NULL,
                "password_reset_expires" = NULL,
                "updated_at" = now(),
                "version" = "version" + 1
            WHERE "id" = $1"#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(changed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reset_token(&self, id: &str, token: Option<(&str, DateTime<Utc>)>) -> Result<bool, DatabaseError> {
        let (hashed, expires) = match token {
            Some((hashed, expires)) => (Some(hashed), Some(expires)),
            None => (None, None),
        };
        let result = sqlx::query(
            r#"UPDATE "users" SET "password_reset_token" = $2, "password_reset_expires" = $3 WHERE "id" = $1"#,
        )
        .bind(id)
        .bind(hashed)
        .bind(expires)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_tour(&self, id: &str, tour_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"UPDATE "users" SET
                "tours" = CASE WHEN $2 = ANY("tours") THEN "tours" ELSE array_append("tours", $2) END,
                "updated_at" = now(),
                "version" = "version" + 1
            WHERE "id" = $1"#,
        )
        .bind(id)
        .bind(tour_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(r#"DELETE FROM "users" WHERE "id" = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
