use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::fmt;
use validator::Validate;

use super::{Document, FieldDef, FieldKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Difficulty {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub guides: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub version: i32,
}

impl Document for Tour {
    const TABLE: &'static str = "tours";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", "id", FieldKind::Text),
        FieldDef::new("name", "name", FieldKind::Text),
        FieldDef::new("duration", "duration", FieldKind::Number),
        FieldDef::new("maxGroupSize", "max_group_size", FieldKind::Number),
        FieldDef::new("difficulty", "difficulty", FieldKind::Text),
        FieldDef::new("ratingsAverage", "ratings_average", FieldKind::Number),
        FieldDef::new("ratingsQuantity", "ratings_quantity", FieldKind::Number),
        FieldDef::new("price", "price", FieldKind::Number),
        FieldDef::new("summary", "summary", FieldKind::Text),
        FieldDef::new("description", "description", FieldKind::Text),
        FieldDef::new("imageCover", "image_cover", FieldKind::Text),
        FieldDef::new("images", "images", FieldKind::TextArray),
        FieldDef::new("startDates", "start_dates", FieldKind::TimestampArray),
        FieldDef::new("guides", "guides", FieldKind::TextArray),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
        FieldDef::new("updatedAt", "updated_at", FieldKind::Timestamp),
        FieldDef::new("version", "version", FieldKind::Number),
    ];
}

impl<'r> FromRow<'r, PgRow> for Tour {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let difficulty: String = row.try_get("difficulty")?;
        let difficulty = Difficulty::try_from(difficulty).map_err(|e| sqlx::Error::ColumnDecode {
            index: "difficulty".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            duration: row.try_get("duration")?,
            max_group_size: row.try_get("max_group_size")?,
            difficulty,
            ratings_average: row.try_get("ratings_average")?,
            ratings_quantity: row.try_get("ratings_quantity")?,
            price: row.try_get("price")?,
            summary: row.try_get("summary")?,
            description: row.try_get("description")?,
            image_cover: row.try_get("image_cover")?,
            images: row.try_get("images")?,
            start_dates: row.try_get("start_dates")?,
            guides: row.try_get("guides")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

/// POST /tours payload. Required fields are optional here so that missing
/// ones surface as validation messages rather than JSON errors.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TourDraft {
    #[validate(
        required(message = "A tour must have a name"),
        length(min = 1, max = 40, message = "A tour name must have between 1 and 40 characters")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "A tour must have a duration"),
        range(min = 1, message = "Duration must be at least one day")
    )]
    pub duration: Option<i32>,
    #[validate(
        required(message = "A tour must have a group size"),
        range(min = 1, message = "Group size must be at least 1")
    )]
    pub max_group_size: Option<i32>,
    #[validate(required(message = "A tour must have a difficulty"))]
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,
    #[validate(
        required(message = "A tour must have a price"),
        range(min = 0.0, message = "Price cannot be negative")
    )]
    pub price: Option<f64>,
    #[validate(
        required(message = "A tour must have a description"),
        length(min = 1, message = "A tour must have a description")
    )]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(required(message = "A tour must have a cover image"))]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
}

impl TourDraft {
    pub const DEFAULT_RATING: f64 = 4.5;

    /// Trim text fields the way they are stored
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|s| s.trim().to_string());
        self.summary = self.summary.map(|s| s.trim().to_string());
        self.description = self.description.map(|s| s.trim().to_string());
        self
    }
}

/// PATCH /tours/:id payload
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TourChanges {
    #[validate(length(min = 1, max = 40, message = "A tour name must have between 1 and 40 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "Duration must be at least one day"))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "Group size must be at least 1"))]
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
}

impl TourChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.duration.is_none()
            && self.max_group_size.is_none()
            && self.difficulty.is_none()
            && self.ratings_average.is_none()
            && self.ratings_quantity.is_none()
            && self.price.is_none()
            && self.summary.is_none()
            && self.description.is_none()
            && self.image_cover.is_none()
            && self.images.is_none()
            && self.start_dates.is_none()
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|s| s.trim().to_string());
        self.summary = self.summary.map(|s| s.trim().to_string());
        self.description = self.description.map(|s| s.trim().to_string());
        self
    }
}

/// Per-difficulty aggregate over highly rated tours
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts in one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}
