use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::fmt;
use validator::Validate;

use super::{Document, FieldDef, FieldKind};
use crate::types::Role;

#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub tours: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub version: i32,
}

impl User {
    /// True when the password changed after a token issued at `issued_at`
    /// (seconds since the epoch)
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => issued_at < changed_at.timestamp(),
            None => false,
        }
    }
}

// Password material stays out of logs
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password_changed_at", &self.password_changed_at)
            .finish_non_exhaustive()
    }
}

impl Document for User {
    const TABLE: &'static str = "users";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", "id", FieldKind::Text),
        FieldDef::new("name", "name", FieldKind::Text),
        FieldDef::new("email", "email", FieldKind::Text),
        FieldDef::new("role", "role", FieldKind::Text),
        FieldDef::new("photo", "photo", FieldKind::Text),
        FieldDef::new("passwordChangedAt", "password_changed_at", FieldKind::Timestamp),
        FieldDef::new("tours", "tours", FieldKind::TextArray),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
        FieldDef::new("updatedAt", "updated_at", FieldKind::Timestamp),
        FieldDef::new("version", "version", FieldKind::Number),
    ];
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let role = Role::try_from(role).map_err(|e| sqlx::Error::ColumnDecode {
            index: "role".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role,
            photo: row.try_get("photo")?,
            password: row.try_get("password")?,
            password_changed_at: row.try_get("password_changed_at")?,
            password_reset_token: row.try_get("password_reset_token")?,
            password_reset_expires: row.try_get("password_reset_expires")?,
            tours: row.try_get("tours")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

/// A user ready to be stored; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo: Option<String>,
    pub password_hash: String,
}

/// Profile fields an update may touch. `role` is only ever set by admins.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserChanges {
    #[validate(length(min = 2, message = "A name must have at least 2 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    #[validate(url(message = "Photo must be a valid URL"))]
    pub photo: Option<String>,
    pub role: Option<Role>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.photo.is_none() && self.role.is_none()
    }

    /// Emails are stored lowercased and names trimmed
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|s| s.trim().to_string());
        self.email = self.email.map(|s| s.trim().to_lowercase());
        self
    }
}
