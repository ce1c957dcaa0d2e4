//! Test harness: the full router over in-memory repositories and a
//! recording mailer.

pub mod memory;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::{AppConfig, Environment};
use crate::database::models::{Difficulty, NewUser, Tour, TourDraft, User};
use crate::database::{TourRepository, UserRepository};
use crate::services::{MailError, Mailer, PasswordResetEmail};
use crate::state::AppState;
use crate::types::Role;

pub use memory::{MemoryTourRepository, MemoryUserRepository};

pub const PASSWORD: &str = "pass1234";

/// Mailer that records what it was asked to send and can be told to fail
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<PasswordResetEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<PasswordResetEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(&self, email: &PasswordResetEmail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Rejected {
                status: 503,
                body: "mail provider unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.url = "postgres://unused".to_string();
    config.security.bcrypt_cost = 4;
    config.security.jwt_secret = "test-secret".to_string();
    config
}

pub struct TestApp {
    pub state: AppState,
    pub tours: Arc<MemoryTourRepository>,
    pub users: Arc<MemoryUserRepository>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Same application rendering errors the way production does
    pub fn strict() -> Self {
        let mut config = test_config();
        config.environment = Environment::Production;
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Self {
        let tours = Arc::new(MemoryTourRepository::new());
        let users = Arc::new(MemoryUserRepository::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::with_repositories(config, tours.clone(), users.clone(), mailer.clone());
        Self { state, tours, users, mailer }
    }

    pub fn router(&self) -> Router {
        crate::app(self.state.clone())
    }

    /// Stores a user with [`PASSWORD`] and returns it with a fresh token
    pub async fn seed_user(&self, email: &str, role: Role) -> (User, String) {
        let password_hash = self.state.passwords.hash(PASSWORD).await.expect("hash");
        let user = self
            .users
            .insert(NewUser {
                name: "Test User".to_string(),
                email: email.to_string(),
                role,
                photo: None,
                password_hash,
            })
            .await
            .expect("seed user");
        let token = self.state.tokens.issue(&user.id).expect("token");
        (user, token)
    }

    pub async fn seed_tour(&self, name: &str, price: f64, rating: f64, difficulty: Difficulty) -> Tour {
        let draft = TourDraft {
            name: Some(name.to_string()),
            duration: Some(5),
            max_group_size: Some(10),
            difficulty: Some(difficulty),
            ratings_average: Some(rating),
            ratings_quantity: Some(0),
            price: Some(price),
            summary: Some(format!("{} summary", name)),
            description: None,
            image_cover: Some("cover.jpg".to_string()),
            images: vec![],
            start_dates: vec![],
        };
        self.tours.insert(draft).await.expect("seed tour")
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes) }))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }
}
