pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod types;

#[cfg(test)]
pub mod testing;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, MethodRouter},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{auth as session, guides, health, tours, users};
use crate::middleware::{handle_errors, protect, restrict_to, route_not_found, validate_ids, AllowedRoles};
use crate::state::AppState;
use crate::types::Role;

pub use crate::config::AppConfig;
pub use crate::error::ApiError;

/// Roles allowed to create, edit and delete tours
pub const TOUR_EDITORS: &[Role] = &[Role::LeadGuide, Role::Admin];

pub const ADMINS: &[Role] = &[Role::Admin];

/// Complete application router. Layers, innermost first: body limit,
/// panic catching, the global error handler, CORS, HTTP tracing.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/tours", tour_routes(&state))
        .nest("/users", user_routes(&state))
        .route("/guides", get(guides::list_guides));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(CatchPanicLayer::new())
        .layer(from_fn_with_state(state.clone(), handle_errors))
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn tour_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/top-5-cheap", get(tours::top_5_cheap))
        .route("/tour-stats", get(tours::tour_stats))
        .route("/monthly-plan/:year", get(tours::monthly_plan))
        .route(
            "/",
            get(tours::list_tours).merge(restricted(post(tours::create_tour), state, TOUR_EDITORS)),
        )
        .route(
            "/:id",
            checked_ids(get(tours::get_tour).merge(restricted(
                patch(tours::update_tour).delete(tours::delete_tour),
                state,
                TOUR_EDITORS,
            ))),
        )
        .route(
            "/:id/guides/:guide_id",
            checked_ids(restricted(patch(tours::link_guide), state, TOUR_EDITORS)),
        )
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(session::signup))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .route("/forgotpassword", post(session::forgot_password))
        .route("/resetpassword/:token", patch(session::reset_password))
        .route("/updatepassword", authenticated(patch(session::update_password), state))
        .route("/me", authenticated(get(users::get_me).patch(users::update_me), state))
        .route(
            "/",
            restricted(get(users::list_users).post(users::create_user), state, ADMINS),
        )
        .route(
            "/:id",
            checked_ids(restricted(
                get(users::get_user).patch(users::update_user).delete(users::delete_user),
                state,
                ADMINS,
            )),
        )
}

/// Runs [`protect`] before the handler
fn authenticated(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), protect))
}

/// Runs [`protect`] then [`restrict_to`] before the handler. The layer
/// added last runs first.
fn restricted(route: MethodRouter<AppState>, state: &AppState, roles: &'static [Role]) -> MethodRouter<AppState> {
    let route = route.route_layer(from_fn_with_state(AllowedRoles(roles), restrict_to));
    authenticated(route, state)
}

/// Validates identifier segments ahead of every other route layer
fn checked_ids(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn(validate_ids))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
