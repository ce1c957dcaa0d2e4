use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::database::models::{TourChanges, TourDraft};
use crate::error::ApiError;
use crate::filter::{ApiFeatures, QueryOptions, QuerySpec};
use crate::middleware::{parse_object_id, ApiResponse, ApiResult, ObjectIdPath, ValidJson};
use crate::state::AppState;

/// Fixed query behind `GET /tours/top-5-cheap`
pub const TOP_CHEAP_QUERY: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

/// Tours rated at least this well count towards the stats report
pub const STATS_MIN_RATING: f64 = 4.5;

const USER_NOT_FOUND: &str = "No user found with that ID";

const TOUR_NOT_FOUND: &str = "No tour found with that ID";

/// GET /api/v1/tours
pub async fn list_tours(State(state): State<AppState>, spec: QuerySpec) -> ApiResult<Value> {
    find_tours(&state, &spec).await
}

/// GET /api/v1/tours/top-5-cheap
pub async fn top_5_cheap(State(state): State<AppState>) -> ApiResult<Value> {
    let spec = QuerySpec::from_pairs(TOP_CHEAP_QUERY);
    find_tours(&state, &spec).await
}

async fn find_tours(state: &AppState, spec: &QuerySpec) -> ApiResult<Value> {
    let options = ApiFeatures::build(QueryOptions::new(), spec, state.config.api.default_limit)?;
    let tours = state.tours.find(&options).await?;

    if tours.is_empty() {
        return Err(ApiError::not_found("No tours found"));
    }

    let results = tours.len();
    Ok(ApiResponse::success(json!({ "tours": tours })).with_results(results))
}

/// GET /api/v1/tours/:id
pub async fn get_tour(State(state): State<AppState>, ObjectIdPath(id): ObjectIdPath) -> ApiResult<Value> {
    let tour = state
        .tours
        .find_by_id(id.as_str())
        .await?
        .ok_or_else(|| ApiError::not_found(TOUR_NOT_FOUND))?;

    Ok(ApiResponse::success(json!({ "tour": tour })))
}

/// POST /api/v1/tours
pub async fn create_tour(State(state): State<AppState>, ValidJson(draft): ValidJson<TourDraft>) -> ApiResult<Value> {
    let tour = state.tours.insert(draft.normalized()).await?;
    tracing::info!(tour_id = %tour.id, name = %tour.name, "Tour created");

    Ok(ApiResponse::created(json!({ "tour": tour })))
}

/// PATCH /api/v1/tours/:id
pub async fn update_tour(
    State(state): State<AppState>,
    ObjectIdPath(id): ObjectIdPath,
    ValidJson(changes): ValidJson<TourChanges>,
) -> ApiResult<Value> {
    if changes.is_empty() {
        return Err(ApiError::bad_request("Tour data is missing"));
    }

    let tour = state
        .tours
        .update(id.as_str(), changes.normalized())
        .await?
        .ok_or_else(|| ApiError::not_found(TOUR_NOT_FOUND))?;

    Ok(ApiResponse::success(json!({ "tour": tour })))
}

/// DELETE /api/v1/tours/:id
pub async fn delete_tour(State(state): State<AppState>, ObjectIdPath(id): ObjectIdPath) -> ApiResult<()> {
    if !state.tours.delete(id.as_str()).await? {
        return Err(ApiError::not_found(TOUR_NOT_FOUND));
    }

    tracing::info!(tour_id = %id, "Tour deleted");
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/tours/tour-stats
pub async fn tour_stats(State(state): State<AppState>) -> ApiResult<Value> {
    let stats = state.tours.stats(STATS_MIN_RATING).await?;
    Ok(ApiResponse::success(json!({ "stats": stats })))
}

/// GET /api/v1/tours/monthly-plan/:year
pub async fn monthly_plan(State(state): State<AppState>, Path(year): Path<String>) -> ApiResult<Value> {
    let year = year
        .parse::<i32>()
        .ok()
        .filter(|y| (1..=9999).contains(y))
        .ok_or_else(|| ApiError::bad_request(format!("Invalid year: {}.", year)))?;

    let plan = state.tours.monthly_plan(year).await?;
    let results = plan.len();
    Ok(ApiResponse::success(json!({ "plan": plan })).with_results(results))
}

/// PATCH /api/v1/tours/:id/guides/:guide_id
///
/// Two independent writes, tour first; a failure between them leaves the
/// guide listed on the tour only.
pub async fn link_guide(
    State(state): State<AppState>,
    Path((id, guide_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let id = parse_object_id(&id)?;
    let guide_id = parse_object_id(&guide_id)?;

    let guide = state
        .users
        .find_by_id(guide_id.as_str())
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    if !guide.role.is_guide() {
        return Err(ApiError::bad_request(format!("User {} is not a guide", guide.id)));
    }

    if !state.tours.add_guide(id.as_str(), guide_id.as_str()).await? {
        return Err(ApiError::not_found(TOUR_NOT_FOUND));
    }
    if !state.users.add_tour(guide_id.as_str(), id.as_str()).await? {
        return Err(ApiError::not_found(USER_NOT_FOUND));
    }

    let tour = state
        .tours
        .find_by_id(id.as_str())
        .await?
        .ok_or_else(|| ApiError::not_found(TOUR_NOT_FOUND))?;

    tracing::info!(tour_id = %id, guide_id = %guide_id, "Guide linked to tour");
    Ok(ApiResponse::success(json!({ "tour": tour })))
}
