use std::collections::{BTreeSet, HashMap};

use axum::extract::State;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::filter::{ApiFeatures, Predicate, Projection, QueryOptions, QuerySpec};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::types::Role;

/// GET /api/v1/guides
///
/// Users holding a guide role, each with the tours they lead expanded to
/// `{id, name}` pairs.
pub async fn list_guides(State(state): State<AppState>, spec: QuerySpec) -> ApiResult<Value> {
    let base = QueryOptions::new().with_predicate(Predicate::one_of(
        "role",
        [Role::Guide.as_str(), Role::LeadGuide.as_str()],
    ));
    let options = ApiFeatures::build(base, &spec, state.config.api.default_limit)?;
    let Some(options) = public_profile(options) else {
        return Ok(ApiResponse::success(json!({ "guides": [] })).with_results(0));
    };
    let mut guides = state.users.find(&options).await?;

    populate_tours(&state, &mut guides).await?;

    let results = guides.len();
    Ok(ApiResponse::success(json!({ "guides": guides })).with_results(results))
}

/// Guide fields visible to anonymous callers
const PUBLIC_FIELDS: [&str; 5] = ["id", "name", "photo", "role", "tours"];

fn is_public(field: &str) -> bool {
    PUBLIC_FIELDS.contains(&field)
}

/// Narrows a listing to public profile fields. A filter on any other field
/// matches nothing, so `None` is returned.
fn public_profile(mut options: QueryOptions) -> Option<QueryOptions> {
    if options.predicates.iter().any(|p| !is_public(&p.field)) {
        return None;
    }
    options.sort.retain(|key| is_public(&key.field));

    let visible: Vec<String> = PUBLIC_FIELDS
        .iter()
        .filter(|field| **field != "id" && options.projection.includes(field))
        .map(|field| field.to_string())
        .collect();
    options.projection = if visible.is_empty() {
        Projection::Include(vec!["name".to_string()])
    } else {
        Projection::Include(visible)
    };
    Some(options)
}

async fn populate_tours(state: &AppState, guides: &mut [Value]) -> Result<(), ApiError> {
    let ids: BTreeSet<String> = guides
        .iter()
        .filter_map(|g| g.get("tours").and_then(Value::as_array))
        .flatten()
        .filter_map(|id| id.as_str().map(String::from))
        .collect();
    if ids.is_empty() {
        return Ok(());
    }

    let lookup = QueryOptions {
        predicates: vec![Predicate::one_of("id", ids)],
        projection: Projection::Include(vec!["name".to_string()]),
        ..QueryOptions::default()
    };
    let names: HashMap<String, Value> = state
        .tours
        .find(&lookup)
        .await?
        .into_iter()
        .filter_map(|tour| {
            let id = tour.get("id")?.as_str()?.to_string();
            Some((id, tour))
        })
        .collect();

    for guide in guides.iter_mut() {
        if let Some(tours) = guide.get_mut("tours").and_then(Value::as_array_mut) {
            // Tours deleted since the link was made drop out
            *tours = tours
                .iter()
                .filter_map(|id| id.as_str().and_then(|id| names.get(id)).cloned())
                .collect();
        }
    }
    Ok(())
}
