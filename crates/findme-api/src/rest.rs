//! REST API handlers

use crate::auth::{require_admin, AuthUser};
use crate::error::{error_response, ApiError};
use crate::state::AppState;
use crate::uploads::{multipart_error, read_text, Upload};
use crate::{admin, comments};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use findme_aging::AgeProgressionRequest;
use findme_core::{
    ApiConfig, FindmeError, FindmeResult, NewSubmission, Principal, Submission, SubmissionPatch,
    SubmissionStatus, SubmissionSummary,
};
use findme_store::{Page, TtlCacheStats, FILES_MOUNT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let admin_only = Router::new()
        .route("/submissions/summary", get(get_summary))
        .route("/submissions/:id/status", post(moderate_submission))
        .merge(comments::admin_routes())
        .merge(admin::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route("/submissions", get(list_submissions).post(create_submission))
        .route("/submissions/mine", get(list_my_submissions))
        .route(
            "/submissions/:id",
            get(get_submission)
                .put(update_submission)
                .delete(delete_submission),
        )
        .route("/submissions/:id/age-progression", get(get_age_progression))
        .merge(comments::routes())
        .merge(admin_only)
        .nest_service(FILES_MOUNT, ServeDir::new(&state.files_dir))
        .layer(DefaultBodyLimit::max(state.upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer for the configured origins, `None` when disabled
pub fn cors_layer(config: &ApiConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    Some(layer.allow_origin(origins))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: Vec<String>,
    pub summary_cache: TtlCacheStats,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state.resolver.provider_names(),
        summary_cache: state.summary_cache.stats().await,
    })
}

/// Pagination query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub(crate) fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

/// List public submissions
async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let submissions = state
        .store
        .list(query.page(), true)
        .await
        .map_err(error_response)?;
    Ok(Json(submissions))
}

/// List the caller's own submissions regardless of status
async fn list_my_submissions(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let submissions = state
        .store
        .list_by_user(principal.user_id, query.page())
        .await
        .map_err(error_response)?;
    Ok(Json(submissions))
}

/// Fetch a submission that anonymous visitors may see
pub(crate) async fn public_submission(state: &AppState, id: i64) -> Result<Submission, ApiError> {
    match state.store.get(id).await.map_err(error_response)? {
        Some(submission) if submission.status.is_public() => Ok(submission),
        _ => Err(error_response(FindmeError::SubmissionNotFound(id))),
    }
}

/// Fetch a submission the caller may modify
async fn modifiable_submission(
    state: &AppState,
    principal: &Principal,
    id: i64,
) -> Result<Submission, ApiError> {
    let submission = state
        .store
        .get(id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(FindmeError::SubmissionNotFound(id)))?;
    if !principal.can_modify(&submission) {
        return Err(error_response(FindmeError::Forbidden(format!(
            "submission {} belongs to another user",
            id
        ))));
    }
    Ok(submission)
}

/// Get a public submission
async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Submission>, ApiError> {
    public_submission(&state, id).await.map(Json)
}

/// Multipart part carrying submission photos
pub const IMAGES_FIELD: &str = "images";

fn invalid_field(name: &str, raw: &str) -> FindmeError {
    FindmeError::Validation(format!("invalid value for {}: {:?}", name, raw))
}

fn form_text(fields: &mut HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .remove(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn form_parsed<T: FromStr>(
    fields: &mut HashMap<String, String>,
    name: &str,
) -> FindmeResult<Option<T>> {
    form_text(fields, name)
        .map(|raw| raw.parse().map_err(|_| invalid_field(name, &raw)))
        .transpose()
}

fn form_label<T: DeserializeOwned>(
    fields: &mut HashMap<String, String>,
    name: &str,
) -> FindmeResult<Option<T>> {
    form_text(fields, name)
        .map(|raw| {
            serde_json::from_value(serde_json::Value::String(raw.clone()))
                .map_err(|_| invalid_field(name, &raw))
        })
        .transpose()
}

/// Build a submission from the text parts of a form
fn new_submission_from_form(mut fields: HashMap<String, String>) -> FindmeResult<NewSubmission> {
    let f = &mut fields;
    Ok(NewSubmission {
        title: form_text(f, "title").unwrap_or_default(),
        full_name: form_text(f, "full_name").unwrap_or_default(),
        dob: form_parsed::<NaiveDate>(f, "dob")?,
        gender: form_label(f, "gender")?,
        race: form_label(f, "race")?,
        height: form_parsed(f, "height")?,
        weight: form_parsed(f, "weight")?,
        province: form_label(f, "province")?,
        description: form_text(f, "description"),
        last_seen_address: form_text(f, "last_seen_address"),
        last_seen_place_id: form_text(f, "last_seen_place_id"),
        last_seen_lat: form_parsed(f, "last_seen_lat")?,
        last_seen_lng: form_parsed(f, "last_seen_lng")?,
    })
}

/// Create a submission in `pending` status from a multipart form.
///
/// Photos arrive as `images` parts and are stored under the `submissions`
/// directory of the mount once every field has validated.
async fn create_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let mut fields = HashMap::new();
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == IMAGES_FIELD {
            uploads.push(Upload::read_image(field).await?);
        } else {
            fields.insert(name, read_text(field).await?);
        }
    }

    let new = new_submission_from_form(fields).map_err(error_response)?;
    new.validate(uploads.len()).map_err(error_response)?;

    let mut images = Vec::with_capacity(uploads.len());
    for upload in &uploads {
        let url = upload
            .save(
                &state.submission_uploads,
                "sub",
                principal.user_id,
                state.public_base_url.as_deref(),
            )
            .await
            .map_err(error_response)?;
        images.push(url);
    }

    let submission = state
        .store
        .create(new, Some(principal.user_id), images)
        .await
        .map_err(error_response)?;
    state.submissions_changed().await;

    info!(
        submission_id = submission.id,
        user_id = principal.user_id,
        images = submission.images.len(),
        "Created submission"
    );
    Ok((StatusCode::CREATED, Json(submission)))
}

/// Update a submission owned by the caller
async fn update_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<SubmissionPatch>,
) -> Result<Json<Submission>, ApiError> {
    modifiable_submission(&state, &principal, id).await?;
    if patch.status.is_some() && !principal.is_admin() {
        return Err(error_response(FindmeError::Forbidden(
            "only admins may change the status".to_string(),
        )));
    }

    let submission = state
        .store
        .update(id, patch)
        .await
        .map_err(error_response)?;
    state.submissions_changed().await;

    info!(submission_id = id, user_id = principal.user_id, "Updated submission");
    Ok(Json(submission))
}

/// Delete a submission owned by the caller
async fn delete_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    modifiable_submission(&state, &principal, id).await?;

    if !state.store.delete(id).await.map_err(error_response)? {
        return Err(error_response(FindmeError::SubmissionNotFound(id)));
    }
    let comments = state
        .comments
        .delete_for_submission(id)
        .await
        .map_err(error_response)?;
    state.submissions_changed().await;

    info!(
        submission_id = id,
        user_id = principal.user_id,
        comments = comments,
        "Deleted submission"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Request to move a submission to a new status
#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub status: SubmissionStatus,
}

/// Change a submission's status (admin only)
async fn moderate_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ModerateRequest>,
) -> Result<Json<Submission>, ApiError> {
    let patch = SubmissionPatch {
        status: Some(req.status),
        ..SubmissionPatch::default()
    };
    let submission = state
        .store
        .update(id, patch)
        .await
        .map_err(error_response)?;
    state.submissions_changed().await;

    info!(
        submission_id = id,
        status = %req.status,
        moderator = principal.user_id,
        "Moderated submission"
    );
    Ok(Json(submission))
}

/// Dashboard aggregates (admin only)
async fn get_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SubmissionSummary>, ApiError> {
    let store = state.store.clone();
    let summary = state
        .summary_cache
        .get_or_try_insert_with((), || async move { store.summarize(Utc::now()).await })
        .await
        .map_err(error_response)?;
    Ok(Json(summary))
}

/// Largest progression an explicit `years` may request
pub const MAX_PROGRESSION_YEARS: u32 = 150;

/// Age-progression query parameters
#[derive(Debug, Default, Deserialize)]
pub struct AgeProgressionQuery {
    /// Years to simulate; defaults to the time since the case was filed
    pub years: Option<u32>,
}

/// Age-progression response
#[derive(Debug, Serialize, Deserialize)]
pub struct AgeProgressionResponse {
    pub url: String,
}

/// Resolve an age-progressed photo for a public submission
async fn get_age_progression(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<AgeProgressionQuery>,
) -> Result<Json<AgeProgressionResponse>, ApiError> {
    let submission = public_submission(&state, id).await?;
    let Some(reference) = submission.primary_image() else {
        return Err(error_response(FindmeError::NoSourceImage(id)));
    };

    let years = match query.years {
        Some(years) if years > MAX_PROGRESSION_YEARS => {
            return Err(error_response(FindmeError::Validation(format!(
                "years must be at most {}",
                MAX_PROGRESSION_YEARS
            ))));
        }
        Some(years) => years,
        None => submission
            .years_missing(Utc::now())
            .min(MAX_PROGRESSION_YEARS),
    };
    let target_age = submission
        .age_when_missing()
        .map(|age| age.saturating_add(years));

    let request = AgeProgressionRequest::new(id, Some(reference.to_string()), years)
        .with_target_age(target_age);
    let resolution = state
        .resolver
        .resolve(&request)
        .await
        .map_err(error_response)?;

    info!(
        submission_id = id,
        years = years,
        target_age = ?target_age,
        origin = ?resolution.origin,
        "Resolved age progression"
    );
    Ok(Json(AgeProgressionResponse {
        url: resolution.url,
    }))
}
