//! Comment handlers
//!
//! Anyone may read approved comments. Signed-in users who are not admins may
//! post; new comments wait in `pending` until an admin approves or rejects them.

use crate::auth::AuthUser;
use crate::error::{error_response, ApiError};
use crate::rest::public_submission;
use crate::state::AppState;
use crate::uploads::{multipart_error, read_text, Upload};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use findme_core::{Comment, CommentStatus, FindmeError, NewComment};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Multipart part carrying the optional comment image
pub const IMAGE_FIELD: &str = "image";

/// Public and signed-in comment routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/mine", get(list_my_comments))
}

/// Moderation routes, mounted behind the admin guard
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/comments/admin", get(list_admin_comments))
        .route("/comments/:id/approve", post(approve_comment))
        .route("/comments/:id/reject", post(reject_comment))
}

/// Fill in the author display name from the user store
async fn fill_author(state: &AppState, comment: &mut Comment) {
    if let Some(user_id) = comment.user_id {
        if let Ok(Some(user)) = state.users.get(user_id).await {
            comment.author_name = Some(user.display_name());
        }
    }
}

async fn with_authors(state: &AppState, mut comments: Vec<Comment>) -> Vec<Comment> {
    for comment in &mut comments {
        fill_author(state, comment).await;
    }
    comments
}

#[derive(Debug, Deserialize)]
pub struct SubmissionCommentsQuery {
    pub submission_id: i64,
}

/// Approved comments on a submission, newest first
async fn list_comments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubmissionCommentsQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = state
        .comments
        .list_for_submission(query.submission_id, Some(CommentStatus::Approved))
        .await
        .map_err(error_response)?;
    Ok(Json(with_authors(&state, comments).await))
}

/// Post a comment from a multipart form with `submission_id`, `body` and an optional `image`
async fn create_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    if principal.is_admin() {
        return Err(error_response(FindmeError::Forbidden(
            "admins cannot post public comments".to_string(),
        )));
    }

    let mut submission_id = None;
    let mut body = String::new();
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("submission_id") => {
                let raw = read_text(field).await?;
                let id = raw.trim().parse::<i64>().map_err(|_| {
                    error_response(FindmeError::Validation(format!(
                        "invalid submission_id: {:?}",
                        raw
                    )))
                })?;
                submission_id = Some(id);
            }
            Some("body") => body = read_text(field).await?,
            Some(IMAGE_FIELD) if field.file_name().is_some_and(|n| !n.is_empty()) => {
                image = Some(Upload::read_image(field).await?);
            }
            _ => {}
        }
    }

    let Some(submission_id) = submission_id else {
        return Err(error_response(FindmeError::Validation(
            "submission_id is required".to_string(),
        )));
    };
    let mut new = NewComment {
        submission_id,
        body: body.trim().to_string(),
        image_url: None,
    };
    new.validate().map_err(error_response)?;
    public_submission(&state, submission_id).await?;

    if let Some(image) = &image {
        let url = image
            .save(
                &state.comment_uploads,
                "c",
                principal.user_id,
                state.public_base_url.as_deref(),
            )
            .await
            .map_err(error_response)?;
        new.image_url = Some(url);
    }

    let mut comment = state
        .comments
        .create(new, principal.user_id)
        .await
        .map_err(error_response)?;

    info!(
        comment_id = comment.id,
        submission_id = submission_id,
        user_id = principal.user_id,
        "Created comment"
    );
    fill_author(&state, &mut comment).await;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// The caller's own comments in every status
async fn list_my_comments(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = state
        .comments
        .list_by_user(principal.user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(with_authors(&state, comments).await))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminCommentsQuery {
    pub status: Option<CommentStatus>,
}

/// Every comment, optionally filtered by status (admin only)
async fn list_admin_comments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminCommentsQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = state
        .comments
        .list_all(query.status)
        .await
        .map_err(error_response)?;
    Ok(Json(with_authors(&state, comments).await))
}

/// Approve a comment, clearing any earlier rejection reason (admin only)
async fn approve_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    let mut comment = state
        .comments
        .moderate(id, CommentStatus::Approved, None)
        .await
        .map_err(error_response)?;
    info!(comment_id = id, moderator = principal.user_id, "Approved comment");
    fill_author(&state, &mut comment).await;
    Ok(Json(comment))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// Reject a comment with an optional reason (admin only)
async fn reject_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Comment>, ApiError> {
    let reason = req
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let mut comment = state
        .comments
        .moderate(id, CommentStatus::Rejected, reason)
        .await
        .map_err(error_response)?;
    info!(comment_id = id, moderator = principal.user_id, "Rejected comment");
    fill_author(&state, &mut comment).await;
    Ok(Json(comment))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use findme_store::CommentStore;
    use serde_json::json;

    fn comment_form(submission_id: &'static str, body: &'static str) -> Vec<Part<'static>> {
        vec![
            Part::Text("submission_id", submission_id),
            Part::Text("body", body),
        ]
    }

    #[tokio::test]
    async fn test_comment_moderation_flow() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, created) = send_json(
            &app,
            multipart("/comments", Some(OWNER), comment_form("1", "Seen near Park Station")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["author_name"], "Thandi Mokoena");
        let first = created["id"].as_i64().unwrap();

        let (_, second) = send_json(
            &app,
            multipart("/comments", Some(OTHER), comment_form("1", "Spam")),
        )
        .await;
        let second = second["id"].as_i64().unwrap();

        // Nothing is public until approved
        let (status, public) = send_json(&app, request("GET", "/comments?submission_id=1", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(public.as_array().unwrap().is_empty());

        let (_, pending) = send_json(&app, request("GET", "/comments/admin?status=pending", Some(ADMIN), None)).await;
        assert_eq!(pending.as_array().unwrap().len(), 2);

        let approve = format!("/comments/{}/approve", first);
        let (status, approved) = send_json(&app, request("POST", &approve, Some(ADMIN), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "approved");

        let reject = format!("/comments/{}/reject", second);
        let (status, rejected) = send_json(
            &app,
            request("POST", &reject, Some(ADMIN), Some(json!({ "reason": "off topic" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["rejection_reason"], "off topic");

        let (_, public) = send_json(&app, request("GET", "/comments?submission_id=1", None, None)).await;
        let public = public.as_array().unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0]["id"], first);

        // Approving a rejected comment clears the reason
        let approve = format!("/comments/{}/approve", second);
        let (_, reapproved) = send_json(&app, request("POST", &approve, Some(ADMIN), None)).await;
        assert!(reapproved["rejection_reason"].is_null());

        let (_, mine) = send_json(&app, request("GET", "/comments/mine", Some(OTHER), None)).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        assert_eq!(mine[0]["author_name"], "user11@findme.example");
    }

    #[tokio::test]
    async fn test_comment_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, _) = send(&app, multipart("/comments", None, comment_form("1", "hi"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, multipart("/comments", Some(ADMIN), comment_form("1", "hi"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, request("GET", "/comments/admin", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, request("POST", "/comments/1/approve", Some(OTHER), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, request("POST", "/comments/99/approve", Some(ADMIN), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, request("GET", "/comments/admin?status=unknown", Some(ADMIN), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_comment_validation() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        // Pending and missing submissions take no comments
        for id in ["2", "99"] {
            let (status, _) = send(&app, multipart("/comments", Some(OWNER), comment_form(id, "hi"))).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _) = send(&app, multipart("/comments", Some(OWNER), comment_form("1", "  "))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, multipart("/comments", Some(OWNER), comment_form("x", "hi"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            multipart("/comments", Some(OWNER), vec![Part::Text("body", "hi")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut form = comment_form("1", "hi");
        form.push(Part::File {
            name: "image",
            file_name: "clip.mp4",
            content_type: "video/mp4",
            bytes: vec![0; 16],
        });
        let (status, _) = send(&app, multipart("/comments", Some(OWNER), form)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_comment_image_upload() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let mut form = comment_form("1", "Photo from the mall");
        form.push(Part::image("image", "mall.png"));
        let (status, created) = send_json(&app, multipart("/comments", Some(OWNER), form)).await;
        assert_eq!(status, StatusCode::CREATED);

        let url = created["image_url"].as_str().unwrap();
        assert!(url.starts_with("/files/comments/c_10_"));
        assert!(url.ends_with(".png"));
        let (status, bytes) = send(&app, request("GET", url, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, png());
    }

    #[tokio::test]
    async fn test_deleting_submission_drops_comments() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let app = crate::rest::create_router(state.clone());

        send(&app, multipart("/comments", Some(OTHER), comment_form("1", "a"))).await;
        send(&app, multipart("/comments", Some(OTHER), comment_form("3", "b"))).await;

        let (status, _) = send(&app, request("DELETE", "/submissions/1", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let remaining = state.comments.list_all(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].submission_id, 3);
    }
}
