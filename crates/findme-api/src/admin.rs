//! Account administration handlers, mounted behind the admin guard

use crate::auth::AuthUser;
use crate::error::{error_response, ApiError};
use crate::rest::ListQuery;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, patch, put},
    Router,
};
use findme_core::{AdminUserUpdate, Role, RoleInfo, User};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", patch(update_user))
        .route("/admin/users/:id/role", put(set_user_role))
        .route("/admin/roles", get(list_roles))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .users
        .list(query.page())
        .await
        .map_err(error_response)?;
    Ok(Json(users))
}

async fn list_roles() -> Json<Vec<RoleInfo>> {
    Json(Role::ALL.into_iter().map(RoleInfo::from).collect())
}

/// Activate, deactivate, promote or demote an account
async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<AdminUserUpdate>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .users
        .update(id, update)
        .await
        .map_err(error_response)?;
    info!(
        user_id = id,
        is_active = user.is_active,
        admin = user.principal().is_admin(),
        by = principal.user_id,
        "Updated user"
    );
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role_name: String,
}

/// Replace an account's role by name
async fn set_user_role(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<User>, ApiError> {
    let role: Role = req.role_name.trim().parse().map_err(error_response)?;
    let user = state
        .users
        .set_role(id, role)
        .await
        .map_err(error_response)?;
    info!(user_id = id, role = %role, by = principal.user_id, "Assigned role");
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_admin_routes_require_admin() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        for (method, uri) in [
            ("GET", "/admin/users"),
            ("GET", "/admin/roles"),
            ("PATCH", "/admin/users/10"),
            ("PUT", "/admin/users/10/role"),
        ] {
            let (status, _) = send(&app, request(method, uri, None, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
            let (status, _) = send(&app, request(method, uri, Some(OWNER), None)).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn test_list_users_and_roles() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, users) = send_json(&app, request("GET", "/admin/users", Some(ADMIN), None)).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = users
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 10, 11, 12]);
        assert_eq!(users[0]["roles"][0]["name"], "admin");
        assert_eq!(users[3]["is_active"], false);

        let (_, page) = send_json(&app, request("GET", "/admin/users?page=2&limit=3", Some(ADMIN), None)).await;
        assert_eq!(page[0]["id"], 12);

        let (status, roles) = send_json(&app, request("GET", "/admin/roles", Some(ADMIN), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(roles, json!([{ "id": 1, "name": "user" }, { "id": 2, "name": "admin" }]));
    }

    #[tokio::test]
    async fn test_promote_and_deactivate() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let promote = request("PATCH", "/admin/users/10", Some(ADMIN), Some(json!({ "is_admin": true })));
        let (status, user) = send_json(&app, promote).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["roles"], json!([{ "id": 2, "name": "admin" }]));

        // The new role applies to the owner's next request
        let (status, _) = send(&app, request("GET", "/submissions/summary", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::OK);

        let deactivate = request("PATCH", "/admin/users/11", Some(ADMIN), Some(json!({ "is_active": false })));
        let (status, user) = send_json(&app, deactivate).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["is_active"], false);
        assert_eq!(user["roles"][0]["name"], "user");
        let (status, _) = send(&app, request("GET", "/submissions/mine", Some(OTHER), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let missing = request("PATCH", "/admin/users/404", Some(ADMIN), Some(json!({ "is_active": true })));
        assert_eq!(send(&app, missing).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_role_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let set = |id: i64, name: &str| {
            request(
                "PUT",
                &format!("/admin/users/{}/role", id),
                Some(ADMIN),
                Some(json!({ "role_name": name })),
            )
        };

        let (status, user) = send_json(&app, set(11, "admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["roles"][0]["name"], "admin");
        assert_eq!(user["roles"].as_array().unwrap().len(), 1);

        let (status, user) = send_json(&app, set(11, "user")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["roles"][0]["name"], "user");

        assert_eq!(send(&app, set(11, "superuser")).await.0, StatusCode::BAD_REQUEST);
        assert_eq!(send(&app, set(404, "user")).await.0, StatusCode::NOT_FOUND);
    }
}
