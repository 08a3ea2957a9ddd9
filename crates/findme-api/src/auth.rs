//! Bearer-token authentication

use crate::error::{error_response, ApiError};
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use findme_core::{AuthConfig, FindmeError, FindmeResult, Principal, Role};
use findme_store::UserStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves a bearer token to a principal
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `None` when the token is unknown
    async fn authenticate(&self, token: &str) -> Option<Principal>;
}

/// Authenticator mapping configured tokens onto accounts in the user store.
///
/// A token only authenticates while its account exists and is active, so
/// deactivating a user or changing their role takes effect on the next request.
pub struct TokenAuthenticator {
    tokens: HashMap<String, i64>,
    users: Arc<dyn UserStore>,
}

impl TokenAuthenticator {
    pub fn new(config: &AuthConfig, users: Arc<dyn UserStore>) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|grant| (grant.token.clone(), grant.user_id))
            .collect();
        Self { tokens, users }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Option<Principal> {
        let user_id = *self.tokens.get(token)?;
        match self.users.get(user_id).await {
            Ok(Some(user)) if user.is_active => Some(user.principal()),
            Ok(Some(_)) => {
                debug!(user_id, "Token belongs to an inactive account");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, error = %e, "User lookup failed");
                None
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer ...` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn authenticate(headers: &HeaderMap, authenticator: &dyn Authenticator) -> FindmeResult<Principal> {
    let token = bearer_token(headers)
        .ok_or_else(|| FindmeError::Unauthorized("missing bearer token".to_string()))?;
    match authenticator.authenticate(token).await {
        Some(principal) => {
            debug!(user_id = principal.user_id, "Authenticated request");
            Ok(principal)
        }
        None => Err(FindmeError::Unauthorized("invalid token".to_string())),
    }
}

/// Authenticated caller, rejected with 401 when absent or unknown
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(AuthUser(principal.clone()));
        }
        authenticate(&parts.headers, state.authenticator.as_ref())
            .await
            .map(AuthUser)
            .map_err(error_response)
    }
}

/// Middleware guarding admin-only routes
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(request.headers(), state.authenticator.as_ref())
        .await
        .map_err(error_response)?;
    if let Err(e) = principal.require_any(&[Role::Admin]) {
        warn!(user_id = principal.user_id, path = %request.uri().path(), "Admin route denied");
        return Err(error_response(e));
    }
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
