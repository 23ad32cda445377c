use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, Credentials, RefreshRequest, RegisterRequest},
        password::{hash_password, verify_password},
        services::{is_valid_email, AuthUser, JwtKeys},
    },
    state::AppState,
    users::{dto::PublicUser, repo::UserStore, repo_types::NewUser},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", post(authenticate))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn invalid_credentials() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
}

/// `POST /auth`. Takes the raw body so a malformed payload is rejected here
/// without touching the store. Bad JSON, unknown email, store failure and
/// password mismatch all map to the same 401; nothing internal reaches the
/// client.
#[instrument(skip(state, body))]
pub async fn authenticate(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let creds: Credentials = match serde_json::from_str(&body) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "credential payload is not valid JSON");
            return Err(invalid_credentials());
        }
    };

    let email = creds.email.trim().to_lowercase();

    let user = match state.users.user_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %email, "authenticate unknown email");
            return Err(invalid_credentials());
        }
        Err(e) => {
            error!(error = %e, "authenticate user lookup failed");
            return Err(invalid_credentials());
        }
    };

    let ok = match verify_password(&creds.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = user.id, "verify_password failed");
            return Err(invalid_credentials());
        }
    };

    if !ok {
        warn!(user_id = user.id, "authenticate password mismatch");
        return Err(invalid_credentials());
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id).map_err(internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(internal)?;

    info!(user_id = user.id, "user authenticated");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    // Ensure email is not taken
    if let Ok(Some(_)) = state.users.user_by_email(&payload.email).await {
        warn!(email = %payload.email, "email already registered");
        return Err((StatusCode::CONFLICT, "Email already registered".into()));
    }

    let hash = hash_password(&payload.password).map_err(internal)?;

    let user = state
        .users
        .insert_user(NewUser {
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            email: payload.email.clone(),
            password_hash: hash,
            is_admin: false,
        })
        .await
        .map_err(internal)?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id).map_err(internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(internal)?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
    })?;

    let user = match state.users.user_by_id(claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(user_id = claims.sub, "refresh for missing user");
            return Err((StatusCode::UNAUTHORIZED, "User not found".into()));
        }
        Err(e) => return Err(internal(e)),
    };

    // Issue new pair
    let access_token = keys.sign_access(user.id).map_err(internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(internal)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match state.users.user_by_id(user_id).await {
        Ok(Some(user)) => Ok(Json(PublicUser::from(user))),
        Ok(None) => {
            warn!(user_id, "token subject no longer exists");
            Err((StatusCode::UNAUTHORIZED, "User not found".into()))
        }
        Err(e) => Err(internal(e)),
    }
}


#[cfg(test)]
mod register_tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::users::mock::{test_user, MockUserStore};

    async fn post_register(store: Arc<MockUserStore>, body: &str) -> StatusCode {
        let state = AppState::fake_with(store);
        let app = crate::auth::router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/register")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn register_creates_account() {
        let store = MockUserStore::with_user(None);
        let status = post_register(
            store,
            r#"{"first_name":"New","last_name":"User","email":"new@example.com","password":"long-enough-pw"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let store = MockUserStore::with_user(None);
        let status = post_register(
            store,
            r#"{"first_name":"New","last_name":"User","email":"not-an-email","password":"long-enough-pw"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let store = MockUserStore::with_user(None);
        let status = post_register(
            store,
            r#"{"first_name":"New","last_name":"User","email":"new@example.com","password":"short"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_taken_email() {
        let store = MockUserStore::with_user(Some(test_user(1, "new@example.com", "x", false)));
        let status = post_register(
            store,
            r#"{"first_name":"New","last_name":"User","email":"new@example.com","password":"long-enough-pw"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
