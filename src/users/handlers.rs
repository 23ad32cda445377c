use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::{
    auth::services::AuthUser,
    state::AppState,
    users::dto::PublicUser,
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

/// Admin-only listing of all accounts.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<PublicUser>>, (axum::http::StatusCode, String)> {
    let requester = match state.users.user_by_id(user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(user_id, "token subject no longer exists");
            return Err((
                axum::http::StatusCode::UNAUTHORIZED,
                "User not found".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, user_id, "requester lookup failed");
            return Err((
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Store unavailable".into(),
            ));
        }
    };

    if !requester.is_admin {
        warn!(user_id, "non-admin requested user listing");
        return Err((
            axum::http::StatusCode::FORBIDDEN,
            "Admin access required".into(),
        ));
    }

    let users = state.users.all_users().await.map_err(|e| {
        error!(error = %e, "user listing failed");
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Store unavailable".into(),
        )
    })?;

    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}
