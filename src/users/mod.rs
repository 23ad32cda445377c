use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

#[cfg(test)]
pub(crate) mod mock;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
