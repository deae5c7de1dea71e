use axum::Router;

use crate::AppState;

pub mod health;
pub mod locations;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router())
        .merge(locations::router());

    Router::new().nest("/api", api).with_state(state)
}
