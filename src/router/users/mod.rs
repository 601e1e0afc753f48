//! Users-related HTTP API.
mod create;
mod get;
mod list;

use axum::Router;
use axum::routing::get;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /users` goes to `list`, `POST /users` to `create`.
        .route("/", get(list::handler).post(create::handler))
        // `GET /users/:ID` goes to `get`.
        .route("/{user_id}", get(get::handler))
}
