//! Properties-related HTTP API.
mod create;
mod delete;
mod get;
mod list;
mod update;

use axum::Router;
use axum::routing::get;

use crate::AppState;

pub use list::X_TOTAL_COUNT;

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /properties` goes to `list`, `POST /properties` to `create`.
        .route("/", get(list::handler).post(create::handler))
        // `GET|PATCH|PUT|DELETE /properties/:ID`.
        .route(
            "/{id}",
            get(get::handler)
                .patch(update::handler)
                .put(update::handler)
                .delete(delete::handler),
        )
}
