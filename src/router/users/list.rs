use axum::Json;
use axum::extract::State;

use crate::user::UserSummary;
use crate::{AppState, ServerError};

pub async fn handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ServerError> {
    Ok(Json(state.users.list_all().await?))
}
