use axum::Json;
use axum::extract::{Path, State};

use crate::property::PropertyDetail;
use crate::{AppState, ServerError};

pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PropertyDetail>, ServerError> {
    Ok(Json(state.properties.get_by_id(&id).await?))
}
