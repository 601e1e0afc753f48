//! List properties.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;

use crate::property::{ListParams, ListQuery, Property};
use crate::{AppState, ServerError};

/// Header carrying the number of matching properties.
pub const X_TOTAL_COUNT: &str = "x-total-count";

pub async fn handler(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<([(header::HeaderName, String); 2], Json<Vec<Property>>), ServerError> {
    let Query(params) = params?;
    let query = ListQuery::try_from(params)?;
    let page = state.properties.list(&query).await?;

    Ok((
        [
            (
                header::HeaderName::from_static(X_TOTAL_COUNT),
                page.total.to_string(),
            ),
            (
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                X_TOTAL_COUNT.to_owned(),
            ),
        ],
        Json(page.items),
    ))
}
