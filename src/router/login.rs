//! Sign in with an identity provider credential.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::router::Valid;
use crate::user::User;
use crate::{AppState, ServerError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    /// Signed ID token.
    #[validate(length(min = 1, message = "Credential is required."))]
    credential: String,
}

/// Handler to login.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<User>, ServerError> {
    Ok(Json(state.users.login(&body.credential).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::identity::tests::{CLIENT_ID, credential};
    use crate::*;

    #[tokio::test]
    async fn test_login_handler() {
        let (state, ..) = test_state();
        let token = credential("ana@x.com", CLIENT_ID, 3600, true);

        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/api/v1/login",
            json!({ "credential": token }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let user: User = serde_json::from_slice(&body).unwrap();
        assert_eq!(user.email, "ana@x.com");
        assert_eq!(user.name, "Ana");
    }

    #[tokio::test]
    async fn test_login_bad_credential() {
        let (state, ..) = test_state();
        let token = credential("ana@x.com", CLIENT_ID, -3600, true);

        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/api/v1/login",
            json!({ "credential": token }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(state.users.list_all().await.unwrap().is_empty());
    }
}
