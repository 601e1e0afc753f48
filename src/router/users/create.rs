//! Upsert a user on login.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::router::Valid;
use crate::user::User;
use crate::{AppState, ServerError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be 1 to 100 characters long."
    ))]
    name: String,
    #[validate(email(message = "Email must be formatted."))]
    email: String,
    #[serde(default)]
    avatar: String,
}

/// Return the user owning `email`, creating it if needed.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<User>, ServerError> {
    let user = state
        .users
        .find_or_create_by_email(&body.name, &body.email, &body.avatar)
        .await?;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::*;

    #[tokio::test]
    async fn test_create_user_handler() {
        let (state, ..) = test_state();
        let body = json!({
            "name": "Ana",
            "email": "Ana@X.com",
            "avatar": "https://avatar.test/ana.png",
        })
        .to_string();

        let mut ids = Vec::new();
        for _ in 0..2 {
            let response = make_request(
                app(state.clone()),
                Method::POST,
                "/api/v1/users",
                body.clone(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);

            let body = response.into_body().collect().await.unwrap().to_bytes();
            let user: User = serde_json::from_slice(&body).unwrap();
            assert_eq!(user.email, "ana@x.com");
            ids.push(user.id);
        }

        assert_eq!(ids[0], ids[1]);
        assert_eq!(state.users.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_user_invalid_email() {
        let (state, ..) = test_state();

        let response = make_request(
            app(state),
            Method::POST,
            "/api/v1/users",
            json!({ "name": "Ana", "email": "ana" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["errors"][0]["field"], "email");
    }
}
