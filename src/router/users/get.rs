//! Agent profile.

use axum::Json;
use axum::extract::{Path, State};

use crate::user::UserProfile;
use crate::{AppState, ServerError};

pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, ServerError> {
    Ok(Json(state.users.get_by_id(&user_id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    use super::*;
    use crate::property::NewProperty;
    use crate::*;

    #[tokio::test]
    async fn test_get_user_handler() {
        let (state, ..) = test_state();
        let user = state
            .users
            .find_or_create_by_email("Ana", "ana@x.com", "")
            .await
            .unwrap();
        let property = state
            .properties
            .create(
                NewProperty {
                    title: "Loft".into(),
                    property_type: "apartment".into(),
                    photo: "https://example.com/loft.jpg".into(),
                    ..Default::default()
                },
                "ana@x.com",
            )
            .await
            .unwrap();

        let path = format!("/api/v1/users/{}", user.id);
        let response =
            make_request(app(state.clone()), Method::GET, &path, String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(raw["_id"], user.id.as_str());
        assert_eq!(raw["allProperties"][0]["title"], "Loft");
        assert_eq!(raw["allProperties"][0]["_id"], property.id.as_str());
        assert!(raw.get("properties").is_none());

        let body: UserProfile = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.all_properties, vec![property]);

        let response = make_request(
            app(state),
            Method::GET,
            "/api/v1/users/unknown",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
