use axum::Json;
use axum::extract::{Path, State};

use crate::router::Message;
use crate::{AppState, ServerError};

pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ServerError> {
    state.properties.delete(&id).await?;
    Ok(Message::new("Property deleted successfully"))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    use super::*;
    use crate::property::NewProperty;
    use crate::*;

    #[tokio::test]
    async fn test_delete_handler() {
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
                    price: 500_000.0,
                    photo: "https://example.com/loft.jpg".into(),
                    ..Default::default()
                },
                "ana@x.com",
            )
            .await
            .unwrap();

        let path = format!("/api/v1/properties/{}", property.id);
        let response =
            make_request(app(state.clone()), Method::DELETE, &path, String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Message = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.message, "Property deleted successfully");

        let profile = state.users.get_by_id(&user.id).await.unwrap();
        assert!(profile.all_properties.is_empty());

        let response =
            make_request(app(state), Method::DELETE, &path, String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
