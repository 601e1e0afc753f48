//! List a new property.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::property::NewProperty;
use crate::router::{Message, Valid, number};
use crate::{AppState, ServerError};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be 1 to 255 characters long."
    ))]
    title: String,
    #[serde(default)]
    #[validate(length(
        max = 5000,
        message = "Description must not exceed 5000 characters."
    ))]
    description: String,
    #[validate(length(min = 1, message = "Property type is required."))]
    property_type: String,
    #[serde(default)]
    location: String,
    #[serde(deserialize_with = "number")]
    #[validate(range(min = 0.0, message = "Price must be positive."))]
    price: f64,
    #[serde(default)]
    photo: String,
    #[validate(email(message = "Email must be formatted."))]
    email: String,
}

/// Handler to create a property.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Message>, ServerError> {
    state
        .properties
        .create(
            NewProperty {
                title: body.title,
                description: body.description,
                property_type: body.property_type,
                location: body.location,
                price: body.price,
                photo: body.photo,
            },
            &body.email,
        )
        .await?;

    Ok(Message::new("Property created successfully"))
}
