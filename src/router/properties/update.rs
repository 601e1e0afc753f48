//! Update a property.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::property::PropertyChanges;
use crate::router::{Message, Valid, optional_number};
use crate::{AppState, ServerError};

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be 1 to 255 characters long."
    ))]
    title: Option<String>,
    #[validate(length(
        max = 5000,
        message = "Description must not exceed 5000 characters."
    ))]
    description: Option<String>,
    #[validate(length(min = 1, message = "Property type must not be empty."))]
    property_type: Option<String>,
    location: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    #[validate(range(min = 0.0, message = "Price must be positive."))]
    price: Option<f64>,
    photo: Option<String>,
}

/// Handler to update a property, `PATCH` and `PUT` alike.
pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Valid(body): Valid<Body>,
) -> Result<Json<Message>, ServerError> {
    state
        .properties
        .update(
            &id,
            PropertyChanges {
                title: body.title,
                description: body.description,
                property_type: body.property_type,
                location: body.location,
                price: body.price,
                photo: body.photo,
            },
        )
        .await?;

    Ok(Message::new("Property updated successfully"))
}
