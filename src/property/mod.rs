//! Property listings.
mod query;
mod service;

pub use query::*;
pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::User;

/// Property as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub location: String,
    pub price: f64,
    /// Durable URL returned by the media host.
    pub photo: String,
    /// Owner [`User`] ID.
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

impl Property {
    /// Resolve `creator` into the owning [`User`].
    pub fn with_creator(self, creator: User) -> PropertyDetail {
        PropertyDetail {
            id: self.id,
            title: self.title,
            description: self.description,
            property_type: self.property_type,
            location: self.location,
            price: self.price,
            photo: self.photo,
            creator,
            created_at: self.created_at,
        }
    }
}

/// [`Property`] with its creator expanded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetail {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub location: String,
    pub price: f64,
    pub photo: String,
    pub creator: User,
    pub created_at: DateTime<Utc>,
}

/// Fields required to list a new property.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewProperty {
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub location: String,
    pub price: f64,
    /// Data URL, remote URL or already hosted image.
    pub photo: String,
}

/// Partial update of a property. `None` keeps the stored value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub price: Option<f64>,
    pub photo: Option<String>,
}

impl PropertyChanges {
    /// Apply changes on a stored [`Property`].
    pub fn apply(&self, property: &mut Property) {
        if let Some(title) = &self.title {
            property.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            property.description.clone_from(description);
        }
        if let Some(property_type) = &self.property_type {
            property.property_type.clone_from(property_type);
        }
        if let Some(location) = &self.location {
            property.location.clone_from(location);
        }
        if let Some(price) = self.price {
            property.price = price;
        }
        if let Some(photo) = &self.photo {
            property.photo.clone_from(photo);
        }
    }
}
