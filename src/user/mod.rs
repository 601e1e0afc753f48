mod service;

pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::property::Property;

/// User (agent) as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    /// Owned properties, in creation order.
    pub all_properties: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new [`User`] with an empty owned-set.
    pub fn new(
        name: impl Into<String>,
        email: impl AsRef<str>,
        avatar: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: normalize_email(email.as_ref()),
            avatar: avatar.into(),
            all_properties: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether `property_id` belongs to this user.
    pub fn owns(&self, property_id: &str) -> bool {
        self.all_properties.iter().any(|id| id == property_id)
    }
}

/// Emails are compared trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// [`User`] with its owned properties resolved in place of their IDs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub all_properties: Vec<Property>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user: User, properties: Vec<Property>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
            all_properties: properties,
            created_at: user.created_at,
        }
    }
}

/// [`User`] as listed on agents directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub property_count: usize,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            property_count: user.all_properties.len(),
            user,
        }
    }
}
