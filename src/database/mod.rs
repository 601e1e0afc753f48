//! Document store access: `users` and `properties` collections.
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::{Result, ServerError};
use crate::property::{ListQuery, Page, Property, PropertyChanges};
use crate::user::User;

/// Port for persistence of users and properties.
#[async_trait]
pub trait Store: Send + Sync {
    /// Find a user using `id` field.
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Find a user using its normalized `email`.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a new user.
    ///
    /// Fails with [`ServerError::Conflict`] when the email is already taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Every user, oldest first.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Find a property using `id` field.
    async fn find_property(&self, id: &str) -> Result<Option<Property>>;

    /// Find properties by IDs, keeping the order of `ids`.
    async fn find_properties(&self, ids: &[String]) -> Result<Vec<Property>>;

    /// Filtered, sorted and windowed listing.
    ///
    /// `total` counts every property matching the filter.
    async fn list_properties(&self, query: &ListQuery) -> Result<Page<Property>>;

    /// Apply a partial update. Returns `false` if no property has `id`.
    async fn update_property(
        &self,
        id: &str,
        changes: &PropertyChanges,
    ) -> Result<bool>;

    /// Apply every write of `unit` atomically: all of them or none.
    async fn with_transaction(&self, unit: UnitOfWork) -> Result<()>;
}

/// A write that is part of a [`UnitOfWork`].
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    InsertProperty(Property),
    DeleteProperty { id: String },
    /// Append a property to the owned-set of a user.
    LinkProperty { user_id: String, property_id: String },
    /// Remove a property from the owned-set of a user.
    UnlinkProperty { user_id: String, property_id: String },
}

impl Write {
    /// Error returned when this write matched nothing.
    pub fn not_applied(&self) -> ServerError {
        match self {
            Write::InsertProperty(property) => ServerError::InvariantViolation(
                format!("property {} was not inserted", property.id),
            ),
            Write::DeleteProperty { .. } => ServerError::NotFound("Property"),
            Write::LinkProperty { user_id, .. }
            | Write::UnlinkProperty { user_id, .. } => {
                ServerError::InvariantViolation(format!(
                    "owner {user_id} does not exist"
                ))
            },
        }
    }
}

/// Group of writes committed together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitOfWork {
    writes: Vec<Write>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_property(mut self, property: Property) -> Self {
        self.writes.push(Write::InsertProperty(property));
        self
    }

    pub fn delete_property(mut self, id: impl Into<String>) -> Self {
        self.writes.push(Write::DeleteProperty { id: id.into() });
        self
    }

    pub fn link(
        mut self,
        user_id: impl Into<String>,
        property_id: impl Into<String>,
    ) -> Self {
        self.writes.push(Write::LinkProperty {
            user_id: user_id.into(),
            property_id: property_id.into(),
        });
        self
    }

    pub fn unlink(
        mut self,
        user_id: impl Into<String>,
        property_id: impl Into<String>,
    ) -> Self {
        self.writes.push(Write::UnlinkProperty {
            user_id: user_id.into(),
            property_id: property_id.into(),
        });
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}
