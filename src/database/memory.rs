//! In-process store, used when no PostgreSQL instance is configured.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::database::{Store, UnitOfWork, Write};
use crate::error::{Result, ServerError};
use crate::property::{ListQuery, Page, Property, PropertyChanges};
use crate::user::User;

#[derive(Clone, Debug, Default)]
struct Collections {
    users: Vec<User>,
    properties: Vec<Property>,
}

impl Collections {
    fn user_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// Returns `false` when nothing matched, like an `UPDATE` touching no row.
    fn apply(&mut self, write: &Write) -> Result<bool> {
        let applied = match write {
            Write::InsertProperty(property) => {
                if self.properties.iter().any(|p| p.id == property.id) {
                    return Err(ServerError::Conflict(format!(
                        "property {}",
                        property.id
                    )));
                }
                if !self.users.iter().any(|u| u.id == property.creator) {
                    return Ok(false);
                }
                self.properties.push(property.clone());
                true
            },
            Write::DeleteProperty { id } => {
                let before = self.properties.len();
                self.properties.retain(|p| &p.id != id);
                self.properties.len() != before
            },
            Write::LinkProperty {
                user_id,
                property_id,
            } => match self.user_mut(user_id) {
                Some(user) => {
                    if !user.owns(property_id) {
                        user.all_properties.push(property_id.clone());
                    }
                    true
                },
                None => false,
            },
            Write::UnlinkProperty {
                user_id,
                property_id,
            } => match self.user_mut(user_id) {
                Some(user) => {
                    user.all_properties.retain(|id| id != property_id);
                    true
                },
                None => false,
            },
        };

        Ok(applied)
    }
}

/// [`Store`] keeping both collections in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    /// Create a new empty [`MemoryStore`].
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(ServerError::Conflict(format!(
                "user with email {}",
                user.email
            )));
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn find_property(&self, id: &str) -> Result<Option<Property>> {
        let inner = self.inner.read().await;
        Ok(inner.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn find_properties(&self, ids: &[String]) -> Result<Vec<Property>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.properties.iter().find(|p| &p.id == id))
            .cloned()
            .collect())
    }

    async fn list_properties(&self, query: &ListQuery) -> Result<Page<Property>> {
        let inner = self.inner.read().await;
        let mut matching: Vec<&Property> = inner
            .properties
            .iter()
            .filter(|p| query.filter.matches(p))
            .collect();
        let total = matching.len() as u64;

        if let Some(sort) = &query.sort {
            matching.sort_by(|a, b| sort.compare(a, b));
        }

        let start = usize::try_from(query.range.start()).unwrap_or(usize::MAX);
        let limit = query
            .range
            .limit()
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(Page {
            items: matching
                .into_iter()
                .skip(start)
                .take(limit)
                .cloned()
                .collect(),
            total,
        })
    }

    async fn update_property(
        &self,
        id: &str,
        changes: &PropertyChanges,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.properties.iter_mut().find(|p| p.id == id) {
            Some(property) => {
                changes.apply(property);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn with_transaction(&self, unit: UnitOfWork) -> Result<()> {
        let mut inner = self.inner.write().await;

        // Writes go to a copy, published only once every write succeeded.
        let mut staged = inner.clone();
        for write in unit.writes() {
            if !staged.apply(write)? {
                return Err(write.not_applied());
            }
        }

        *inner = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::property::{Direction, PropertyFilter, Range, SortField};

    fn property(id: &str, title: &str, kind: &str, price: f64) -> Property {
        Property {
            id: id.into(),
            title: title.into(),
            description: String::default(),
            property_type: kind.into(),
            location: "Lisbon".into(),
            price,
            photo: format!("https://media.test/{id}.webp"),
            creator: "owner".into(),
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let mut owner = User::new("Owner", "owner@x.com", "");
        owner.id = "owner".into();
        store.insert_user(&owner).await.unwrap();

        let mut unit = UnitOfWork::new();
        for p in [
            property("1", "Lakeview Cottage", "villa", 300.0),
            property("2", "BLUE LAKE", "apartment", 100.0),
            property("3", "Riverside", "villa", 200.0),
            property("4", "Hilltop", "villa", 400.0),
        ] {
            let id = p.id.clone();
            unit = unit.insert_property(p).link("owner", id);
        }
        store.with_transaction(unit).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_windows() {
        let store = seeded().await;

        let page = store
            .list_properties(
                &ListQuery::default()
                    .filter(PropertyFilter {
                        property_type: Some("villa".into()),
                        title_contains: None,
                    })
                    .sort(SortField::Price, Direction::Desc)
                    .range(Range::new(1, Some(2)).unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "1");
    }

    #[tokio::test]
    async fn test_failed_unit_leaves_no_trace() {
        let store = seeded().await;

        let err = store
            .with_transaction(
                UnitOfWork::new()
                    .insert_property(property("5", "Orphan", "loft", 1.0))
                    .link("ghost", "5"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::InvariantViolation(_)));
        assert!(store.find_property("5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let store = seeded().await;
        let err = store
            .insert_user(&User::new("Again", "owner@x.com", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Conflict(_)));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }
}
