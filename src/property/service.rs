use std::sync::Arc;

use chrono::Utc;

use crate::database::{Store, UnitOfWork};
use crate::error::{Result, ServerError};
use crate::media::{Image, MediaHost};
use crate::property::{
    ListQuery, NewProperty, Page, Property, PropertyChanges, PropertyDetail,
};
use crate::user::normalize_email;

/// Property manager.
#[derive(Clone)]
pub struct PropertyService {
    store: Arc<dyn Store>,
    media: Arc<dyn MediaHost>,
}

fn check_price(price: f64) -> Result<()> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err(ServerError::ValidationFailure(
            "price must be a non-negative number".into(),
        ))
    }
}

impl PropertyService {
    /// Create a new [`PropertyService`].
    pub fn new(store: Arc<dyn Store>, media: Arc<dyn MediaHost>) -> Self {
        Self { store, media }
    }

    /// Filtered, sorted and paginated listing.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<Property>> {
        self.store.list_properties(query).await
    }

    /// Find a property and resolve its creator.
    pub async fn get_by_id(&self, id: &str) -> Result<PropertyDetail> {
        let property = self
            .store
            .find_property(id)
            .await?
            .ok_or(ServerError::NotFound("Property"))?;

        let creator = self
            .store
            .find_user_by_id(&property.creator)
            .await?
            .ok_or_else(|| {
                ServerError::InvariantViolation(format!(
                    "creator {} of property {} does not exist",
                    property.creator, property.id
                ))
            })?;

        Ok(property.with_creator(creator))
    }

    /// List a new property on behalf of the user owning `email`.
    ///
    /// The photo is uploaded first, then the property is inserted and linked
    /// to its creator in a single unit of work.
    pub async fn create(
        &self,
        input: NewProperty,
        email: &str,
    ) -> Result<Property> {
        let creator = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or(ServerError::NotFound("User"))?;

        check_price(input.price)?;
        let image = Image::parse(&input.photo)?;
        let photo = self.media.upload(image).await?;

        let property = Property {
            id: uuid::Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            property_type: input.property_type,
            location: input.location,
            price: input.price,
            photo,
            creator: creator.id.clone(),
            created_at: Utc::now(),
        };

        self.store
            .with_transaction(
                UnitOfWork::new()
                    .insert_property(property.clone())
                    .link(&creator.id, &property.id),
            )
            .await?;

        tracing::info!(property_id = %property.id, creator = %creator.id, "property created");
        Ok(property)
    }

    /// Apply a partial update.
    ///
    /// A new photo is uploaded unless it is empty or already the stored URL.
    pub async fn update(
        &self,
        id: &str,
        mut changes: PropertyChanges,
    ) -> Result<()> {
        let current = self
            .store
            .find_property(id)
            .await?
            .ok_or(ServerError::NotFound("Property"))?;

        if let Some(price) = changes.price {
            check_price(price)?;
        }

        changes.photo = match changes.photo.take() {
            Some(photo) if !photo.trim().is_empty() && photo != current.photo => {
                Some(self.media.upload(Image::parse(&photo)?).await?)
            },
            _ => None,
        };

        if !self.store.update_property(id, &changes).await? {
            return Err(ServerError::NotFound("Property"));
        }

        tracing::info!(property_id = %id, "property updated");
        Ok(())
    }

    /// Remove a property and unlink it from its creator atomically.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let property = self
            .store
            .find_property(id)
            .await?
            .ok_or(ServerError::NotFound("Property"))?;

        let creator = self
            .store
            .find_user_by_id(&property.creator)
            .await?
            .ok_or_else(|| {
                ServerError::InvariantViolation(format!(
                    "creator {} of property {} does not exist",
                    property.creator, property.id
                ))
            })?;

        self.store
            .with_transaction(
                UnitOfWork::new()
                    .delete_property(&property.id)
                    .unlink(&creator.id, &property.id),
            )
            .await?;

        tracing::info!(property_id = %id, creator = %creator.id, "property deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::media::tests::FakeHost;
    use crate::property::{PropertyFilter, Range};
    use crate::user::User;

    const PHOTO: &str = "data:image/png;base64,iVBORw0KGgo=";

    struct Fixture {
        service: PropertyService,
        store: Arc<MemoryStore>,
        media: Arc<FakeHost>,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let media = Arc::new(FakeHost::default());
        let user = User::new("Ana", "ana@x.com", "https://avatar.test/ana");
        store.insert_user(&user).await.unwrap();

        Fixture {
            service: PropertyService::new(store.clone(), media.clone()),
            store,
            media,
            user,
        }
    }

    fn listing(title: &str, property_type: &str) -> NewProperty {
        NewProperty {
            title: title.into(),
            description: "Bright and quiet".into(),
            property_type: property_type.into(),
            location: "Lisbon".into(),
            price: 250_000.0,
            photo: PHOTO.into(),
        }
    }

    #[tokio::test]
    async fn test_create_links_creator() {
        let f = fixture().await;

        let property = f
            .service
            .create(listing("Loft", "apartment"), " ANA@x.com ")
            .await
            .unwrap();

        assert_eq!(property.creator, f.user.id);
        assert_eq!(
            property.photo,
            FakeHost::url_for(&Image::DataUrl(PHOTO.into()))
        );

        let creator = f.store.find_user_by_id(&f.user.id).await.unwrap().unwrap();
        assert_eq!(creator.all_properties, vec![property.id.clone()]);

        let detail = f.service.get_by_id(&property.id).await.unwrap();
        assert_eq!(detail.creator.email, "ana@x.com");
        assert_eq!(detail.title, "Loft");
    }

    #[tokio::test]
    async fn test_create_unknown_email_writes_nothing() {
        let f = fixture().await;

        let err = f
            .service
            .create(listing("Loft", "apartment"), "ghost@x.com")
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::NotFound("User")));
        assert_eq!(f.media.uploads(), 0);
        assert_eq!(
            f.service.list(&ListQuery::default()).await.unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn test_create_without_photo() {
        let f = fixture().await;
        let mut input = listing("Loft", "apartment");
        input.photo = String::default();

        let err = f.service.create(input, "ana@x.com").await.unwrap_err();
        assert!(matches!(err, ServerError::ValidationFailure(_)));
        assert_eq!(f.media.uploads(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_no_state() {
        let f = fixture().await;
        f.media.set_failing(true);

        let err = f
            .service
            .create(listing("Loft", "apartment"), "ana@x.com")
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Upstream(_)));
        let creator = f.store.find_user_by_id(&f.user.id).await.unwrap().unwrap();
        assert!(creator.all_properties.is_empty());
        assert_eq!(
            f.service.list(&ListQuery::default()).await.unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn test_delete_unlinks_creator() {
        let f = fixture().await;
        let kept = f
            .service
            .create(listing("Cottage", "villa"), "ana@x.com")
            .await
            .unwrap();
        let removed = f
            .service
            .create(listing("Loft", "apartment"), "ana@x.com")
            .await
            .unwrap();

        f.service.delete(&removed.id).await.unwrap();

        assert!(matches!(
            f.service.get_by_id(&removed.id).await,
            Err(ServerError::NotFound("Property"))
        ));
        assert!(matches!(
            f.service.delete(&removed.id).await,
            Err(ServerError::NotFound("Property"))
        ));
        let creator = f.store.find_user_by_id(&f.user.id).await.unwrap().unwrap();
        assert_eq!(creator.all_properties, vec![kept.id]);
    }

    #[tokio::test]
    async fn test_filter_total_ignores_range() {
        let f = fixture().await;
        for (title, kind) in [
            ("Seaside Villa", "villa"),
            ("City Loft", "apartment"),
            ("Hill Villa", "villa"),
            ("Lake Villa", "villa"),
        ] {
            f.service.create(listing(title, kind), "ana@x.com").await.unwrap();
        }

        let page = f
            .service
            .list(
                &ListQuery::default()
                    .filter(PropertyFilter {
                        property_type: Some("villa".into()),
                        title_contains: None,
                    })
                    .range(Range::new(0, Some(2)).unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.items.iter().all(|p| p.property_type == "villa"));
    }

    #[tokio::test]
    async fn test_title_filter_is_case_insensitive() {
        let f = fixture().await;
        for title in ["Lakeview Cottage", "BLUE LAKE", "Riverside"] {
            f.service
                .create(listing(title, "villa"), "ana@x.com")
                .await
                .unwrap();
        }

        let page = f
            .service
            .list(&ListQuery::default().filter(PropertyFilter {
                property_type: None,
                title_contains: Some("lake".into()),
            }))
            .await
            .unwrap();

        let mut titles: Vec<_> = page.items.into_iter().map(|p| p.title).collect();
        titles.sort();
        assert_eq!(titles, ["BLUE LAKE", "Lakeview Cottage"]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_update_keeps_or_replaces_photo() {
        let f = fixture().await;
        let property = f
            .service
            .create(listing("Loft", "apartment"), "ana@x.com")
            .await
            .unwrap();
        assert_eq!(f.media.uploads(), 1);

        // Same durable URL and empty photo keep the stored reference.
        for photo in [property.photo.clone(), String::default()] {
            f.service
                .update(
                    &property.id,
                    PropertyChanges {
                        price: Some(199_000.0),
                        photo: Some(photo),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        assert_eq!(f.media.uploads(), 1);

        f.service
            .update(
                &property.id,
                PropertyChanges {
                    title: Some("Sunny Loft".into()),
                    photo: Some("https://example.com/new.jpg".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = f.store.find_property(&property.id).await.unwrap().unwrap();
        assert_eq!(f.media.uploads(), 2);
        assert_eq!(stored.title, "Sunny Loft");
        assert_eq!(stored.price, 199_000.0);
        assert_eq!(
            stored.photo,
            FakeHost::url_for(&Image::Remote("https://example.com/new.jpg".into()))
        );
        assert_eq!(stored.description, property.description);
    }

    #[tokio::test]
    async fn test_update_missing_property() {
        let f = fixture().await;
        let err = f
            .service
            .update("nope", PropertyChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound("Property")));
    }

    #[tokio::test]
    async fn test_negative_price_is_rejected() {
        let f = fixture().await;
        let mut input = listing("Loft", "apartment");
        input.price = -1.0;

        let err = f.service.create(input, "ana@x.com").await.unwrap_err();
        assert!(matches!(err, ServerError::ValidationFailure(_)));
    }
}
