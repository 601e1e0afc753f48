use std::sync::Arc;

use crate::database::Store;
use crate::error::{Result, ServerError};
use crate::identity::IdentityVerifier;
use crate::user::{User, UserProfile, UserSummary, normalize_email};

/// User manager.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    identity: Option<Arc<dyn IdentityVerifier>>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            identity: None,
        }
    }

    /// Enable credential based login.
    pub fn identity(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.identity = Some(verifier);
        self
    }

    /// Return the user owning `email`, creating it on first login.
    ///
    /// An existing user is returned unchanged.
    pub async fn find_or_create_by_email(
        &self,
        name: &str,
        email: &str,
        avatar: &str,
    ) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ServerError::ValidationFailure("email is required".into()));
        }

        if let Some(user) = self.store.find_user_by_email(&email).await? {
            return Ok(user);
        }

        let user = User::new(name, &email, avatar);
        match self.store.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "user created");
                Ok(user)
            },
            // Lost a race against another login with the same email.
            Err(ServerError::Conflict(_)) => self
                .store
                .find_user_by_email(&email)
                .await?
                .ok_or_else(|| {
                    ServerError::InvariantViolation(format!(
                        "user {email} conflicted but cannot be found"
                    ))
                }),
            Err(err) => Err(err),
        }
    }

    /// Find a user and resolve its owned properties.
    pub async fn get_by_id(&self, id: &str) -> Result<UserProfile> {
        let user = self
            .store
            .find_user_by_id(id)
            .await?
            .ok_or(ServerError::NotFound("User"))?;

        let properties = self.store.find_properties(&user.all_properties).await?;
        if properties.len() != user.all_properties.len() {
            tracing::warn!(
                user_id = %user.id,
                expected = user.all_properties.len(),
                found = properties.len(),
                "owned properties are missing"
            );
        }

        Ok(UserProfile::new(user, properties))
    }

    /// Every user with its property count.
    pub async fn list_all(&self) -> Result<Vec<UserSummary>> {
        Ok(self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(UserSummary::from)
            .collect())
    }

    /// Verify an identity provider credential, then upsert its user.
    pub async fn login(&self, credential: &str) -> Result<User> {
        let Some(verifier) = &self.identity else {
            return Err(ServerError::Internal {
                details: "identity verification is not configured".into(),
                source: None,
            });
        };

        let identity = verifier.verify(credential).await?;
        self.find_or_create_by_email(
            &identity.name,
            &identity.email,
            &identity.picture,
        )
        .await
    }
}
