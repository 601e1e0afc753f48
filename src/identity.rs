//! Verify identity provider credentials (Google Sign-In ID tokens).
//!
//! Signatures are checked against the provider public keys, fetched from a
//! JWKS endpoint and cached. A token whose `kid` is unknown forces a refresh,
//! at most once per [`MIN_REFRESH_INTERVAL`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, ServerError};

pub const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const DEFAULT_ISSUERS: [&str; 2] =
    ["accounts.google.com", "https://accounts.google.com"];
const KEYS_TTL: Duration = Duration::from_secs(60 * 60);
/// Unknown `kid`s do not refetch keys younger than this.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Verified user identity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub picture: String,
}

/// Turn a signed credential into an [`Identity`].
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity>;
}

/// Claims read from an ID token.
#[derive(Debug, Deserialize)]
struct Claims {
    email: String,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

#[derive(Debug)]
enum Lookup {
    Hit(Jwk),
    Unknown,
    Refresh,
}

impl CachedKeys {
    fn lookup(&self, kid: &str, age: Duration) -> Lookup {
        if age >= KEYS_TTL {
            return Lookup::Refresh;
        }

        match self.keys.find(kid) {
            Some(jwk) => Lookup::Hit(jwk.clone()),
            None if age < MIN_REFRESH_INTERVAL => Lookup::Unknown,
            None => Lookup::Refresh,
        }
    }
}

enum KeySource {
    /// Single known key.
    Static(DecodingKey, Algorithm),
    /// Keys published on a JWKS endpoint.
    Remote {
        url: String,
        http: reqwest::Client,
        cache: RwLock<Option<CachedKeys>>,
    },
}

/// [`IdentityVerifier`] for JWT credentials.
pub struct JwtVerifier {
    audience: String,
    issuers: Vec<String>,
    keys: KeySource,
}

impl JwtVerifier {
    /// Verify tokens against keys published on `jwks_url`.
    pub fn remote(
        client_id: &str,
        jwks_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServerError::Internal {
                details: "cannot build HTTP client".into(),
                source: Some(Box::new(err)),
            })?;

        Ok(Self::new(
            client_id,
            KeySource::Remote {
                url: jwks_url.to_owned(),
                http,
                cache: RwLock::new(None),
            },
        ))
    }

    /// Verify tokens against a single key.
    pub fn with_key(
        client_id: &str,
        key: DecodingKey,
        algorithm: Algorithm,
    ) -> Self {
        Self::new(client_id, KeySource::Static(key, algorithm))
    }

    fn new(client_id: &str, keys: KeySource) -> Self {
        Self {
            audience: client_id.to_owned(),
            issuers: DEFAULT_ISSUERS.iter().map(|i| i.to_string()).collect(),
            keys,
        }
    }

    /// Replace accepted issuers.
    pub fn issuers(mut self, issuers: Vec<String>) -> Self {
        if !issuers.is_empty() {
            self.issuers = issuers;
        }
        self
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&self.issuers);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation
    }

    async fn fetch_keys(url: &str, http: &reqwest::Client) -> Result<JwkSet> {
        let response = http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|err| ServerError::Upstream(err.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|err| ServerError::Upstream(err.to_string()))
    }

    /// Key for `kid`, refreshing the cache when stale or missing it.
    async fn remote_key(
        url: &str,
        http: &reqwest::Client,
        cache: &RwLock<Option<CachedKeys>>,
        kid: &str,
    ) -> Result<DecodingKey> {
        let lookup = cache
            .read()
            .await
            .as_ref()
            .map_or(Lookup::Refresh, |c| c.lookup(kid, c.fetched_at.elapsed()));

        let jwk = match lookup {
            Lookup::Hit(jwk) => jwk,
            Lookup::Unknown => {
                tracing::debug!(%kid, "unknown key id, keys are fresh");
                return Err(ServerError::Unauthorized);
            },
            Lookup::Refresh => {
                let keys = Self::fetch_keys(url, http).await?;
                tracing::debug!(%url, count = keys.keys.len(), "identity keys refreshed");
                let jwk = keys.find(kid).cloned();
                *cache.write().await = Some(CachedKeys {
                    keys,
                    fetched_at: Instant::now(),
                });
                jwk.ok_or(ServerError::Unauthorized)?
            },
        };

        DecodingKey::from_jwk(&jwk).map_err(|err| {
            ServerError::Upstream(format!("unusable identity key: {err}"))
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        let header = decode_header(credential).map_err(|err| {
            tracing::debug!(error = %err, "malformed credential");
            ServerError::Unauthorized
        })?;

        let (key, algorithm) = match &self.keys {
            KeySource::Static(key, algorithm) => (key.clone(), *algorithm),
            KeySource::Remote { url, http, cache } => {
                if header.alg != Algorithm::RS256 {
                    return Err(ServerError::Unauthorized);
                }
                let kid = header.kid.as_deref().ok_or(ServerError::Unauthorized)?;
                (Self::remote_key(url, http, cache, kid).await?, Algorithm::RS256)
            },
        };

        let claims = decode::<Claims>(credential, &key, &self.validation(algorithm))
            .map_err(|err| {
                tracing::debug!(error = %err, "credential rejected");
                ServerError::Unauthorized
            })?
            .claims;

        if !claims.email_verified {
            tracing::debug!(email = %claims.email, "email not verified by provider");
            return Err(ServerError::Unauthorized);
        }

        Ok(Identity {
            name: claims.name.unwrap_or_else(|| claims.email.clone()),
            email: claims.email,
            picture: claims.picture.unwrap_or_default(),
        })
    }
}
