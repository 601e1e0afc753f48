//! REST client binding the API resources, as the web client does.
//!
//! Listing speaks the `_start`/`_end`/`_sort`/`_order` convention and reads
//! the total from the `x-total-count` header.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::property::{ListParams, ListQuery};

const X_TOTAL_COUNT: &str = "x-total-count";

/// Errors returned by [`RestClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("`{0}` cannot be used as API base")]
    InvalidBase(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success answer, with the `message` sent by the API.
    #[error("{status}: {message}")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A page of resources with the number of matching resources.
#[derive(Clone, Debug, PartialEq)]
pub struct ListResult<T> {
    pub data: Vec<T>,
    pub total: u64,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for `/api/v1` resources (`properties`, `users`).
#[derive(Clone, Debug)]
pub struct RestClient {
    base: Url,
    http: reqwest::Client,
}

impl RestClient {
    /// Create a new [`RestClient`] for `base`, e.g. `http://localhost:8080/api/v1`.
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidBase(base.to_string()));
        }

        Ok(Self {
            base,
            http: reqwest::Client::new(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBase(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or_default().to_owned(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// List `resource`. Without `x-total-count`, `total` is the page size.
    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &ListQuery,
    ) -> Result<ListResult<T>> {
        let response = self
            .http
            .get(self.url(&[resource])?)
            .query(&ListParams::from(query))
            .send()
            .await?;

        let total = response
            .headers()
            .get(X_TOTAL_COUNT)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        let data: Vec<T> = Self::read(response).await?;
        Ok(ListResult {
            total: total.unwrap_or(data.len() as u64),
            data,
        })
    }

    /// Fetch one resource.
    pub async fn one<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
    ) -> Result<T> {
        let response = self.http.get(self.url(&[resource, id])?).send().await?;
        Self::read(response).await
    }

    /// Create a resource.
    pub async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(&[resource])?)
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }

    /// Partially update a resource.
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .patch(self.url(&[resource, id])?)
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }

    /// Delete a resource.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
    ) -> Result<T> {
        let response = self.http.delete(self.url(&[resource, id])?).send().await?;
        Self::read(response).await
    }
}
