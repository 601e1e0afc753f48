//! Yariga is a real-estate listing API: properties, agents and their photos.

#![forbid(unsafe_code)]
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod media;
pub mod property;
mod router;
pub mod telemetry;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use config::Configuration;
use database::Store;
use database::memory::MemoryStore;
use database::postgres::{self, PgStore};
use error::ServerError;
use identity::{IdentityVerifier, JwtVerifier};
use media::{Cloudinary, Credentials, MediaHost};
use property::PropertyService;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use user::UserService;

/// Photos are sent inline as data URLs.
const BODY_LIMIT: usize = 50 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State backed by memory, fake media host and a shared-secret verifier.
#[cfg(test)]
pub fn test_state() -> (AppState, Arc<MemoryStore>, Arc<media::tests::FakeHost>) {
    let store = Arc::new(MemoryStore::new());
    let media = Arc::new(media::tests::FakeHost::default());
    let state = AppState::new(
        Arc::new(Configuration::default()),
        store.clone(),
        media.clone(),
    )
    .identity(Arc::new(identity::tests::verifier()));

    (state, store, media)
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Configuration>,
    pub properties: PropertyService,
    pub users: UserService,
}

impl AppState {
    /// Wire services on top of a store and a media host.
    pub fn new(
        config: Arc<Configuration>,
        store: Arc<dyn Store>,
        media: Arc<dyn MediaHost>,
    ) -> Self {
        Self {
            config,
            properties: PropertyService::new(Arc::clone(&store), media),
            users: UserService::new(store),
        }
    }

    /// Enable `POST /login`.
    pub fn identity(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.users = self.users.identity(verifier);
        self
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .expose_headers([HeaderName::from_static(router::properties::X_TOTAL_COUNT)]),
        );

    let api = Router::new()
        // `POST /login` goes to `login`.
        .route("/login", post(router::login::handler))
        .nest("/properties", router::properties::router())
        .nest("/users", router::users::router());

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::handler))
        .nest("/api/v1", api)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = Configuration::default().read()?;

    let store: Arc<dyn Store> = match config.postgres {
        Some(ref config) => {
            let store = PgStore::connect(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(postgres::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(postgres::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(postgres::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(postgres::DEFAULT_POOL_SIZE),
            )
            .await?;

            // execute migrations scripts on start.
            store.migrate().await?;
            Arc::new(store)
        },
        None => {
            tracing::warn!(
                "missing `postgres` entry on `config.yaml` file, data is kept in memory"
            );
            Arc::new(MemoryStore::new())
        },
    };

    // handle photo uploads.
    let Some(cloudinary) = &config.cloudinary else {
        tracing::error!("missing `cloudinary` entry on `config.yaml` file");
        return Err("media host is not configured".into());
    };
    let media = Cloudinary::new(
        Credentials {
            key: cloudinary.api_key.clone(),
            cloud_name: cloudinary.cloud_name.clone(),
            secret: cloudinary.api_secret.clone(),
        },
        config.upstream_timeout(),
    )
    .folder(cloudinary.folder.clone());

    let state = AppState::new(Arc::clone(&config), store, Arc::new(media));

    // handle identity provider.
    let state = if let Some(provider) = &config.identity {
        let verifier = JwtVerifier::remote(
            &provider.client_id,
            provider
                .jwks_url
                .as_deref()
                .unwrap_or(identity::DEFAULT_JWKS_URL),
            config.upstream_timeout(),
        )?
        .issuers(provider.issuers.clone().unwrap_or_default());

        state.identity(Arc::new(verifier))
    } else {
        tracing::warn!("missing `identity` entry on `config.yaml` file, `POST /login` is disabled");
        state
    };

    Ok(state)
}
