//! Publish listing photos into a media host.
//!
//! Each image is stored on Cloudinary under the SHA1 of its payload, so
//! uploading the same photo twice yields the same durable URL.

use std::time::Duration;

use async_trait::async_trait;
use cloudinary::upload::result::UploadResult;
use cloudinary::upload::{Source, Upload, UploadOptions};
use sha1::{Digest, Sha1};
use url::Url;

use crate::error::{Result, ServerError};

/// Image accepted by a [`MediaHost`].
#[derive(Clone, Debug, PartialEq)]
pub enum Image {
    /// `data:image/...;base64,...`
    DataUrl(String),
    /// Image already reachable over HTTP(S).
    Remote(String),
}

impl Image {
    /// Parse a `photo` field as sent by the client.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ServerError::ValidationFailure(
                "an image is required".into(),
            ));
        }

        if input.starts_with("data:image/") {
            Ok(Image::DataUrl(input.to_owned()))
        } else if input.starts_with("https://") || input.starts_with("http://")
        {
            Ok(Image::Remote(input.to_owned()))
        } else {
            Err(ServerError::ValidationFailure(
                "image must be a data URL or an HTTP(S) URL".into(),
            ))
        }
    }

    /// SHA1 of the payload, hex encoded.
    pub fn digest(&self) -> String {
        match self {
            Image::DataUrl(s) | Image::Remote(s) => {
                hex::encode(Sha1::digest(s.as_bytes()))
            },
        }
    }

    fn into_source(self) -> Result<Source> {
        match self {
            Image::DataUrl(data) => Ok(Source::DataUrl(data)),
            Image::Remote(url) => Url::parse(&url).map(Source::Url).map_err(|_| {
                ServerError::ValidationFailure(format!("`{url}` is not a valid URL"))
            }),
        }
    }
}

/// Upload images and return durable URLs.
#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, image: Image) -> Result<String>;
}

/// Cloudinary credentials structure to upload images.
#[derive(Clone, Debug)]
pub struct Credentials {
    /// Cloudinary API key.
    pub key: String,
    /// Cloudinary cloud name.
    pub cloud_name: String,
    /// Cloudinary API secret.
    /// Should never be shared!
    pub secret: String,
}

/// Cloudinary signed uploads.
#[derive(Clone, Debug)]
pub struct Cloudinary {
    credentials: Credentials,
    folder: Option<String>,
    timeout: Duration,
}

impl Cloudinary {
    /// Create a new [`Cloudinary`] host. Uploads give up after `timeout`.
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        Self {
            credentials,
            folder: None,
            timeout,
        }
    }

    /// Store uploads into `folder`.
    pub fn folder(mut self, folder: Option<String>) -> Self {
        self.folder = folder.filter(|f| !f.is_empty());
        self
    }

    fn options(&self, public_id: String) -> UploadOptions<'_> {
        let options = UploadOptions::new().set_public_id(public_id);
        match &self.folder {
            Some(folder) => options.set_folder(folder.clone()),
            None => options,
        }
    }
}

#[async_trait]
impl MediaHost for Cloudinary {
    async fn upload(&self, image: Image) -> Result<String> {
        // Hash image to obtain unique identifier.
        let public_id = image.digest();
        let source = image.into_source()?;
        let options = self.options(public_id.clone());

        let upload = Upload::new(
            self.credentials.key.clone(),
            self.credentials.cloud_name.clone(),
            self.credentials.secret.clone(),
        );

        let result = tokio::time::timeout(self.timeout, upload.image(source, &options))
            .await
            .map_err(|_| ServerError::Upstream("media host timed out".into()))?
            .map_err(|err| ServerError::Upstream(err.to_string()))?;

        let url = match result {
            UploadResult::Response(body) => body.secure_url,
            UploadResult::ResponseWithImageMetadata(body) => body.secure_url,
            UploadResult::Error(body) => {
                tracing::warn!(message = %body.error.message, "image upload rejected");
                return Err(ServerError::Upstream(body.error.message));
            },
        };

        tracing::debug!(%public_id, %url, "image uploaded");
        Ok(url)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// Media host answering deterministic URLs.
    #[derive(Debug, Default)]
    pub struct FakeHost {
        pub uploads: Mutex<Vec<Image>>,
        pub fail: AtomicBool,
    }

    impl FakeHost {
        pub fn url_for(image: &Image) -> String {
            format!("https://media.test/{}.webp", image.digest())
        }

        pub fn uploads(&self) -> usize {
            self.uploads.lock().unwrap().len()
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MediaHost for FakeHost {
        async fn upload(&self, image: Image) -> Result<String> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ServerError::Upstream("media host unavailable".into()));
            }
            let url = Self::url_for(&image);
            self.uploads.lock().unwrap().push(image);
            Ok(url)
        }
    }

    #[test]
    fn test_parse_image() {
        assert_eq!(
            Image::parse(" data:image/png;base64,iVBORw0KGgo= ").unwrap(),
            Image::DataUrl("data:image/png;base64,iVBORw0KGgo=".into())
        );
        assert_eq!(
            Image::parse("https://example.com/house.jpg").unwrap(),
            Image::Remote("https://example.com/house.jpg".into())
        );
        assert!(matches!(
            Image::parse("   "),
            Err(ServerError::ValidationFailure(_))
        ));
        assert!(matches!(
            Image::parse("file:///etc/passwd"),
            Err(ServerError::ValidationFailure(_))
        ));
    }

    #[test]
    fn test_digest_is_sha1_of_payload() {
        let image = Image::DataUrl("data:image/png;base64,iVBORw0KGgo=".into());
        assert_eq!(image.digest(), "6cf6d451e28e0a5ff7a8c7a4ace24d8a0977f0c1");
    }

    #[test]
    fn test_image_source() {
        assert!(matches!(
            Image::DataUrl("data:image/png;base64,iVBORw0KGgo=".into()).into_source(),
            Ok(Source::DataUrl(_))
        ));
        assert!(matches!(
            Image::Remote("https://example.com/house.jpg".into()).into_source(),
            Ok(Source::Url(url)) if url.host_str() == Some("example.com")
        ));
        assert!(matches!(
            Image::Remote("https://".into()).into_source(),
            Err(ServerError::ValidationFailure(_))
        ));
    }

    #[test]
    fn test_empty_folder_is_ignored() {
        let credentials = Credentials {
            key: "111111111111111".into(),
            cloud_name: "demo".into(),
            secret: "secret".into(),
        };
        let host = Cloudinary::new(credentials, Duration::from_secs(1));

        assert_eq!(host.clone().folder(Some(String::new())).folder, None);
        assert_eq!(
            host.folder(Some("listings".into())).folder.as_deref(),
            Some("listings")
        );
    }
}
