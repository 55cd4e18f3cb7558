//! Image fetching and conversion for the export
//!
//! Stored photos come back from object storage in whatever format was
//! uploaded. Each one is decoded, flattened to RGB, bounded in size and
//! re-encoded as JPEG so it can be embedded as a DCT stream.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::http_client::{build_image_client, image_client};

/// Longest edge kept when embedding a photo, in pixels
const MAX_IMAGE_DIMENSION: u32 = 1600;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to fetch image: {0}")]
    Fetch(String),

    #[error("image request returned status {0}")]
    Status(u16),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("image task failed: {0}")]
    Task(String),
}

/// Source of raw image bytes for a stored photo URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

/// Fetches photos directly from storage. Storage URLs are pre-signed or
/// public, so no bearer token is attached.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetcher with its own pool, honouring the configured image timeout
    pub fn from_config(config: &ClientConfig) -> reqwest::Result<Self> {
        Ok(Self::new(build_image_client(config.image_timeout)?))
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new(image_client().clone())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// A photo re-encoded as baseline RGB JPEG
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EmbeddedImage {
    /// Decode any supported format and re-encode (blocking)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        let mut img =
            image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;

        if img.width() > MAX_IMAGE_DIMENSION || img.height() > MAX_IMAGE_DIMENSION {
            img = img.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Triangle);
        }

        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .map_err(|e| ImageError::Encode(e.to_string()))?;

        Ok(Self { jpeg, width, height })
    }

    /// Convert on the blocking pool; decoding large photos is CPU-bound
    pub async fn convert(bytes: Vec<u8>) -> Result<Self, ImageError> {
        tokio::task::spawn_blocking(move || Self::from_bytes(&bytes))
            .await
            .map_err(|e| ImageError::Task(e.to_string()))?
    }
}

/// Fetch then convert one stored photo
pub async fn load_embeddable(
    fetcher: &dyn ImageFetcher,
    url: &str,
) -> Result<EmbeddedImage, ImageError> {
    let bytes = fetcher.fetch(url).await?;
    EmbeddedImage::convert(bytes).await
}
