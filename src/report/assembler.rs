use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::images::{load_embeddable, HttpImageFetcher, ImageFetcher};
use super::layout::{Report, ReportLayout};
use super::{pdf, ReportArtifact, ReportError};
use crate::config::ClientConfig;
use crate::documents::DocumentFilters;
use crate::models::{DocumentRecord, ImageRef};

/// Builds the PDF export for the documents currently on display.
///
/// Documents are laid out in the order given and their images are fetched one
/// at a time, so the page-break sequence never depends on network timing. An
/// image that cannot be fetched or decoded is replaced by a muted URL line;
/// it never aborts the export.
#[derive(Clone)]
pub struct ReportAssembler {
    fetcher: Arc<dyn ImageFetcher>,
}

impl ReportAssembler {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Assembler fetching photos over the shared image HTTP client
    pub fn with_http() -> Self {
        Self::new(Arc::new(HttpImageFetcher::default()))
    }

    pub fn from_config(config: &ClientConfig) -> reqwest::Result<Self> {
        Ok(Self::new(Arc::new(HttpImageFetcher::from_config(config)?)))
    }

    /// Lay out a report stamped with the current time
    pub async fn assemble(&self, documents: &[DocumentRecord], filters: &DocumentFilters) -> Report {
        self.assemble_at(documents, filters, Utc::now()).await
    }

    pub async fn assemble_at(
        &self,
        documents: &[DocumentRecord],
        filters: &DocumentFilters,
        generated_at: DateTime<Utc>,
    ) -> Report {
        let mut layout = ReportLayout::new();
        layout.write_preamble(filters, generated_at.with_timezone(&Local).date_naive());

        for document in documents {
            layout.begin_document(document);
            layout = self.place_images(layout, &document.images).await;
            layout.end_document();
        }

        layout.finish(generated_at)
    }

    async fn place_images(&self, layout: ReportLayout, images: &[ImageRef]) -> ReportLayout {
        let fetcher = self.fetcher.as_ref();
        stream::iter(images)
            .fold(layout, |mut layout, image| async move {
                match load_embeddable(fetcher, &image.image_url).await {
                    Ok(embedded) => layout.push_image(embedded),
                    Err(e) => {
                        warn!(url = %image.image_url, error = %e, "Image not embeddable, writing URL instead");
                        layout.push_fallback(&image.image_url);
                    }
                }
                layout
            })
            .await
    }

    /// Assemble and encode the export
    pub async fn export(
        &self,
        documents: &[DocumentRecord],
        filters: &DocumentFilters,
    ) -> Result<ReportArtifact, ReportError> {
        let report = self.assemble(documents, filters).await;
        let bytes = pdf::render(&report)?;

        info!(
            documents = documents.len(),
            pages = report.page_count(),
            images = report.embedded_image_count(),
            fallbacks = report.fallback_lines().len(),
            "Report generated"
        );

        Ok(ReportArtifact {
            file_name: report.file_name,
            bytes,
        })
    }
}
