//! PDF export of displayed documents
//!
//! `ReportAssembler` walks the documents in display order, fetches each
//! photo through an `ImageFetcher`, places everything on a `ReportLayout`
//! and hands the finished `Report` to the lopdf encoder.

mod assembler;
mod images;
mod layout;
mod pdf;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::ClientConfig;

pub use assembler::ReportAssembler;
pub use images::{load_embeddable, EmbeddedImage, HttpImageFetcher, ImageError, ImageFetcher};
pub use layout::{
    report_file_name, Element, LayoutState, Page, Report, ReportLayout, TextRole, REPORT_TITLE,
};
pub use pdf::render as render_pdf;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to encode PDF: {0}")]
    Pdf(String),

    #[error("failed to save report: {0}")]
    Io(#[from] std::io::Error),
}

/// An encoded export, named `documents-<unix millis>.pdf`
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ReportArtifact {
    /// Write the PDF into `dir`, creating it if needed
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        info!(path = %path.display(), bytes = self.bytes.len(), "Report saved");
        Ok(path)
    }

    /// Write the PDF into the configured export directory
    pub async fn save_to_downloads(&self, config: &ClientConfig) -> Result<PathBuf, ReportError> {
        self.save_to(&config.resolved_export_dir()).await
    }
}
