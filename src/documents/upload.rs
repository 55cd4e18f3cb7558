use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::models::DocumentRecord;
use crate::session::{ApiError, FilePart, MultipartForm, RequestOptions, SessionClient};

const UPLOAD_PATH: &str = "/documents/upload/";

/// One photo to upload
#[derive(Debug, Clone)]
pub struct UploadImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a photo from disk
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self { file_name, bytes })
    }

    fn content_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// A truck document photo set ready to send
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub truck_number: String,
    pub date: NaiveDate,
    pub images: Vec<UploadImage>,
}

impl UploadRequest {
    /// Multipart body: `truck_number`, `date`, then one `images` part per photo
    pub fn to_form(&self) -> MultipartForm {
        let form = MultipartForm::new()
            .text("truck_number", self.truck_number.clone())
            .text("date", self.date.format("%Y-%m-%d").to_string());

        self.images.iter().fold(form, |form, image| {
            form.file(FilePart {
                field: "images".to_string(),
                file_name: image.file_name.clone(),
                content_type: image.content_type(),
                bytes: image.bytes.clone(),
            })
        })
    }
}

/// Upload a photo set and return the created document
pub async fn upload_documents(
    client: &SessionClient,
    request: &UploadRequest,
) -> Result<DocumentRecord, ApiError> {
    let response = client
        .request(UPLOAD_PATH, RequestOptions::default().multipart(request.to_form()))
        .await?;

    if !response.is_success() {
        return Err(ApiError::from_response(&response, "Upload failed"));
    }

    let document: DocumentRecord = response
        .json()
        .map_err(|e| ApiError::Decode(e.to_string()))?;
    info!(
        document_id = document.id,
        truck_number = %document.truck_number,
        images = document.images.len(),
        "Documents uploaded"
    );
    Ok(document)
}
