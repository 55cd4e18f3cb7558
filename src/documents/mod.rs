//! Document listing and upload
//!
//! - `DocumentFilters` and financial-year presets
//! - `PageCursor` over the paginated listing, with normalized `PageLink`s
//! - multipart photo-set upload

mod cursor;
mod filters;
mod upload;

pub use cursor::{first_page_link, PageCursor, PageLink, PageLinkError};
pub use filters::{DocumentFilters, FinancialYear};
pub use upload::{upload_documents, UploadImage, UploadRequest};
