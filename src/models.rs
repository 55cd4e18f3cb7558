//! Wire models shared between the session client, the listing cursor and the
//! report exporter. Field names follow the DocManage API JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

impl SessionTokens {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    CompanyAdmin,
}

/// User record returned by `/auth/me/` and the login response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub mobile: String,
    pub role: UserRole,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
}

impl AuthenticatedUser {
    pub fn is_company_admin(&self) -> bool {
        self.role == UserRole::CompanyAdmin
    }
}

/// Body of a successful `POST /auth/login/`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: AuthenticatedUser,
}

impl LoginResponse {
    pub fn tokens(&self) -> SessionTokens {
        SessionTokens::new(self.access.clone(), self.refresh.clone())
    }
}

/// Reference to one uploaded photo. The URL is pre-signed and is fetched
/// without the bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub image_url: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl ImageRef {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            id: None,
            file_size: None,
        }
    }
}

/// A truck document with its ordered photo set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub truck_number: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub uploaded_by_name: Option<String>,
}

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage<T> {
    pub results: Vec<T>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub count: u64,
}

/// Either the paginated envelope or a bare array.
///
/// The bare form is treated as a single complete page. Whether the backend
/// ever sends it is unverified.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListingEnvelope<T> {
    Paged {
        #[serde(default = "Vec::new")]
        results: Vec<T>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        #[serde(default)]
        count: Option<u64>,
    },
    Bare(Vec<T>),
}

impl<T> From<ListingEnvelope<T>> for ListingPage<T> {
    fn from(envelope: ListingEnvelope<T>) -> Self {
        match envelope {
            ListingEnvelope::Paged {
                results,
                next,
                previous,
                count,
            } => {
                // A zero count alongside results is treated as missing
                let count = count
                    .filter(|c| *c > 0)
                    .unwrap_or(results.len() as u64);
                ListingPage {
                    results,
                    next,
                    previous,
                    count,
                }
            }
            ListingEnvelope::Bare(results) => ListingPage {
                count: results.len() as u64,
                results,
                next: None,
                previous: None,
            },
        }
    }
}

/// `{ "error": "..." }` payload sent on non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub error: Option<String>,
}
