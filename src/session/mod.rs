//! Session module
//!
//! Token persistence and the authenticated request client:
//! - `TokenStore` backends (keychain, JSON file, memory)
//! - `SessionClient` with bearer injection and 401 teardown
//! - `Transport` seam over reqwest

mod client;
mod credentials;
mod error;
mod token_store;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{FnInvalidator, LogInvalidator, RequestOptions, SessionClient, SessionInvalidator};
pub use credentials::KeyringTokenStore;
pub use error::ApiError;
pub use token_store::{
    FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};
pub use transport::{
    ApiRequest, ApiResponse, FilePart, MultipartForm, ReqwestTransport, RequestBody, Transport,
    TransportError,
};
