//! Session-bound API client
//!
//! Every call to the DocManage API goes through `SessionClient::request`:
//! - attaches `Authorization: Bearer <access>` when a token is stored
//! - sets `Content-Type: application/json` unless the body is multipart
//! - on 401 clears the token store, invokes the injected invalidator and
//!   fails with `ApiError::SessionExpired`
//!
//! All other statuses are returned untouched. Login and logout are special:
//! login never carries a bearer token and its 401 is a credentials failure;
//! logout always clears local state whatever the server says.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::token_store::TokenStore;
use super::transport::{
    ApiRequest, ApiResponse, MultipartForm, ReqwestTransport, RequestBody, Transport,
};
use crate::config::ClientConfig;
use crate::http_client::api_client_with_timeout;
use crate::models::{AuthenticatedUser, LoginResponse};

const LOGIN_PATH: &str = "/auth/login/";
const LOGOUT_PATH: &str = "/auth/logout/";
const ME_PATH: &str = "/auth/me/";

/// Capability invoked when the server rejects the session.
///
/// The host decides what "go to login" means (navigate, show a prompt,
/// exit). May be called more than once when concurrent requests all see 401.
pub trait SessionInvalidator: Send + Sync {
    fn invalidate(&self, login_path: &str);
}

/// Invalidator that only logs. Useful for headless hosts.
pub struct LogInvalidator;

impl SessionInvalidator for LogInvalidator {
    fn invalidate(&self, login_path: &str) {
        warn!(login_path, "Session expired, login required");
    }
}

/// Invalidator backed by a closure
pub struct FnInvalidator<F>(pub F);

impl<F> SessionInvalidator for FnInvalidator<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn invalidate(&self, login_path: &str) {
        (self.0)(login_path)
    }
}

/// Per-call options: method, body and extra headers
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: RequestBody,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: RequestBody::Empty,
            headers: Vec::new(),
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn json(mut self, method: Method, payload: serde_json::Value) -> Self {
        self.method = method;
        self.body = RequestBody::Json(payload);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.method = Method::POST;
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

fn acquire_read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned: PoisonError<RwLockReadGuard<'_, T>>| {
        warn!("User cache lock was poisoned on read, recovering inner value");
        poisoned.into_inner()
    })
}

fn acquire_write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned: PoisonError<RwLockWriteGuard<'_, T>>| {
        warn!("User cache lock was poisoned on write, recovering inner value");
        poisoned.into_inner()
    })
}

pub struct SessionClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    invalidator: Arc<dyn SessionInvalidator>,
    /// In-memory only; rebuilt from `/auth/me/` on bootstrap
    user: RwLock<Option<AuthenticatedUser>>,
}

impl SessionClient {
    /// Client over reqwest with the configured request timeout
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        invalidator: Arc<dyn SessionInvalidator>,
    ) -> Result<Self, ApiError> {
        let http = api_client_with_timeout(config.request_timeout)
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_transport(
            config,
            Arc::new(ReqwestTransport::new(http)),
            store,
            invalidator,
        ))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        invalidator: Arc<dyn SessionInvalidator>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            invalidator,
            user: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    pub fn cached_user(&self) -> Option<AuthenticatedUser> {
        acquire_read_lock(&self.user).clone()
    }

    pub fn is_company_admin(&self) -> bool {
        acquire_read_lock(&self.user)
            .as_ref()
            .map(AuthenticatedUser::is_company_admin)
            .unwrap_or(false)
    }

    fn build_request(&self, path: &str, options: RequestOptions, bearer: Option<&str>) -> ApiRequest {
        let is_multipart = options.body.is_multipart();
        let mut headers: Vec<(String, String)> = options
            .headers
            .into_iter()
            .filter(|(name, _)| {
                let is_auth = name.eq_ignore_ascii_case("authorization");
                let is_content_type = name.eq_ignore_ascii_case("content-type");
                !(is_auth && bearer.is_some()) && !(is_content_type && is_multipart)
            })
            .collect();

        if let Some(token) = bearer {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        if !is_multipart && !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("content-type")) {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        ApiRequest {
            method: options.method,
            url: self.config.endpoint(path),
            headers,
            body: options.body,
        }
    }

    /// Send an authenticated request to an API-relative path.
    ///
    /// `path` must be relative to the API base (`/documents/?page=2`), never
    /// an absolute URL.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let token = self.store.access_token();
        let request = self.build_request(path, options, token.as_deref());
        debug!(method = %request.method, path, authenticated = token.is_some(), "API request");

        let response = self.transport.send(request).await?;

        if response.status == 401 {
            self.invalidate_session();
            return Err(ApiError::SessionExpired);
        }

        debug!(path, status = response.status, "API response");
        Ok(response)
    }

    /// Tear down local session state and notify the host.
    ///
    /// Safe to call repeatedly and concurrently.
    fn invalidate_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear token store after 401");
        }
        acquire_write_lock(&self.user).take();
        self.invalidator.invalidate(&self.config.login_path);
    }

    /// Exchange credentials for a token pair and cache the user.
    ///
    /// Overwrites any stored pair on success.
    pub async fn login(&self, mobile: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let options = RequestOptions::default().json(
            Method::POST,
            serde_json::json!({ "mobile": mobile, "password": password }),
        );
        let request = self.build_request(LOGIN_PATH, options, None);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let message = response
                .error_message()
                .unwrap_or_else(|| "Login failed".to_string());
            info!(status = response.status, "Login rejected");
            return Err(ApiError::AuthenticationFailure(message));
        }

        let login: LoginResponse = response
            .json()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.store.set(&login.tokens())?;
        *acquire_write_lock(&self.user) = Some(login.user.clone());

        info!(user_id = login.user.id, role = ?login.user.role, "Logged in");
        Ok(login)
    }

    /// Best-effort server logout followed by unconditional local teardown.
    pub async fn logout(&self) {
        if let Some(tokens) = self.store.get() {
            let options = RequestOptions::default()
                .json(Method::POST, serde_json::json!({ "refresh": tokens.refresh }));
            let request = self.build_request(LOGOUT_PATH, options, Some(&tokens.access));

            match tokio::time::timeout(self.config.logout_timeout, self.transport.send(request)).await {
                Ok(Ok(response)) if response.is_success() => debug!("Server logout acknowledged"),
                Ok(Ok(response)) => warn!(status = response.status, "Server logout rejected"),
                Ok(Err(e)) => warn!(error = %e, "Logout request failed"),
                Err(_) => warn!(
                    timeout_secs = self.config.logout_timeout.as_secs(),
                    "Logout request timed out"
                ),
            }
        } else {
            debug!("Logout with no stored session");
        }

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear token store on logout");
        }
        acquire_write_lock(&self.user).take();
        info!("Logged out");
    }

    /// Resolve the current user from the stored token.
    ///
    /// Returns `None` when there is no token. A rejected or failed lookup
    /// clears both tokens and also returns `None`; it does not invoke the
    /// invalidator since no screen is showing yet.
    pub async fn bootstrap(&self) -> Option<AuthenticatedUser> {
        let token = self.store.access_token()?;
        let request = self.build_request(ME_PATH, RequestOptions::get(), Some(&token));

        let user = match self.transport.send(request).await {
            Ok(response) if response.is_success() => match response.json::<AuthenticatedUser>() {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Unreadable /auth/me/ response");
                    None
                }
            },
            Ok(response) => {
                debug!(status = response.status, "Stored session rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch user");
                None
            }
        };

        match user {
            Some(user) => {
                *acquire_write_lock(&self.user) = Some(user.clone());
                Some(user)
            }
            None => {
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear token store");
                }
                acquire_write_lock(&self.user).take();
                None
            }
        }
    }

    /// Cached user if known, otherwise resolve it via `bootstrap`
    pub async fn current_user(&self) -> Option<AuthenticatedUser> {
        if let Some(user) = self.cached_user() {
            return Some(user);
        }
        self.bootstrap().await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let response = self.request(path, options).await?;
        if !response.is_success() {
            return Err(ApiError::from_response(&response, fallback));
        }
        response.json().map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.decode(path, RequestOptions::get(), "Request failed").await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T, ApiError> {
        let payload = serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.decode(path, RequestOptions::default().json(Method::POST, payload), "Request failed")
            .await
    }

    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T, ApiError> {
        let payload = serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.decode(path, RequestOptions::default().json(Method::PATCH, payload), "Request failed")
            .await
    }
}
