//! Scripted fakes for the session seams

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::SessionInvalidator;
use super::transport::{ApiRequest, ApiResponse, Transport, TransportError};

enum Scripted {
    Response(ApiResponse),
    Error(String),
    Hang,
}

/// Transport that replays scripted outcomes in order and records requests
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: ApiResponse) {
        self.script.lock().unwrap().push_back(Scripted::Response(response));
    }

    pub fn push_json(&self, status: u16, value: serde_json::Value) {
        self.push_response(ApiResponse::json_body(status, &value));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Error(message.to_string()));
    }

    /// Next call never completes (until the caller times out)
    pub fn push_hang(&self) {
        self.script.lock().unwrap().push_back(Scripted::Hang);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(TransportError(message)),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError("hung request resumed".to_string()))
            }
            None => Err(TransportError("no scripted response".to_string())),
        }
    }
}

/// Invalidator that counts calls and remembers the login path
#[derive(Default)]
pub struct CountingInvalidator {
    calls: AtomicUsize,
    last_path: Mutex<Option<String>>,
}

impl CountingInvalidator {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_path(&self) -> Option<String> {
        self.last_path.lock().unwrap().clone()
    }
}

impl SessionInvalidator for CountingInvalidator {
    fn invalidate(&self, login_path: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(login_path.to_string());
    }
}
