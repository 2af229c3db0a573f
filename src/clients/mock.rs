use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{ApiRequest, ApiResponse, Endpoint, ResponseBody, Transport};
use crate::error::ApiError;

/// One scripted outcome for a mock request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Json { status: u16, body: Value },
    Text { status: u16, body: String },
    ConnectivityFailure,
    Timeout,
    /// Wait before producing the inner reply
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn ok(body: Value) -> Self {
        MockReply::Json { status: 200, body }
    }

    pub fn error(status: u16, message: &str) -> Self {
        MockReply::Json { status, body: json!({ "error": message }) }
    }

    pub fn delayed(self, delay: Duration) -> Self {
        MockReply::Delayed(delay, Box::new(self))
    }
}

/// Shared control surface for a [`MockTransport`]: script replies and
/// inspect the requests that were sent.
#[derive(Debug, Default)]
pub struct MockHandle {
    replies: Mutex<HashMap<Endpoint, VecDeque<MockReply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHandle {
    /// Queue a reply; replies for one endpoint are consumed in order.
    pub fn push(&self, endpoint: Endpoint, reply: MockReply) {
        lock(&self.replies).entry(endpoint).or_default().push_back(reply);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self, endpoint: Endpoint) -> usize {
        lock(&self.requests).iter().filter(|r| r.endpoint == endpoint).count()
    }

    fn next_reply(&self, endpoint: Endpoint) -> Option<MockReply> {
        lock(&self.replies).get_mut(&endpoint).and_then(VecDeque::pop_front)
    }
}

/// Mock transport for testing that answers from a scripted queue.
#[derive(Debug, Clone)]
pub struct MockTransport {
    handle: Arc<MockHandle>,
}

impl MockTransport {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone() }, handle)
    }

    pub fn with_replies(replies: Vec<(Endpoint, MockReply)>) -> (Self, Arc<MockHandle>) {
        let (transport, handle) = Self::new();
        for (endpoint, reply) in replies {
            handle.push(endpoint, reply);
        }
        (transport, handle)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest, timeout: Duration) -> Result<ApiResponse, ApiError> {
        let endpoint = request.endpoint;
        lock(&self.handle.requests).push(request);

        let mut reply = self.handle.next_reply(endpoint);
        loop {
            match reply {
                Some(MockReply::Delayed(delay, inner)) => {
                    tokio::time::sleep(delay).await;
                    reply = Some(*inner);
                }
                Some(MockReply::Json { status, body }) => {
                    return Ok(ApiResponse { status, reason: reason(status), body: ResponseBody::Json(body) })
                }
                Some(MockReply::Text { status, body }) => {
                    return Ok(ApiResponse { status, reason: reason(status), body: ResponseBody::Text(body) })
                }
                Some(MockReply::ConnectivityFailure) => {
                    return Err(ApiError::Connectivity("Failed to fetch".to_string()))
                }
                Some(MockReply::Timeout) => {
                    return Err(ApiError::Timeout { endpoint: endpoint.to_string(), seconds: timeout.as_secs() })
                }
                None => {
                    return Ok(ApiResponse {
                        status: 404,
                        reason: reason(404),
                        body: ResponseBody::Json(json!({ "error": format!("no scripted reply for {}", endpoint) })),
                    })
                }
            }
        }
    }

    fn clone_box(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }
}

fn reason(status: u16) -> String {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "",
    }
    .to_string()
}
