use std::time::Duration;

use reqwest::redirect::Policy;
use url::Url;

use super::types::{CheckOutcome, ProbeError};
use crate::models::Method;

/// Performs one outbound probe
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Issue a single request and report its outcome. Never panics, never retries.
    async fn probe(&self, target: &Url, method: Method, timeout: Duration) -> CheckOutcome;
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("checkup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn probe(&self, target: &Url, method: Method, timeout: Duration) -> CheckOutcome {
        let request = self.client.request(method.into(), target.clone()).timeout(timeout);

        match request.send().await {
            // The body is never read; dropping the response releases the connection.
            Ok(response) => CheckOutcome::ResponseCode(response.status().as_u16()),
            Err(e) if e.is_timeout() => CheckOutcome::timeout(),
            Err(e) => CheckOutcome::Error(ProbeError::Transport(e.to_string())),
        }
    }
}
