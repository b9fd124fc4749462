use reqwest::blocking::Client;
use reqwest::{Method, StatusCode, Url};
use tracing::debug;

use crate::signer::ApiRequest;

/// What came back from one signed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptResult {
    /// `None` when no response was received at all.
    pub status: Option<StatusCode>,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Transport-level failure text, if any.
    pub error: Option<String>,
}

impl AttemptResult {
    pub fn response(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Some(StatusCode::OK)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == Some(StatusCode::FORBIDDEN)
    }
}

/// Sends one request and reports whatever happened. Never fails: problems
/// are folded into the returned [`AttemptResult`].
pub trait Transport {
    fn execute(&self, host: &Url, request: &ApiRequest) -> AttemptResult;
}

/// Blocking `reqwest` transport. A new client is built for every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn execute(&self, host: &Url, request: &ApiRequest) -> AttemptResult {
        let mut url = match host.join(&request.path) {
            Ok(url) => url,
            Err(e) => return AttemptResult::transport_error(format!("Invalid request URL: {}", e)),
        };
        url.query_pairs_mut().extend_pairs(request.query.iter());

        let method = match Method::from_bytes(request.method.as_bytes()) {
            Ok(m) => m,
            Err(e) => return AttemptResult::transport_error(e.to_string()),
        };

        debug!("{} {}", method, url.path());
        let client = Client::new();
        let resp = match client.request(method, url).send() {
            Ok(resp) => resp,
            Err(e) => return AttemptResult::transport_error(e.to_string()),
        };

        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        debug!("response status {}", status);

        match resp.text() {
            Ok(body) => AttemptResult {
                status: Some(status),
                headers,
                body,
                error: None,
            },
            Err(e) => AttemptResult {
                status: Some(status),
                headers,
                body: String::new(),
                error: Some(e.to_string()),
            },
        }
    }
}
