//! Registry lookups with bounded retries.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::error::CiteIdError;
use crate::schemes::{ApiRequest, ApiResponse, Lookup, Metadata, SchemeRules};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connect,
    Other(String),
}

/// One GET against a registry.
pub trait Transport: Send + Sync {
    fn get(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, CiteIdError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("citeid/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CiteIdError::HttpClient(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| CiteIdError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self.client.get(&request.url);
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify)?;
        Ok(ApiResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Sleeps between attempts. Swapped out in tests.
pub trait Pause: Send + Sync {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub connect_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connect_pause: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExistenceOutcome {
    Valid(Metadata),
    Invalid,
    TransientFailure,
}

impl ExistenceOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ExistenceOutcome::Valid(_))
    }
}

/// Sends `request` under `policy`. Timeouts are retried at once, connection
/// failures after the policy pause; anything else ends the loop.
pub fn send_with_retries(
    transport: &dyn Transport,
    pause: &dyn Pause,
    policy: &RetryPolicy,
    request: &ApiRequest,
) -> Result<ApiResponse, TransportError> {
    let attempts = policy.max_attempts.max(1);
    let mut last = TransportError::Timeout;
    for attempt in 1..=attempts {
        match transport.get(request) {
            Ok(response) => return Ok(response),
            Err(TransportError::Timeout) => {
                debug!(url = %request.url, attempt, "registry request timed out");
                last = TransportError::Timeout;
            }
            Err(TransportError::Connect) => {
                warn!(url = %request.url, attempt, "registry connection failed");
                last = TransportError::Connect;
                if attempt < attempts {
                    pause.pause(policy.connect_pause);
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(last)
}

/// Asks the registry of `rules` whether `id` exists.
pub fn check_existence(
    rules: &dyn SchemeRules,
    transport: &dyn Transport,
    pause: &dyn Pause,
    policy: &RetryPolicy,
    id: &str,
    allow_extra: bool,
) -> ExistenceOutcome {
    let Some(request) = rules.request(id) else {
        return ExistenceOutcome::Valid(Metadata::new());
    };
    let response = match send_with_retries(transport, pause, policy, &request) {
        Ok(response) => response,
        Err(TransportError::Other(message)) => {
            debug!(scheme = %rules.scheme(), id, error = %message, "registry request failed");
            return ExistenceOutcome::Invalid;
        }
        Err(_) => {
            warn!(scheme = %rules.scheme(), id, "registry unreachable after retries");
            return ExistenceOutcome::TransientFailure;
        }
    };
    if !response.is_success() {
        debug!(scheme = %rules.scheme(), id, status = response.status, "registry rejected identifier");
        return ExistenceOutcome::Invalid;
    }
    let Lookup::Found(mut metadata) = rules.interpret(id, &response) else {
        return ExistenceOutcome::Invalid;
    };
    if allow_extra
        && let Some(extra) = rules.extra_request(id)
        && let Ok(response) = send_with_retries(transport, pause, policy, &extra)
        && response.is_success()
    {
        for (key, value) in rules.interpret_extra(&response) {
            metadata.entry(key).or_insert(value);
        }
    }
    ExistenceOutcome::Valid(metadata)
}
