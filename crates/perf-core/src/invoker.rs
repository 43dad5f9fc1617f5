use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Result of one path-A call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    pub success: bool,
    pub elapsed: Duration,
}

/// Adapter that performs one conventional request/response call.
pub trait PathInvoker: Send + Sync {
    fn name(&self) -> &'static str;

    fn invoke(&self) -> Pin<Box<dyn Future<Output = Result<Invocation>> + Send + '_>>;
}

/// Simulated endpoint with a fixed latency. Always succeeds.
pub struct MockInvoker {
    latency: Duration,
}

impl MockInvoker {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency: Duration::from_millis(latency_ms),
        }
    }
}

impl PathInvoker for MockInvoker {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn invoke(&self) -> Pin<Box<dyn Future<Output = Result<Invocation>> + Send + '_>> {
        Box::pin(async move {
            let start = Instant::now();
            sleep(self.latency).await;
            Ok(Invocation {
                success: true,
                elapsed: start.elapsed(),
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// JSON body sent with a POST.
#[derive(Debug, Clone, PartialEq)]
pub enum RestBody {
    /// Sent as is on every call.
    Fixed(serde_json::Value),
    /// `{ field: "<prefix><0..1000>" }`, drawn fresh for every call.
    RandomName { field: String, prefix: String },
}

impl RestBody {
    pub fn render(&self, rng: &mut impl Rng) -> serde_json::Value {
        match self {
            RestBody::Fixed(value) => value.clone(),
            RestBody::RandomName { field, prefix } => {
                let mut body = serde_json::Map::new();
                body.insert(
                    field.clone(),
                    serde_json::Value::String(format!("{prefix}{}", rng.gen_range(0..1000))),
                );
                serde_json::Value::Object(body)
            }
        }
    }
}

/// One REST call in the rotation.
#[derive(Debug, Clone)]
pub struct RestCall {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<RestBody>,
}

impl RestCall {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(RestBody::Fixed(body)),
        }
    }

    pub fn post_random_name(
        path: impl Into<String>,
        field: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(RestBody::RandomName {
                field: field.into(),
                prefix: prefix.into(),
            }),
        }
    }
}

/// HTTP/JSON invoker cycling through a fixed list of calls against
/// round-robin base URLs.
pub struct HttpJsonInvoker {
    client: reqwest::Client,
    urls: Vec<url::Url>,
    calls: Vec<RestCall>,
    next_url: AtomicUsize,
    next_call: AtomicUsize,
}

impl HttpJsonInvoker {
    pub fn new(base_urls: &[String], timeout_ms: u64, calls: Vec<RestCall>) -> Result<Self> {
        if calls.is_empty() {
            anyhow::bail!("HTTP invoker needs at least one call");
        }
        let urls = base_urls
            .iter()
            .map(|u| url::Url::parse(u).with_context(|| format!("Invalid base URL: {u}")))
            .collect::<Result<Vec<_>>>()?;
        if urls.is_empty() {
            anyhow::bail!("HTTP invoker needs at least one base URL");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            urls,
            calls,
            next_url: AtomicUsize::new(0),
            next_call: AtomicUsize::new(0),
        })
    }

    fn next_target(&self) -> Result<(url::Url, &RestCall)> {
        let url_idx = self.next_url.fetch_add(1, Ordering::Relaxed);
        let call_idx = self.next_call.fetch_add(1, Ordering::Relaxed);
        let base = &self.urls[url_idx % self.urls.len()];
        let call = &self.calls[call_idx % self.calls.len()];
        let url = base
            .join(&call.path)
            .with_context(|| format!("Cannot join {} onto {}", call.path, base))?;
        Ok((url, call))
    }
}

impl HttpJsonInvoker {
    async fn call(&self) -> Result<Invocation> {
        let (url, call) = self.next_target()?;
        let body = call
            .body
            .as_ref()
            .map(|body| body.render(&mut rand::thread_rng()));
        let start = Instant::now();

        let request = match call.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => {
                let builder = self.client.post(url);
                match &body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let response = request.send().await?;
        // 4xx, 5xx and a body that cannot be read in full count as failed
        // executions, not as errors.
        let status = response.status();
        let status_ok = !(status.is_client_error() || status.is_server_error());
        let body_ok = match response.bytes().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Failed to read response body: {}", e);
                false
            }
        };
        let success = status_ok && body_ok;

        Ok(Invocation {
            success,
            elapsed: start.elapsed(),
        })
    }
}

impl PathInvoker for HttpJsonInvoker {
    fn name(&self) -> &'static str {
        "http"
    }

    fn invoke(&self) -> Pin<Box<dyn Future<Output = Result<Invocation>> + Send + '_>> {
        Box::pin(self.call())
    }
}
