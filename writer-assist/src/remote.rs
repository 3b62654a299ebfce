//! HTTP collaborators: the AI rewrite endpoint, dismissal feedback, snapshot
//! persistence and telemetry upload.
//!
//! Everything except [`HttpGenerator`] is fire-and-forget. Responses are
//! logged and never required for correctness.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_types::{Suggestion, TelemetryEvent};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AssistConfig;
use crate::snapshots::DocumentSnapshot;
use crate::suggestion::{DismissListener, GenerationError, GenerationRequest, SuggestionGenerator};
use crate::telemetry::TelemetrySink;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("failed to build http client: {0}")]
    Client(String),
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("writer-assist/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RemoteError::Client(e.to_string()))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[derive(Serialize)]
struct RewriteRequest<'a> {
    text: &'a str,
    action: &'a str,
    tone: Option<&'a str>,
}

#[derive(Deserialize)]
struct RewriteResponse {
    text: String,
}

/// Generation over `POST {base}/rewrite`
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
    timeout_ms: u64,
}

impl HttpGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "rewrite"),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// `None` when no service is configured or the client cannot be built.
    pub fn from_config(config: &AssistConfig) -> Option<Self> {
        let base_url = config.service.base_url.as_deref()?;
        match Self::new(base_url, config.service.timeout()) {
            Ok(generator) => Some(generator),
            Err(e) => {
                warn!(base_url, error = %e, "Remote generator unavailable");
                None
            }
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout_ms)
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl SuggestionGenerator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = RewriteRequest {
            text: &request.original_text,
            action: request.action_kind.as_str(),
            tone: request.tone_hint.as_deref(),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16()));
        }
        let parsed: RewriteResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout_ms)
            } else {
                GenerationError::Parse(e.to_string())
            }
        })?;
        if parsed.text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        debug!(action = body.action, chars = parsed.text.len(), "Remote rewrite received");
        Ok(parsed.text)
    }
}

/// Spawn a best-effort POST. `None` outside a tokio runtime.
fn spawn_post(
    client: &reqwest::Client,
    url: String,
    body: serde_json::Value,
) -> Option<JoinHandle<bool>> {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!(url = %url, "No runtime; dropping best-effort POST");
        return None;
    };
    let client = client.clone();
    Some(handle.spawn(async move {
        match client.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(url = %url, status = response.status().as_u16(), "Best-effort POST rejected");
                false
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Best-effort POST failed");
                false
            }
        }
    }))
}

/// "Do not show again" and snapshot persistence endpoints
#[derive(Debug, Clone)]
pub struct RemoteFeedback {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteFeedback {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AssistConfig) -> Option<Self> {
        let base_url = config.service.base_url.as_deref()?;
        Self::new(base_url, config.service.timeout())
            .map_err(|e| warn!(base_url, error = %e, "Remote feedback unavailable"))
            .ok()
    }

    pub fn notify_dismissed(
        &self,
        doc_id: &str,
        suggestion: &Suggestion,
    ) -> Option<JoinHandle<bool>> {
        spawn_post(
            &self.client,
            endpoint(&self.base_url, "suggestions/dismissed"),
            json!({
                "doc_id": doc_id,
                "suggestion_id": suggestion.id,
                "action_kind": suggestion.action_kind,
                "original_text": suggestion.original_text,
            }),
        )
    }

    pub fn post_snapshot(
        &self,
        doc_id: &str,
        snapshot: &DocumentSnapshot,
    ) -> Option<JoinHandle<bool>> {
        spawn_post(
            &self.client,
            endpoint(&self.base_url, "snapshots"),
            json!({ "doc_id": doc_id, "snapshot": snapshot }),
        )
    }
}

impl DismissListener for RemoteFeedback {
    fn suggestion_dismissed(&self, doc_id: &str, suggestion: &Suggestion) {
        let _ = self.notify_dismissed(doc_id, suggestion);
    }
}

/// Uploads each event to `POST {base}/telemetry`
#[derive(Debug, Clone)]
pub struct HttpTelemetry {
    client: reqwest::Client,
    url: String,
}

impl HttpTelemetry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "telemetry"),
        })
    }
}

impl TelemetrySink for HttpTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        match serde_json::to_value(&event) {
            Ok(body) => {
                let _ = spawn_post(&self.client, self.url.clone(), body);
            }
            Err(e) => debug!(name = %event.name, error = %e, "Telemetry event not serializable"),
        }
    }
}
