//! Sends transformed payloads to their target and records every attempt.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;

use crate::config::ForwardConfig;
use crate::errors::DeliveryError;
use crate::observer::{Observer, RelayEvent, TracingObserver};
use crate::sink::{DeliveryRecord, DeliverySink, TRANSPORT_FAILED};

/// What the target answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: String,
}

impl DeliveryResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct Forwarder {
    client: Client,
    sink: Arc<dyn DeliverySink>,
    observer: Arc<dyn Observer>,
}

impl Forwarder {
    pub fn new(config: &ForwardConfig, sink: Arc<dyn DeliverySink>) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;
        Ok(Self {
            client,
            sink,
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// POST `transformed` to `target_url` once, without retrying.
    ///
    /// Any HTTP answer is `Ok`, including non-2xx statuses. Only a failure
    /// to get an answer is an error. Either way exactly one
    /// [`DeliveryRecord`] reaches the sink.
    pub async fn forward(
        &self,
        webhook_id: &str,
        target_url: &str,
        source: &Value,
        transformed: &Value,
    ) -> Result<DeliveryResponse, DeliveryError> {
        tracing::debug!(%webhook_id, %target_url, "forwarding webhook");
        let payload = transformed.to_string();

        let result = self.send(target_url, payload.clone()).await;
        let (response_code, response_body) = match &result {
            Ok(response) => {
                self.observer.observe(RelayEvent::Delivered {
                    webhook_id: webhook_id.to_string(),
                    status: response.status,
                });
                (response.status, response.body.clone())
            }
            Err(message) => {
                self.observer.observe(RelayEvent::DeliveryFailed {
                    webhook_id: webhook_id.to_string(),
                    error: message.clone(),
                });
                (TRANSPORT_FAILED, format!("Error: {message}"))
            }
        };

        let record = DeliveryRecord {
            webhook_id: webhook_id.to_string(),
            source_payload: source.to_string(),
            payload,
            response_code,
            response_body,
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.sink.record(record).await {
            self.observer.observe(RelayEvent::SinkFailed {
                webhook_id: webhook_id.to_string(),
                error: e.to_string(),
            });
        }

        result.map_err(DeliveryError::Transport)
    }

    async fn send(&self, target_url: &str, payload: String) -> Result<DeliveryResponse, String> {
        let response = self
            .client
            .post(target_url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| error_chain(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| error_chain(&e))?;
        Ok(DeliveryResponse { status, body })
    }
}

/// `reqwest` keeps the useful part (refused, timed out, dns) in the source
/// chain, so flatten it into one line.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
