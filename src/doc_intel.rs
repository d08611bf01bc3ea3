// src/doc_intel.rs

use crate::config::DocumentCredentials;
use crate::error::ServiceError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

/// Submits a document for invoice analysis and waits for the service to finish.
///
/// The returned JSON is the terminal analyze-operation body (`status`,
/// `analyzeResult`, ...), whatever the terminal status was.
#[async_trait]
pub trait InvoiceAnalyzer: Send + Sync {
    async fn analyze(&self, document: &[u8]) -> Result<Value, ServiceError>;
}

/// Azure Document Intelligence, `prebuilt-invoice` by default.
pub struct AzureInvoiceAnalyzer {
    client: Client,
    analyze_url: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AzureInvoiceAnalyzer {
    pub fn new(client: Client, creds: &DocumentCredentials) -> Self {
        let analyze_url = format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            creds.endpoint.trim_end_matches('/'),
            urlencoding::encode(&creds.model_id),
            urlencoding::encode(&creds.api_version),
        );
        info!(model = %creds.model_id, "Using Azure Document Intelligence backend");
        Self {
            client,
            analyze_url,
            api_key: creds.api_key.clone(),
            poll_interval: Duration::from_millis(creds.poll_interval_ms),
            max_polls: creds.max_polls,
        }
    }
}

fn is_terminal(status: &str) -> bool {
    matches!(status, "succeeded" | "failed" | "canceled")
}

#[async_trait]
impl InvoiceAnalyzer for AzureInvoiceAnalyzer {
    async fn analyze(&self, document: &[u8]) -> Result<Value, ServiceError> {
        let body = json!({ "base64Source": STANDARD.encode(document) });

        let response = self
            .client
            .post(&self.analyze_url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Rejected { status, body });
        }

        let operation_url = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Malformed("no Operation-Location in response".into()))?
            .to_string();

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let poll = self
                .client
                .get(&operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.api_key)
                .send()
                .await?;

            let status = poll.status();
            if !status.is_success() {
                let body = poll.text().await.unwrap_or_default();
                return Err(ServiceError::Status { status, body });
            }

            let operation: Value = poll.json().await?;
            let state = operation
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("");

            if is_terminal(state) {
                info!(attempt, status = state, "Invoice analysis finished");
                return Ok(operation);
            }
            debug!(attempt, status = state, "Invoice analysis still running");
        }

        Err(ServiceError::Timeout {
            polls: self.max_polls,
        })
    }
}
