// src/llm_chat.rs

use crate::config::ChatCredentials;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// Plain text, or an array of content parts for multimodal turns.
    #[serde(default)]
    pub content: Value,
    /// Other per-message keys (`name`, ...), passed through as given.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    max_completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// A chat-completion backend. Returns the first reply, if the model gave one.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<String>, ServiceError>;
}

/// Azure OpenAI deployment reached over its REST API.
pub struct AzureChatModel {
    client: Client,
    url: String,
    api_key: String,
    max_completion_tokens: u32,
}

impl AzureChatModel {
    pub fn new(client: Client, creds: &ChatCredentials) -> Self {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            creds.endpoint.trim_end_matches('/'),
            urlencoding::encode(&creds.deployment),
            urlencoding::encode(&creds.api_version),
        );
        info!(
            deployment = %creds.deployment,
            api_version = %creds.api_version,
            "Using Azure OpenAI backend"
        );
        Self {
            client,
            url,
            api_key: creds.api_key.clone(),
            max_completion_tokens: creds.max_completion_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for AzureChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<String>, ServiceError> {
        let request = ChatRequest {
            messages,
            max_completion_tokens: self.max_completion_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        let reply = first_reply(chat_response);
        if reply.is_none() {
            warn!("Chat model returned no content");
        }
        Ok(reply)
    }
}

fn first_reply(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}

/// Current UTC date as `YYYY-MM-DD`.
pub fn today_utc() -> String {
    let date = OffsetDateTime::now_utc().date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// System prompt that grounds the model in the uploaded stock.
pub fn build_system_prompt(stock_csv: &str, today: &str) -> String {
    format!(
        r#"You are a procurement decision support assistant for a hospital pharmacy.
You help analyze drug inventory data and provide insights for procurement decisions.

Here is the current stock data (CSV format):
{stock_csv}

Key columns:
- drug_name: Name of the drug
- quantity: Current stock quantity
- reorder_level: Minimum stock level before reorder is needed
- strength: Drug strength/dosage
- dosage_form: Form (Tablet, Injection, etc.)
- reorder_quantity: Standard reorder amount
- location: Storage location
- batch_number: Batch identifier
- expiry_date: Expiration date (YYYY-MM-DD format)

When analyzing stockout risk, compare quantity to reorder_level.
A drug is at risk if quantity <= reorder_level.
Today's date is {today}.

Provide clear, actionable insights. Use tables when helpful."#
    )
}
