//! HTTP handlers for the procurement assistant API.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use serde::Serialize;
use serde_json::Value;
use tracing::{Instrument, info, info_span, warn};

use crate::doc_intel::InvoiceAnalyzer;
use crate::error::{ApiError, ServiceError};
use crate::invoice_map::{ExtractionResult, map_fields};
use crate::llm_chat::{ChatMessage, ChatModel, build_system_prompt, today_utc};
use crate::stock::{self, Record, StockItem};
use crate::upload_store::CsvStore;

pub const NO_CSV_UPLOADED: &str = "No CSV uploaded. Please upload a stock CSV first.";

/// Shared handler state. A `None` backend means its credentials were not
/// configured; the matching endpoint answers 500 until they are.
pub struct AppState {
    pub store: Arc<dyn CsvStore>,
    pub chat: Option<Arc<dyn ChatModel>>,
    pub invoices: Option<Arc<dyn InvoiceAnalyzer>>,
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    use axum::routing::{get, post};
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/upload-csv",
            post(upload_csv).get(upload_status).delete(clear_upload),
        )
        .route("/api/stock", get(get_stock))
        .route("/api/chat", post(chat))
        .route("/api/extract-invoice", post(extract_invoice))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

struct UploadedFile {
    name: String,
    bytes: Bytes,
}

/// Pull the `file` part out of a multipart body. A body that is not
/// multipart at all counts as no file.
async fn read_file_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<UploadedFile>, ApiError> {
    let Ok(mut multipart) = multipart else {
        return Ok(None);
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?;
        return Ok(Some(UploadedFile { name, bytes }));
    }
    Ok(None)
}

// -- /api/upload-csv --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: &'static str,
    file_name: String,
    size: usize,
}

async fn upload_csv(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = read_file_field(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;

    if !file.name.ends_with(".csv") {
        return Err(ApiError::bad_request("File must be a CSV"));
    }

    let content = String::from_utf8_lossy(&file.bytes).into_owned();
    if content.trim().is_empty() {
        return Err(ApiError::bad_request("CSV file is empty"));
    }

    let size = file.bytes.len();
    state.store.set(content).await;
    info!(file = %file.name, size, "Stored uploaded CSV");

    Ok(Json(UploadResponse {
        message: "CSV uploaded successfully",
        file_name: file.name,
        size,
    }))
}

#[derive(Serialize)]
struct UploadStatus {
    uploaded: bool,
}

async fn upload_status(State(state): State<Arc<AppState>>) -> Json<UploadStatus> {
    Json(UploadStatus {
        uploaded: state.store.has_value().await,
    })
}

#[derive(Serialize)]
struct Message {
    message: String,
}

async fn clear_upload(State(state): State<Arc<AppState>>) -> Json<Message> {
    state.store.clear().await;
    info!("Cleared uploaded CSV");
    Json(Message {
        message: "Uploaded CSV cleared".to_string(),
    })
}

// -- /api/stock --

async fn get_stock(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Record>>, ApiError> {
    let raw = state.store.get().await;
    let records = stock::load_stock(raw.as_deref()).map_err(|e| {
        warn!(error = %e, "Stored CSV could not be parsed");
        ApiError::Internal("Failed to load stock data".to_string())
    })?;
    Ok(Json(records))
}

// -- /api/chat --

async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let messages: Vec<ChatMessage> = body
        .ok()
        .and_then(|Json(mut body)| body.get_mut("messages").map(Value::take))
        .filter(Value::is_array)
        .and_then(|messages| serde_json::from_value(messages).ok())
        .ok_or_else(|| ApiError::bad_request("Messages array required"))?;

    let raw = state
        .store
        .get()
        .await
        .ok_or_else(|| ApiError::bad_request(NO_CSV_UPLOADED))?;

    let model = state.chat.as_ref().ok_or(ApiError::NotConfigured(
        "Azure OpenAI credentials not configured",
    ))?;

    let records = stock::load_stock(Some(&raw))
        .map_err(|e| ApiError::Internal(format!("Chat error: {e}")))?;
    let at_risk = records
        .iter()
        .map(StockItem::from)
        .filter(StockItem::is_at_risk)
        .count();

    let prompt = build_system_prompt(&stock::stock_to_csv(&records), &today_utc());
    let mut outgoing = Vec::with_capacity(messages.len() + 1);
    outgoing.push(ChatMessage::system(prompt));
    outgoing.extend(messages);

    let span = info_span!("chat", messages = outgoing.len(), rows = records.len(), at_risk);
    let reply = model
        .complete(&outgoing)
        .instrument(span)
        .await
        .map_err(|e| ApiError::Internal(format!("Chat error: {e}")))?;

    Ok(Json(Message {
        message: reply.unwrap_or_default(),
    }))
}

// -- /api/extract-invoice --

async fn extract_invoice(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let file = read_file_field(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let analyzer = state.invoices.as_ref().ok_or(ApiError::NotConfigured(
        "Azure Document Intelligence credentials not configured",
    ))?;

    let span = info_span!("extract_invoice", file = %file.name, bytes = file.bytes.len());
    let operation = analyzer
        .analyze(&file.bytes)
        .instrument(span)
        .await
        .map_err(|e| match e {
            ServiceError::Rejected { status, body } => {
                warn!(%status, body = %body, "Document service refused the invoice");
                ApiError::Internal("Failed to analyze document".to_string())
            }
            other => ApiError::Internal(format!("Failed to extract invoice: {other}")),
        })?;

    let result = map_fields(&operation).map_err(|e| {
        warn!(error = %e, "Invoice analysis yielded nothing");
        ApiError::bad_request("No invoice data could be extracted")
    })?;

    let (filled, total) = result.coverage();
    info!(
        filled,
        total,
        invoice_id = ?result.invoice_id,
        items = result.items.len(),
        "Invoice extracted"
    );
    Ok(Json(result))
}
