mod config;
mod doc_intel;
mod error;
mod invoice_map;
mod llm_chat;
mod routes;
mod stock;
mod upload_store;

use doc_intel::{AzureInvoiceAnalyzer, InvoiceAnalyzer};
use llm_chat::{AzureChatModel, ChatModel};
use routes::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use upload_store::MemoryCsvStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env may carry RUST_LOG as well as the service keys
    let _ = dotenvy::dotenv();

    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::Config::load_default()?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.server.request_timeout_secs))
        .build()?;

    let chat: Option<Arc<dyn ChatModel>> = match cfg.chat_credentials() {
        Some(creds) => {
            let model = AzureChatModel::new(client.clone(), &creds);
            Some(Arc::new(model) as Arc<dyn ChatModel>)
        }
        None => {
            warn!("Azure OpenAI credentials missing; /api/chat will return 500");
            None
        }
    };

    let invoices: Option<Arc<dyn InvoiceAnalyzer>> = match cfg.document_credentials() {
        Some(creds) => {
            let analyzer = AzureInvoiceAnalyzer::new(client, &creds);
            Some(Arc::new(analyzer) as Arc<dyn InvoiceAnalyzer>)
        }
        None => {
            warn!(
                "Azure Document Intelligence credentials missing; \
                 /api/extract-invoice will return 500"
            );
            None
        }
    };

    let state = Arc::new(AppState {
        store: Arc::new(MemoryCsvStore::new()),
        chat,
        invoices,
    });
    let app = routes::router(state, cfg.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind).await?;
    info!(
        addr = %cfg.server.bind,
        max_upload_bytes = cfg.server.max_upload_bytes,
        "Procurement assistant listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
