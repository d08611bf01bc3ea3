use serde::Deserialize;
use std::{fs, path::Path};

pub const CONFIG_ENV: &str = "PROCUREMENT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = ".config/procurement.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub azure_openai: ChatSection,
    #[serde(default)]
    pub document_intelligence: DocumentSection,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// `[azure_openai]` — the key itself only ever comes from `AZURE_OPENAI_KEY`.
#[derive(Debug, Deserialize)]
pub struct ChatSection {
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    #[serde(default = "default_chat_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: default_chat_api_version(),
            max_completion_tokens: default_max_completion_tokens(),
        }
    }
}

fn default_chat_api_version() -> String {
    "2025-04-01-preview".to_string()
}

fn default_max_completion_tokens() -> u32 {
    1000
}

/// `[document_intelligence]` — the key comes from `AZURE_DOC_INTELLIGENCE_KEY`.
#[derive(Debug, Deserialize)]
pub struct DocumentSection {
    pub endpoint: Option<String>,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_doc_api_version")]
    pub api_version: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for DocumentSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            model_id: default_model_id(),
            api_version: default_doc_api_version(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_model_id() -> String {
    "prebuilt-invoice".to_string()
}

fn default_doc_api_version() -> String {
    "2024-11-30".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_polls() -> u32 {
    60
}

/// Everything needed to call the chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCredentials {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub max_completion_tokens: u32,
}

/// Everything needed to call the document analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCredentials {
    pub endpoint: String,
    pub api_key: String,
    pub model_id: String,
    pub api_version: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from `PROCUREMENT_CONFIG` (or the default path). A missing file at
    /// the default path falls back to built-in defaults.
    pub fn load_default() -> Result<Self, Box<dyn std::error::Error>> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn chat_credentials(&self) -> Option<ChatCredentials> {
        self.chat_credentials_from(|key| std::env::var(key).ok())
    }

    pub fn document_credentials(&self) -> Option<DocumentCredentials> {
        self.document_credentials_from(|key| std::env::var(key).ok())
    }

    /// Resolve chat credentials, letting `env` override the file. Any piece
    /// missing means the chat endpoint is unconfigured.
    pub fn chat_credentials_from(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<ChatCredentials> {
        let section = &self.azure_openai;
        Some(ChatCredentials {
            endpoint: pick(&env, "AZURE_OPENAI_ENDPOINT", section.endpoint.as_deref())?,
            api_key: pick(&env, "AZURE_OPENAI_KEY", None)?,
            deployment: pick(&env, "AZURE_OPENAI_DEPLOYMENT", section.deployment.as_deref())?,
            api_version: section.api_version.clone(),
            max_completion_tokens: section.max_completion_tokens,
        })
    }

    pub fn document_credentials_from(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<DocumentCredentials> {
        let section = &self.document_intelligence;
        Some(DocumentCredentials {
            endpoint: pick(
                &env,
                "AZURE_DOC_INTELLIGENCE_ENDPOINT",
                section.endpoint.as_deref(),
            )?,
            api_key: pick(&env, "AZURE_DOC_INTELLIGENCE_KEY", None)?,
            model_id: section.model_id.clone(),
            api_version: section.api_version.clone(),
            poll_interval_ms: section.poll_interval_ms,
            max_polls: section.max_polls,
        })
    }
}

fn pick(
    env: &impl Fn(&str) -> Option<String>,
    var: &str,
    fallback: Option<&str>,
) -> Option<String> {
    env(var)
        .or_else(|| fallback.map(str::to_string))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:3000");
        assert_eq!(cfg.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.azure_openai.api_version, "2025-04-01-preview");
        assert_eq!(cfg.azure_openai.max_completion_tokens, 1000);
        assert_eq!(cfg.document_intelligence.model_id, "prebuilt-invoice");
        assert_eq!(cfg.document_intelligence.max_polls, 60);
    }

    #[test]
    fn file_values_are_read() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0:8080"

            [azure_openai]
            endpoint = "https://example.openai.azure.com"
            deployment = "gpt-pharmacy"
            max_completion_tokens = 500

            [document_intelligence]
            poll_interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.azure_openai.deployment.as_deref(), Some("gpt-pharmacy"));
        assert_eq!(cfg.azure_openai.max_completion_tokens, 500);
        assert_eq!(cfg.document_intelligence.poll_interval_ms, 500);
        assert_eq!(cfg.document_intelligence.api_version, "2024-11-30");
    }

    #[test]
    fn chat_credentials_need_every_piece() {
        let cfg = Config::default();
        let env = env_of(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_DEPLOYMENT", "gpt"),
        ]);
        assert_eq!(cfg.chat_credentials_from(env), None);

        let env = env_of(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_DEPLOYMENT", "gpt"),
            ("AZURE_OPENAI_KEY", "secret"),
        ]);
        let creds = cfg.chat_credentials_from(env).unwrap();
        assert_eq!(creds.api_key, "secret");
        assert_eq!(creds.max_completion_tokens, 1000);
    }

    #[test]
    fn env_overrides_file_and_blank_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.document_intelligence.endpoint = Some("https://file.example".into());

        let creds = cfg
            .document_credentials_from(env_of(&[("AZURE_DOC_INTELLIGENCE_KEY", "k")]))
            .unwrap();
        assert_eq!(creds.endpoint, "https://file.example");

        let creds = cfg
            .document_credentials_from(env_of(&[
                ("AZURE_DOC_INTELLIGENCE_ENDPOINT", "https://env.example"),
                ("AZURE_DOC_INTELLIGENCE_KEY", "k"),
            ]))
            .unwrap();
        assert_eq!(creds.endpoint, "https://env.example");

        assert_eq!(
            cfg.document_credentials_from(env_of(&[("AZURE_DOC_INTELLIGENCE_KEY", "  ")])),
            None
        );
    }
}
