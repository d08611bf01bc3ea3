use async_trait::async_trait;
use std::sync::RwLock;

/// Holder for the most recently uploaded stock CSV.
///
/// Handlers only talk to this trait, so the in-memory slot can be swapped for
/// a shared store when more than one instance serves the same users.
#[async_trait]
pub trait CsvStore: Send + Sync {
    /// Replace whatever is stored. Callers validate before calling.
    async fn set(&self, content: String);

    async fn get(&self) -> Option<String>;

    async fn clear(&self);

    async fn has_value(&self) -> bool {
        self.get().await.is_some()
    }
}

/// Process-local slot. Last write wins; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCsvStore {
    content: RwLock<Option<String>>,
}

impl MemoryCsvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CsvStore for MemoryCsvStore {
    async fn set(&self, content: String) {
        // A poisoned lock still holds a complete value; keep using it.
        let mut slot = self.content.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(content);
    }

    async fn get(&self) -> Option<String> {
        self.content
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn clear(&self) {
        *self.content.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    async fn has_value(&self) -> bool {
        self.content
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
