//! In-memory store for the extracted document text.
//!
//! One slot for the whole process: a new upload replaces whatever was there
//! before. The slot lives in shared app state behind an async RwLock rather
//! than a global, so a read during a concurrent upload sees either the old
//! or the new text, never a torn value. Nothing survives a restart.

use tokio::sync::RwLock;

/// Holds the text of the most recently uploaded PDF.
#[derive(Debug, Default)]
pub struct DocumentStore {
    text: RwLock<Option<String>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored text with a new document's text.
    pub async fn replace(&self, text: String) {
        let mut slot = self.text.write().await;
        *slot = Some(text);
    }

    /// The current document text, if a non-empty one is held.
    pub async fn current(&self) -> Option<String> {
        let slot = self.text.read().await;
        slot.as_ref().filter(|t| !t.is_empty()).cloned()
    }

    pub async fn is_loaded(&self) -> bool {
        self.current().await.is_some()
    }
}
