// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Auto-saved draft of the post being composed.

use crate::store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const TITLE_KEY: &str = "draftTitle";
const CONTENT_KEY: &str = "draftContent";

/// Saved draft fields. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl Draft {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Draft persistence on top of the shared key-value store.
#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn KvStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn save_title(&self, title: &str) -> Result<(), StoreError> {
        self.store.set(TITLE_KEY, title)
    }

    pub fn save_content(&self, content: &str) -> Result<(), StoreError> {
        self.store.set(CONTENT_KEY, content)
    }

    pub fn load(&self) -> Draft {
        Draft {
            title: self.store.get(TITLE_KEY),
            content: self.store.get(CONTENT_KEY),
        }
    }

    /// Remove both fields, typically after a successful publish.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(TITLE_KEY)?;
        self.store.remove(CONTENT_KEY)?;
        debug!("Draft cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_save_load_clear() {
        let drafts = DraftStore::new(Arc::new(MemoryStore::new()));
        assert!(drafts.load().is_empty());

        drafts.save_title("Work in progress").unwrap();
        assert_eq!(
            drafts.load(),
            Draft {
                title: Some("Work in progress".to_string()),
                content: None,
            }
        );

        drafts.save_content("<p>Body</p>").unwrap();
        assert_eq!(drafts.load().content.as_deref(), Some("<p>Body</p>"));

        drafts.clear().unwrap();
        assert!(drafts.load().is_empty());
    }
}
