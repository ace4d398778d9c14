//! The shared, ordered collection of active keys.
//!
//! Every entry keeps its label and its secret together, so the position of
//! an entry is the only index anyone needs. All access goes through one
//! mutex that is held only for the duration of a single operation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Returned when an entry would be created without key bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("key secret must not be empty")]
pub struct EmptySecret;

/// One managed secret key plus its display label. The secret is never
/// empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Entry {
    label: String,
    secret: Vec<u8>,
}

impl Entry {
    pub fn new(label: impl Into<String>, secret: Vec<u8>) -> Result<Self, EmptySecret> {
        if secret.is_empty() {
            return Err(EmptySecret);
        }
        Ok(Entry {
            label: label.into(),
            secret,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.label, self.secret)
    }

    /// Text shown next to the code. Unlabelled entries fall back to their
    /// 1-based position in the store.
    pub fn display_label(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("key: {}", index + 1)
        } else {
            format!("key: {}", self.label)
        }
    }
}

// Secrets stay out of debug output and therefore out of the logs.
impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("label", &self.label)
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .finish()
    }
}

/// Cheaply clonable handle to the process-wide key list.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store already holding `entries`, in order.
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        KeyStore {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        // Operations never leave the vector half-updated, so a panic in
        // another holder does not invalidate the data.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an entry at the end and return its index.
    pub fn append(&self, entry: Entry) -> usize {
        let mut entries = self.lock();
        entries.push(entry);
        entries.len() - 1
    }

    /// Pop the most recently appended entry, `None` when empty.
    pub fn remove_last(&self) -> Option<Entry> {
        self.lock().pop()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> Vec<Entry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
