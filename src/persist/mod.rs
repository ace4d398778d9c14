use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::store::{EmptySecret, Entry, KeyStore};

/// One saved key as it appears in the key file.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PersistedRecord {
    pub title: String,
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
}

impl std::fmt::Debug for PersistedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedRecord")
            .field("title", &self.title)
            .field("key", &format_args!("<{} bytes>", self.key.len()))
            .finish()
    }
}

impl From<Entry> for PersistedRecord {
    fn from(e: Entry) -> Self {
        let (title, key) = e.into_parts();
        PersistedRecord { title, key }
    }
}

impl TryFrom<PersistedRecord> for Entry {
    type Error = EmptySecret;

    fn try_from(r: PersistedRecord) -> Result<Self, Self::Error> {
        Entry::new(r.title, r.key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to serialize keys: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("{} is not a valid key file: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to delete {}: {source}", .path.display())]
    Delete { path: PathBuf, source: io::Error },
}

/// The key file at a fixed path.
///
/// The file holds a JSON array of `{"title": .., "key": ..}` objects with
/// the key bytes in standard base64, and nothing else.
#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        KeyFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents of `store`, replacing any previous save.
    /// Returns the number of records written.
    pub fn save(&self, store: &KeyStore) -> Result<usize, PersistenceError> {
        let records: Vec<PersistedRecord> = store
            .snapshot()
            .into_iter()
            .map(PersistedRecord::from)
            .collect();
        self.save_records(&records)?;
        Ok(records.len())
    }

    /// Serialize `records` and move them into place atomically. A failure at
    /// any point leaves the previous file untouched.
    pub fn save_records(&self, records: &[PersistedRecord]) -> Result<(), PersistenceError> {
        let blob = serde_json::to_vec(records).map_err(PersistenceError::Serialize)?;
        let write_err = |source: io::Error| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&blob).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        info!("saved {} key(s) to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Read every saved record in order. A missing file is a first run and
    /// yields no records, and so does a file holding just `null`.
    pub fn load(&self) -> Result<Vec<PersistedRecord>, PersistenceError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no key file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let records: Option<Vec<PersistedRecord>> =
            serde_json::from_slice(&data).map_err(|source| PersistenceError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(records.unwrap_or_default())
    }

    /// Load the saved records into a fresh store. Records without key bytes
    /// can never produce a code and are skipped.
    pub fn load_store(&self) -> Result<KeyStore, PersistenceError> {
        let mut entries = Vec::new();
        for (i, record) in self.load()?.into_iter().enumerate() {
            let title = record.title.clone();
            match Entry::try_from(record) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("skipping saved record {} ({:?}): {}", i, title, e),
            }
        }
        info!("loaded {} key(s) from {}", entries.len(), self.path.display());
        Ok(KeyStore::with_entries(entries))
    }

    /// Remove the key file. Returns whether a file was actually removed.
    pub fn delete(&self) -> Result<bool, PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("deleted {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(PersistenceError::Delete {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

mod base64_bytes {
    use data_encoding::BASE64;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        BASE64.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}
