//! Key-value configuration store and the last-conversation archive.
//!
//! The workflow reads credentials through [`ConfigStore`] at the start of
//! every step, so a save between steps takes effect immediately.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::CredentialSet;
use crate::error::{Error, Result};
use crate::session::SessionState;

/// Persistence for credentials and the diagnostics archive.
pub trait ConfigStore: Send + Sync {
    /// Currently stored credentials.
    fn credentials(&self) -> Result<CredentialSet>;

    /// Replace the stored credentials.
    fn save_credentials(&self, credentials: &CredentialSet) -> Result<()>;

    /// Overwrite the archived conversation.
    fn save_last_conversation(&self, session: &SessionState) -> Result<()>;

    /// The archived conversation, if one was saved.
    fn last_conversation(&self) -> Result<Option<SessionState>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    credentials: CredentialSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_conversation: Option<SessionState>,
}

fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::storage("store lock poisoned")
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Document>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `credentials`.
    pub fn with_credentials(credentials: CredentialSet) -> Self {
        Self {
            inner: RwLock::new(Document {
                credentials: credentials.normalized(),
                last_conversation: None,
            }),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn credentials(&self) -> Result<CredentialSet> {
        Ok(self.inner.read().map_err(poisoned)?.credentials.clone())
    }

    fn save_credentials(&self, credentials: &CredentialSet) -> Result<()> {
        self.inner.write().map_err(poisoned)?.credentials = credentials.clone().normalized();
        Ok(())
    }

    fn save_last_conversation(&self, session: &SessionState) -> Result<()> {
        self.inner.write().map_err(poisoned)?.last_conversation = Some(session.clone());
        Ok(())
    }

    fn last_conversation(&self) -> Result<Option<SessionState>> {
        Ok(self.inner.read().map_err(poisoned)?.last_conversation.clone())
    }
}

/// Store backed by one JSON document on disk.
///
/// A missing file reads as an empty store; the file is created on first save.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    guard: Mutex<()>,
}

impl JsonFileStore {
    /// Store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.guard.lock().map_err(poisoned)
    }

    fn load(&self) -> Result<Document> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::default()),
            Err(e) => return Err(Error::storage(format!("{}: {e}", self.path.display()))),
        };
        if text.trim().is_empty() {
            return Ok(Document::default());
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::storage(format!("{}: {e}", self.path.display())))
    }

    fn write(&self, document: &Document) -> Result<()> {
        let text = serde_json::to_string_pretty(document)
            .map_err(|e| Error::storage(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::storage(format!("{}: {e}", parent.display())))?;
        }
        fs::write(&self.path, text)
            .map_err(|e| Error::storage(format!("{}: {e}", self.path.display())))
    }

    fn update(&self, edit: impl FnOnce(&mut Document)) -> Result<()> {
        let _guard = self.lock()?;
        let mut document = self.load()?;
        edit(&mut document);
        self.write(&document)
    }
}

impl ConfigStore for JsonFileStore {
    fn credentials(&self) -> Result<CredentialSet> {
        let _guard = self.lock()?;
        Ok(self.load()?.credentials.normalized())
    }

    fn save_credentials(&self, credentials: &CredentialSet) -> Result<()> {
        let credentials = credentials.clone().normalized();
        self.update(|doc| doc.credentials = credentials)
    }

    fn save_last_conversation(&self, session: &SessionState) -> Result<()> {
        self.update(|doc| doc.last_conversation = Some(session.clone()))
    }

    fn last_conversation(&self) -> Result<Option<SessionState>> {
        let _guard = self.lock()?;
        Ok(self.load()?.last_conversation)
    }
}
