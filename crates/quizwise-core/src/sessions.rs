//! Durable per-client session storage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::session::QuizSession;
use crate::statistics::write_atomic;

/// Keeps each client's quiz session between requests.
///
/// Saves replace the whole session; concurrent saves for one client are
/// last-write-wins.
pub trait SessionStore: Send + Sync {
    fn load(&self, client_id: &str) -> Result<Option<QuizSession>, StorageError>;
    fn save(&self, client_id: &str, session: &QuizSession) -> Result<(), StorageError>;
    fn remove(&self, client_id: &str) -> Result<(), StorageError>;
}

/// Sessions held in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, QuizSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, client_id: &str) -> Result<Option<QuizSession>, StorageError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| StorageError::Poisoned("sessions"))?;
        Ok(sessions.get(client_id).cloned())
    }

    fn save(&self, client_id: &str, session: &QuizSession) -> Result<(), StorageError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| StorageError::Poisoned("sessions"))?;
        sessions.insert(client_id.to_string(), session.clone());
        Ok(())
    }

    fn remove(&self, client_id: &str) -> Result<(), StorageError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| StorageError::Poisoned("sessions"))?;
        sessions.remove(client_id);
        Ok(())
    }
}

/// One JSON file per client under a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, client_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(client_id)))
    }
}

/// Map a client id onto a safe file stem, one-to-one.
///
/// ASCII letters, digits and `-` pass through; every other byte becomes
/// `_XX` (uppercase hex). The empty id is the lone `_`, which no escape
/// produces.
fn sanitize(client_id: &str) -> String {
    if client_id.is_empty() {
        return "_".to_string();
    }
    let mut stem = String::with_capacity(client_id.len());
    for byte in client_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{byte:02X}"));
        }
    }
    stem
}

impl SessionStore for FileSessionStore {
    fn load(&self, client_id: &str) -> Result<Option<QuizSession>, StorageError> {
        let path = self.path_for(client_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StorageError::Parse { path, source })
    }

    fn save(&self, client_id: &str, session: &QuizSession) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(session)?;
        write_atomic(&self.path_for(client_id), json.as_bytes())
    }

    fn remove(&self, client_id: &str) -> Result<(), StorageError> {
        let path = self.path_for(client_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write { path, source }),
        }
    }
}
