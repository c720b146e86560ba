//! JSON file backed session store

use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use super::{SessionState, SessionStore, StoreError};

const SESSION_FILE_NAME: &str = "inpaint_session.json";

#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Store under `<data dir>/artbot/inpaint_session.json`
    pub fn in_data_dir() -> Self {
        Self::new(crate::config::data_dir().join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> SessionState {
        if !self.path.exists() {
            return SessionState::default();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                tracing::warn!("Discarding unreadable session {}: {}", self.path.display(), err);
                SessionState::default()
            }),
            Err(err) => {
                tracing::warn!("Failed to load session {}: {}", self.path.display(), err);
                SessionState::default()
            }
        }
    }

    fn write(&self, state: &SessionState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(state)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> SessionState {
        let _guard = self.lock.lock();
        self.read()
    }

    fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        self.write(state)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut SessionState)) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut state = self.read();
        apply(&mut state);
        self.write(&state)
    }
}
