// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON-file and in-memory implementations of [`StateStore`].

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::db::{ClientState, StateStore, StoreError};

/// State kept in a single JSON document on disk.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<ClientState, StoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ClientState::default()),
            Err(e) => return Err(e.into()),
        };

        if data.trim().is_empty() {
            return Ok(ClientState::default());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, state: &ClientState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            serde_json::to_writer_pretty(&mut file, state)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Client state saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(path = %self.path.display(), "Client state cleared");
        Ok(())
    }
}

/// In-memory store for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<ClientState>,
}

impl MemoryStateStore {
    pub fn new(state: ClientState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_token(token: &str) -> Self {
        Self::new(ClientState {
            id_token: Some(token.to_string()),
            ..ClientState::default()
        })
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> ClientState {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<ClientState, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &ClientState) -> Result<(), StoreError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ClientState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StopId, TripState};

    #[test]
    fn test_memory_store_trip_state_roundtrip() {
        let store = MemoryStateStore::with_token("tok");
        let trip = TripState::active(StopId::new("Library"), 42);

        store.save_trip_state(&trip).unwrap();

        assert_eq!(store.load_trip_state().unwrap(), trip);
        assert_eq!(store.load_token().unwrap().as_deref(), Some("tok"));

        store.clear().unwrap();
        assert_eq!(store.snapshot(), ClientState::default());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let store = FileStateStore::new("/var/lib/checkin/state.json");
        assert_eq!(
            store.temp_path(),
            PathBuf::from("/var/lib/checkin/state.json.tmp")
        );
    }
}
