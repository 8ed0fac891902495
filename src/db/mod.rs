//! Durable client-side state (bearer token and trip state).

pub mod file_store;

pub use file_store::{FileStateStore, MemoryStateStore};

use serde::{Deserialize, Serialize};

use crate::models::{PersistedTripState, TripState};

/// Everything the client keeps across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    /// Identity provider ID token
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub trip: PersistedTripState,
}

/// Durable key-value area for [`ClientState`].
///
/// Implementations must make `save` and `clear` atomic: a reader sees either
/// the old document or the new one.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<ClientState, StoreError>;

    fn save(&self, state: &ClientState) -> Result<(), StoreError>;

    /// Remove everything (logout).
    fn clear(&self) -> Result<(), StoreError>;

    fn load_trip_state(&self) -> Result<TripState, StoreError> {
        Ok(self.load()?.trip.into())
    }

    fn save_trip_state(&self, trip: &TripState) -> Result<(), StoreError> {
        let mut state = self.load()?;
        state.trip = trip.into();
        self.save(&state)
    }

    fn load_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.id_token)
    }

    fn save_token(&self, token: &str) -> Result<(), StoreError> {
        let mut state = self.load()?;
        state.id_token = Some(token.to_string());
        self.save(&state)
    }
}

/// State storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt state document: {0}")]
    Corrupt(#[from] serde_json::Error),
}
