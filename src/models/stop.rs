//! Bus stop identifiers and the configured stop catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// Identifier of one physical stop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(String);

impl StopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed set of stops a rider can select.
#[derive(Debug, Clone, Default)]
pub struct StopCatalog {
    stops: Vec<StopId>,
}

impl StopCatalog {
    pub fn new<I, S>(stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stops: stops.into_iter().map(StopId::new).collect(),
        }
    }

    pub fn stops(&self) -> &[StopId] {
        &self.stops
    }

    /// Resolve a rider-entered stop name against the catalog.
    pub fn resolve(&self, name: &str) -> Result<StopId, AppError> {
        let name = name.trim();
        self.stops
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| AppError::UnknownStop(name.to_string()))
    }
}
