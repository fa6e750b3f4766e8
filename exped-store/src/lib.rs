use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use exped_types::{CaseId, CaseRecord, TokenRow};

pub mod memory;
pub use memory::InMemoryRecordStore;

pub mod postgrest;
pub use postgrest::{PostgrestConfig, PostgrestRecordStore};

/// Default id column of the case table.
pub const CASE_ID_COLUMN: &str = "id_";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("store response could not be decoded: {0}")]
    Decode(String),
    #[error("fixture error: {0}")]
    Fixture(String),
}

/// External record store holding the token and case tables.
///
/// Each call is one independent round trip. Implementations give no
/// cross-call atomicity; callers must not assume a read-then-write pair is
/// isolated from concurrent writers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_token(&self, token: &str) -> Result<Option<TokenRow>, StoreError>;

    async fn insert_token(&self, row: TokenRow) -> Result<(), StoreError>;

    /// Set `used_at` on a token.
    async fn mark_token_used(&self, token: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn find_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, StoreError>;

    /// Write `changes` onto the case row in a single update.
    async fn update_case(&self, id: &CaseId, changes: &Map<String, Value>) -> Result<(), StoreError>;
}

/// Seed data for a store, read from YAML (or JSON, which YAML accepts).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub tokens: Vec<TokenRow>,
    #[serde(default)]
    pub cases: Vec<CaseRecord>,
}

impl Fixture {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("{}: {e}", path.display())))?;
        serde_yaml::from_str(&text).map_err(|e| StoreError::Fixture(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let text = serde_yaml::to_string(self).map_err(|e| StoreError::Fixture(e.to_string()))?;
        fs::write(path, text).map_err(|e| StoreError::Fixture(format!("{}: {e}", path.display())))
    }
}
