use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use exped_types::{CaseId, CaseRecord, TokenRow};

use crate::{Fixture, RecordStore, StoreError, CASE_ID_COLUMN};

/// In-memory token and case tables.
///
/// Used for local runs (seeded from a fixture) and tests. Not durable.
pub struct InMemoryRecordStore {
    id_column: String,
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    tokens: HashMap<String, TokenRow>,
    // keyed by CaseId::filter_value
    cases: HashMap<String, CaseRecord>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::with_id_column(CASE_ID_COLUMN)
    }

    pub fn with_id_column(id_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            inner: Mutex::new(Tables::default()),
        }
    }

    pub async fn load(&self, fixture: Fixture) -> Result<(), StoreError> {
        for row in fixture.tokens {
            self.insert_token(row).await?;
        }
        for case in fixture.cases {
            self.insert_case(case).await?;
        }
        Ok(())
    }

    pub async fn insert_case(&self, case: CaseRecord) -> Result<(), StoreError> {
        let id = case
            .get(&self.id_column)
            .cloned()
            .map(CaseId)
            .ok_or_else(|| StoreError::Fixture(format!("case row without {} column", self.id_column)))?;
        self.inner.lock().await.cases.insert(id.filter_value(), case);
        Ok(())
    }

    /// Current state of a case row (test and debug hook).
    pub async fn case(&self, id: &CaseId) -> Option<CaseRecord> {
        self.inner.lock().await.cases.get(&id.filter_value()).cloned()
    }

    pub async fn token(&self, token: &str) -> Option<TokenRow> {
        self.inner.lock().await.tokens.get(token).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_token(&self, token: &str) -> Result<Option<TokenRow>, StoreError> {
        Ok(self.token(token).await)
    }

    async fn insert_token(&self, row: TokenRow) -> Result<(), StoreError> {
        self.inner.lock().await.tokens.insert(row.token.clone(), row);
        Ok(())
    }

    async fn mark_token_used(&self, token: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        // Matches an UPDATE ... WHERE token = ?: no row, no error.
        if let Some(row) = self.inner.lock().await.tokens.get_mut(token) {
            row.used_at = Some(at);
        }
        Ok(())
    }

    async fn find_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, StoreError> {
        Ok(self.case(id).await)
    }

    async fn update_case(&self, id: &CaseId, changes: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(case) = self.inner.lock().await.cases.get_mut(&id.filter_value()) {
            case.apply(changes);
        }
        Ok(())
    }
}
