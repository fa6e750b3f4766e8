use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use exped_types::{CaseId, CaseRecord, TokenRow};

use crate::{RecordStore, StoreError, CASE_ID_COLUMN};

const TOKEN_COLUMNS: &str = "token,expediente_id,expires_at,used_at";

/// Connection and naming for a PostgREST (Supabase) backend.
#[derive(Clone, Debug, Deserialize)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`. `/rest/v1` is appended.
    pub url: String,
    pub service_key: String,
    #[serde(default = "default_tokens_table")]
    pub tokens_table: String,
    #[serde(default = "default_cases_table")]
    pub cases_table: String,
    #[serde(default = "default_id_column")]
    pub case_id_column: String,
}

pub fn default_tokens_table() -> String {
    "expediente_tokens".into()
}

pub fn default_cases_table() -> String {
    "expedientes_ae".into()
}

pub fn default_id_column() -> String {
    CASE_ID_COLUMN.into()
}

impl PostgrestConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
            tokens_table: default_tokens_table(),
            cases_table: default_cases_table(),
            case_id_column: default_id_column(),
        }
    }
}

/// Record store speaking the PostgREST dialect over HTTP.
///
/// Uses the client's default timeouts and performs no retries.
pub struct PostgrestRecordStore {
    client: reqwest::Client,
    cfg: PostgrestConfig,
}

impl PostgrestRecordStore {
    pub fn new(cfg: PostgrestConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cfg,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.cfg.url.trim_end_matches('/'), table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.cfg.service_key)
            .bearer_auth(&self.cfg.service_key)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    /// `maybeSingle` semantics: zero rows is `None`, otherwise the first row.
    async fn select_one<T>(&self, table: &str, filter: (&str, String), select: &str) -> Result<Option<T>, StoreError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let (column, value) = filter;
        let req = self
            .request(reqwest::Method::GET, table)
            .query(&[("select", select.to_string()), (column, format!("eq.{value}"))]);
        let resp = self.send(req).await?;
        let rows: Vec<T> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn patch(&self, table: &str, filter: (&str, String), body: &Value) -> Result<(), StoreError> {
        let (column, value) = filter;
        let req = self
            .request(reqwest::Method::PATCH, table)
            .query(&[(column, format!("eq.{value}"))])
            .header("Prefer", "return=minimal")
            .json(body);
        self.send(req).await?;
        Ok(())
    }
}

// PostgREST errors carry a JSON body with a `message`; fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl RecordStore for PostgrestRecordStore {
    async fn find_token(&self, token: &str) -> Result<Option<TokenRow>, StoreError> {
        debug!(table = %self.cfg.tokens_table, "select token");
        self.select_one(&self.cfg.tokens_table, ("token", token.to_string()), TOKEN_COLUMNS)
            .await
    }

    async fn insert_token(&self, row: TokenRow) -> Result<(), StoreError> {
        let req = self
            .request(reqwest::Method::POST, &self.cfg.tokens_table)
            .header("Prefer", "return=minimal")
            .json(&row);
        self.send(req).await?;
        Ok(())
    }

    async fn mark_token_used(&self, token: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.patch(
            &self.cfg.tokens_table,
            ("token", token.to_string()),
            &json!({ "used_at": at }),
        )
        .await
    }

    async fn find_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, StoreError> {
        debug!(table = %self.cfg.cases_table, case = %id, "select case");
        self.select_one(&self.cfg.cases_table, (self.cfg.case_id_column.as_str(), id.filter_value()), "*")
            .await
    }

    async fn update_case(&self, id: &CaseId, changes: &Map<String, Value>) -> Result<(), StoreError> {
        self.patch(
            &self.cfg.cases_table,
            (self.cfg.case_id_column.as_str(), id.filter_value()),
            &Value::Object(changes.clone()),
        )
        .await
    }
}
