use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use exped_coerce::coerce_field;
use exped_policy::{evaluate_token, Denial, TokenDecision};
use exped_store::{RecordStore, StoreError, CASE_ID_COLUMN};
use exped_types::{editable_fields, CaseId, CaseRecord, PendingField};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Missing token")]
    MissingToken,
    #[error("Missing data")]
    MissingData,
    #[error("{}", .0.reason())]
    Denied(Denial),
    #[error("Expediente not found")]
    CaseNotFound,
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl FormError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> u16 {
        match self {
            FormError::MissingToken | FormError::MissingData => 400,
            FormError::Denied(Denial::Invalid) | FormError::CaseNotFound => 404,
            FormError::Denied(Denial::AlreadyUsed | Denial::Expired) => 410,
            FormError::Store(_) => 500,
        }
    }
}

/// Fields still to be filled for one case.
#[derive(Clone, Debug, Serialize)]
pub struct PendingForm {
    pub expediente_id: CaseId,
    pub fields: Vec<PendingField>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmitOutcome {
    /// Columns actually written.
    pub updated: Vec<String>,
}

/// Fetch/submit operations over a record store.
///
/// Every call re-reads the token; nothing is cached between calls.
pub struct FormService {
    store: Arc<dyn RecordStore>,
    id_column: String,
}

impl FormService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_id_column(store, CASE_ID_COLUMN)
    }

    pub fn with_id_column(store: Arc<dyn RecordStore>, id_column: impl Into<String>) -> Self {
        Self {
            store,
            id_column: id_column.into(),
        }
    }

    /// List the offered fields that are still empty in the case behind `token`.
    #[instrument(skip_all, fields(token = %redact(token)))]
    pub async fn fetch_pending(&self, token: &str, now: DateTime<Utc>) -> Result<PendingForm, FormError> {
        if token.is_empty() {
            return Err(FormError::MissingToken);
        }
        let (case_id, case) = self.admit(token, now).await?;

        let fields: Vec<PendingField> = editable_fields()
            .filter(|f| case.is_pending(f.name))
            .map(|f| f.pending_field())
            .collect();

        let expediente_id = case
            .get(&self.id_column)
            .cloned()
            .map(CaseId)
            .unwrap_or(case_id);
        info!(case = %expediente_id, pending = fields.len(), "served pending fields");

        Ok(PendingForm { expediente_id, fields })
    }

    /// Write the accepted, coercible values of `data` into still-empty
    /// columns, then consume the token.
    ///
    /// The token is consumed even when no column qualifies. The update and
    /// the token marking are separate store calls: if marking fails after a
    /// successful update, the data stays written and the token stays valid.
    #[instrument(skip_all, fields(token = %redact(token)))]
    pub async fn submit(
        &self,
        token: &str,
        data: Option<&Value>,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, FormError> {
        if token.is_empty() {
            return Err(FormError::MissingToken);
        }
        let Some(Value::Object(data)) = data else {
            return Err(FormError::MissingData);
        };
        let (case_id, case) = self.admit(token, now).await?;

        let changes = pending_changes(&case, data);
        if !changes.is_empty() {
            self.store.update_case(&case_id, &changes).await?;
        }
        self.store.mark_token_used(token, now).await?;

        let updated: Vec<String> = changes.keys().cloned().collect();
        info!(case = %case_id, updated = updated.len(), "submission applied");
        Ok(SubmitOutcome { updated })
    }

    async fn admit(&self, token: &str, now: DateTime<Utc>) -> Result<(CaseId, CaseRecord), FormError> {
        let row = self.store.find_token(token).await?;
        let case_id = match evaluate_token(row.as_ref(), now) {
            TokenDecision::Allow(id) => id,
            TokenDecision::Deny(denial) => {
                warn!(?denial, "token denied");
                return Err(FormError::Denied(denial));
            }
        };

        match self.store.find_case(&case_id).await? {
            Some(case) => Ok((case_id, case)),
            None => {
                warn!(case = %case_id, "token points at a missing case");
                Err(FormError::CaseNotFound)
            }
        }
    }
}

/// Coerced submitted values restricted to columns that are empty in `case`.
pub fn pending_changes(case: &CaseRecord, data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .filter_map(|(column, raw)| {
            let value = coerce_field(column, raw)?;
            case.is_pending(column).then(|| (column.clone(), value))
        })
        .collect()
}

fn redact(token: &str) -> String {
    let head: String = token.chars().take(6).collect();
    format!("{head}…")
}
