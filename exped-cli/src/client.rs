use serde::Deserialize;
use serde_json::{json, Map, Value};

use exped_types::{CaseId, PendingField};

#[derive(Debug, Deserialize)]
pub struct FetchResponse {
    pub expediente_id: CaseId,
    pub fields: Vec<PendingField>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    updated: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Server-reported failure. `message` is empty when the body had no `error`.
#[derive(Debug)]
pub struct ServerError {
    pub status: u16,
    pub message: String,
}

/// HTTP client for the two form endpoints.
pub struct FormClient {
    client: reqwest::Client,
    base_url: String,
}

impl FormClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch(&self, token: &str) -> anyhow::Result<Result<FetchResponse, ServerError>> {
        let resp = self
            .client
            .get(format!("{}/api/expediente", self.base_url))
            .query(&[("token", token)])
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn submit(
        &self,
        token: &str,
        data: Map<String, Value>,
    ) -> anyhow::Result<Result<Vec<String>, ServerError>> {
        let resp = self
            .client
            .post(format!("{}/api/expediente_submit", self.base_url))
            .json(&json!({ "token": token, "data": data }))
            .send()
            .await?;
        Ok(decode::<SubmitResponse>(resp).await?.map(|r| r.updated))
    }
}

async fn decode<T>(resp: reqwest::Response) -> anyhow::Result<Result<T, ServerError>>
where
    T: for<'de> Deserialize<'de>,
{
    let status = resp.status();
    if status.is_success() {
        return Ok(Ok(resp.json().await?));
    }
    let message = resp
        .json::<ErrorBody>()
        .await
        .map(|b| b.error)
        .unwrap_or_default();
    Ok(Err(ServerError {
        status: status.as_u16(),
        message,
    }))
}
