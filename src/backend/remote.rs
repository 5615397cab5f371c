use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::import::{BulkCreate, BulkCreateError, ImportResult, SubmitRecord};

pub const BULK_IMPORT_PATH: &str = "/users/bulk-import";

#[derive(Serialize)]
struct BulkCreateRequest<'a> {
    users: &'a [SubmitRecord],
}

#[derive(Deserialize)]
struct BulkCreateResponse {
    results: ImportResult,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

pub struct RemoteBackend {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl RemoteBackend {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BulkCreateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BulkCreateError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), BULK_IMPORT_PATH),
            token,
        })
    }
}

impl BulkCreate for RemoteBackend {
    fn bulk_create(&mut self, users: &[SubmitRecord]) -> Result<ImportResult, BulkCreateError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&BulkCreateRequest { users });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .map_err(|e| BulkCreateError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.trim().is_empty());
            tracing::warn!(%status, endpoint = %self.endpoint, "bulk-create rejected");
            return Err(match message {
                Some(m) => BulkCreateError::Rejected(m),
                None => BulkCreateError::Protocol(format!("HTTP {status}")),
            });
        }
        let body: BulkCreateResponse = resp
            .json()
            .map_err(|e| BulkCreateError::Protocol(e.to_string()))?;
        Ok(body.results)
    }
}
