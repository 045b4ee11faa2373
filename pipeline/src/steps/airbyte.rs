use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::StepError;
use crate::runner::{StepAction, StepOutcome};

const SYNC_ENDPOINT: &str = "/api/v1/connections/sync";

/// Kicks off one sync on the Airbyte server. The downstream writer lands the
/// raw objects in storage; this step only starts the job.
pub struct SyncTrigger {
    client: reqwest::Client,
    endpoint: String,
    connection_id: String,
}

impl SyncTrigger {
    pub fn new(base_url: &str, connection_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}{SYNC_ENDPOINT}", base_url.trim_end_matches('/')),
            connection_id: connection_id.to_string(),
        }
    }

    fn body(&self) -> serde_json::Value {
        serde_json::json!({ "connectionId": self.connection_id })
    }
}

#[async_trait]
impl StepAction for SyncTrigger {
    async fn run(&self, _cancel: &CancellationToken) -> Result<StepOutcome, StepError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.body())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        info!("sync service responded {status}: {body}");

        if !status.is_success() {
            return Err(StepError::SyncRejected(status));
        }

        Ok(StepOutcome::Completed)
    }
}
