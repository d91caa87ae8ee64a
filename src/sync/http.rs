use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::attendance::{BufferId, BufferedRecord};
use crate::model::sync::{SyncRecordPayload, SyncRequest, SyncResponse};
use crate::sync::transport::SyncTransport;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Batched upload to the remote sync endpoint, for sites that only have
/// a metered or remote connection.
pub struct ApiTransport {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
    device_name: String,
    project_id: Option<i64>,
}

impl ApiTransport {
    pub fn new(
        url: impl Into<String>,
        api_key: SecretString,
        device_name: impl Into<String>,
        project_id: Option<i64>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
            device_name: device_name.into(),
            project_id,
        })
    }

    /// Build from config; `None` when no endpoint is configured.
    pub fn from_config(config: &SyncConfig) -> Result<Option<Self>> {
        config
            .api_url
            .as_ref()
            .map(|url| {
                Self::new(
                    url.clone(),
                    config.api_key.clone(),
                    config.device_name.clone(),
                    config.project_id,
                )
            })
            .transpose()
    }
}

#[async_trait]
impl SyncTransport for ApiTransport {
    fn name(&self) -> &'static str {
        "remote_api"
    }

    fn batch_size(&self) -> usize {
        usize::MAX
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn deliver(&self, records: &[BufferedRecord]) -> Result<Vec<BufferId>> {
        let request = SyncRequest {
            action: "sync_attendance".to_string(),
            api_key: self.api_key.expose_secret().to_string(),
            device_name: self.device_name.clone(),
            project_id: self.project_id,
            records: records.iter().map(SyncRecordPayload::from).collect(),
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("sync endpoint returned {status}")));
        }

        let body: SyncResponse = response.json().await?;
        if !body.success {
            let message = body.message.unwrap_or_else(|| "no reason given".to_string());
            warn!(%message, "Remote sync rejected");
            return Err(Error::Transport(format!("sync rejected: {message}")));
        }

        // ignore acknowledgements for ids that were not sent
        let accepted: Vec<BufferId> = body
            .synced_ids
            .into_iter()
            .filter(|id| records.iter().any(|r| r.id == *id))
            .collect();
        info!(sent = records.len(), accepted = accepted.len(), "Remote sync acknowledged");
        Ok(accepted)
    }
}
