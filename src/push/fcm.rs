//! Firebase Cloud Messaging (HTTP v1) backend.
//!
//! Sends `POST https://fcm.googleapis.com/v1/projects/{project}/messages:send`
//! with a bearer token. Minting the OAuth token from the service account is
//! left to the deployment; the token is read from an environment variable.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::PushConfig;
use crate::push::{PushMessage, PushService};

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/v1";

#[derive(Deserialize)]
struct ServiceAccount {
    project_id: String,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

/// FCM HTTP v1 push client.
pub struct FcmPush {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl FcmPush {
    /// Create a client for a project with an explicit token.
    pub fn new(
        client: reqwest::Client,
        project_id: &str,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{FCM_ENDPOINT}/projects/{project_id}/messages:send"),
            access_token: access_token.into(),
        }
    }

    /// Build from configuration.
    ///
    /// The project id comes from `push.project_id`, or from the service
    /// account file when unset. The token comes from the environment
    /// variable named by `push.access_token_env`.
    pub fn from_config(config: &PushConfig, storage_dir: &Path) -> Result<Self> {
        let project_id = match &config.project_id {
            Some(id) => id.clone(),
            None => read_project_id(&storage_dir.join(&config.credentials_path))?,
        };

        let access_token = std::env::var(&config.access_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "Environment variable '{}' with the FCM access token is not set",
                    config.access_token_env
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        log::info!("Using FCM push for project {}", project_id);
        Ok(Self::new(client, &project_id, access_token))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Read `project_id` from a service-account JSON file.
pub fn read_project_id(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!(
            "Cannot read service account {}: {}",
            path.display(),
            e
        ))
    })?;
    let account: ServiceAccount = serde_json::from_str(&content)?;
    Ok(account.project_id)
}

/// Request body for a topic message.
pub fn request_body(message: &PushMessage) -> Value {
    json!({
        "message": {
            "topic": message.topic,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
            "android": {
                "priority": message.android.priority,
                "notification": {
                    "sound": message.android.sound,
                    "channel_id": message.android.channel_id,
                    "notification_priority": "PRIORITY_HIGH",
                },
            },
        }
    })
}

#[async_trait]
impl PushService for FcmPush {
    async fn send(&self, message: &PushMessage) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&request_body(message))
            .send()
            .await
            .map_err(|e| AppError::push(&message.topic, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::push(
                &message.topic,
                format!("FCM returned {status}: {body}"),
            ));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| AppError::push(&message.topic, e))?;
        log::debug!("FCM accepted message {}", sent.name);
        Ok(sent.name)
    }

    fn name(&self) -> &str {
        "fcm"
    }
}
