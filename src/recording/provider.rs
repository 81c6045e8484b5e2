use super::state::ArtifactDescriptor;
use crate::config::{RecordingConfig, StorageConfig};
use anyhow::{bail, Context, Result};
use base64::Engine;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Capture/transport provider driving cloud recording of a channel
#[async_trait::async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Obtain a resource handle for recording `channel` as `uid`
    async fn acquire(&self, channel: &str, uid: &str) -> Result<String>;

    /// Begin capture; returns the provider session handle
    async fn start(&self, resource_id: &str, channel: &str, uid: &str, credential: &str) -> Result<String>;

    /// End capture; returns the produced files
    async fn stop(
        &self,
        resource_id: &str,
        sid: &str,
        channel: &str,
        uid: &str,
    ) -> Result<Vec<ArtifactDescriptor>>;

    /// Download one produced file to `dest`, returning its size
    async fn fetch_artifact(&self, artifact: &ArtifactDescriptor, dest: &Path) -> Result<u64>;
}

/// Durable object storage for finished artifacts
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `local` under `key` and return a shareable link
    async fn upload(&self, local: &Path, key: &str) -> Result<String>;

    /// Remove `key`; absent keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcquireResponse {
    resource_id: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopResponse {
    #[serde(default)]
    server_response: Option<StopServerResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopServerResponse {
    #[serde(default)]
    file_list: Vec<ArtifactDescriptor>,
}

/// Cloud-recording REST client
pub struct HttpCaptureProvider {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    authorization: String,
    mode: String,
    resource_expired_hours: u32,
    max_idle_secs: u32,
    artifact_base_url: String,
}

impl HttpCaptureProvider {
    pub fn from_config(config: &RecordingConfig) -> Result<Self> {
        if config.app_id.is_empty() {
            bail!("recording.app_id is required for cloud recording");
        }
        if config.customer_id.is_empty() || config.customer_secret.is_empty() {
            bail!("recording.customer_id and recording.customer_secret are required for cloud recording");
        }

        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", config.customer_id, config.customer_secret));

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.provider_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            authorization: format!("Basic {}", credentials),
            mode: config.mode.clone(),
            resource_expired_hours: config.resource_expired_hours,
            max_idle_secs: config.max_idle_secs,
            artifact_base_url: config.artifact_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn recording_url(&self, tail: &str) -> String {
        format!("{}/v1/apps/{}/cloud_recording/{}", self.base_url, self.app_id, tail)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: serde_json::Value,
        what: &str,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .header("Authorization", &self.authorization)
            .header("Content-Type", "application/json;charset=utf-8")
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("{} failed with {}: {}", what, status, detail);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }
}

#[async_trait::async_trait]
impl CaptureProvider for HttpCaptureProvider {
    async fn acquire(&self, channel: &str, uid: &str) -> Result<String> {
        let body = json!({
            "cname": channel,
            "uid": uid,
            "clientRequest": {
                "resourceExpiredHour": self.resource_expired_hours,
                "scene": 0
            }
        });

        let response: AcquireResponse = self
            .post(&self.recording_url("acquire"), body, "acquire")
            .await?;

        info!("Recording resource acquired for channel {}", channel);
        Ok(response.resource_id)
    }

    async fn start(&self, resource_id: &str, channel: &str, uid: &str, credential: &str) -> Result<String> {
        let url = self.recording_url(&format!(
            "resourceid/{}/mode/{}/start",
            resource_id, self.mode
        ));
        let body = json!({
            "cname": channel,
            "uid": uid,
            "clientRequest": {
                "token": credential,
                "recordingConfig": {
                    "maxIdleTime": self.max_idle_secs,
                    "streamTypes": 2,
                    "channelType": 0,
                    "videoStreamType": 0,
                    "subscribeVideoUids": ["#allstream#"],
                    "subscribeAudioUids": ["#allstream#"],
                    "subscribeUidGroup": 0
                },
                "recordingFileConfig": {
                    "avFileType": ["hls", "mp4"]
                }
            }
        });

        let response: StartResponse = self.post(&url, body, "start recording").await?;

        info!("Recording started for channel {} (sid={})", channel, response.sid);
        Ok(response.sid)
    }

    async fn stop(
        &self,
        resource_id: &str,
        sid: &str,
        channel: &str,
        uid: &str,
    ) -> Result<Vec<ArtifactDescriptor>> {
        let url = self.recording_url(&format!(
            "resourceid/{}/sid/{}/mode/{}/stop",
            resource_id, sid, self.mode
        ));
        let body = json!({
            "cname": channel,
            "uid": uid,
            "clientRequest": {}
        });

        let response: StopResponse = self.post(&url, body, "stop recording").await?;
        let files = response
            .server_response
            .map(|r| r.file_list)
            .unwrap_or_default();

        info!("Recording stopped for channel {} ({} files)", channel, files.len());
        Ok(files)
    }

    async fn fetch_artifact(&self, artifact: &ArtifactDescriptor, dest: &Path) -> Result<u64> {
        if self.artifact_base_url.is_empty() {
            bail!("recording.artifact_base_url is not configured");
        }

        let url = format!(
            "{}/{}",
            self.artifact_base_url,
            artifact.filename.trim_start_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", artifact.filename))?;

        let status = response.status();
        if !status.is_success() {
            bail!("download of {} failed with {}", artifact.filename, status);
        }

        let written = match stream_to_file(response, dest, &artifact.filename).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(e);
            }
        };

        debug!("Downloaded {} ({} bytes)", artifact.filename, written);
        Ok(written)
    }
}

async fn stream_to_file(response: reqwest::Response, dest: &Path, name: &str) -> Result<u64> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("Failed reading {}", name))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Object storage on the local filesystem, served from `public_base_url`
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone(), config.public_base_url.clone())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            bail!("invalid object key: {}", key);
        }
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, local: &Path, key: &str) -> Result<String> {
        let target = self.path_for(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        tokio::fs::copy(local, &target)
            .await
            .with_context(|| format!("Failed to store {} as {}", local.display(), key))?;

        Ok(format!("{}/{}", self.public_base_url.trim_end_matches('/'), key))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let target = self.path_for(key)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", key)),
        }
    }
}
