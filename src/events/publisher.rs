use super::messages::SessionEventMessage;
use anyhow::{Context, Result};
use async_nats::Client;
use tracing::{debug, info};

#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: SessionEventMessage) -> Result<()>;
}

pub struct NatsPublisher {
    client: Client,
}

impl NatsPublisher {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: SessionEventMessage) -> Result<()> {
        let subject = event.subject();
        let payload = serde_json::to_vec(&event)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish interview event")?;

        debug!("Published {}", subject);
        Ok(())
    }
}

/// Stand-in when no broker is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait::async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: SessionEventMessage) -> Result<()> {
        info!(
            subject = %event.subject(),
            status = event.status.as_deref().unwrap_or("-"),
            "Interview event"
        );
        Ok(())
    }
}
