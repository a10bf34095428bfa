use crate::domain::model::{Delivery, Request, Sample};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Persistence backend. Implementations must tolerate concurrent calls, both
/// within and across categories.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    async fn add_request(&self, ct: &CancellationToken, request: Request) -> Result<()>;
    async fn update_requests(&self, ct: &CancellationToken, requests: Vec<Request>) -> Result<()>;
    async fn update_samples(&self, ct: &CancellationToken, samples: Vec<Sample>) -> Result<()>;
}

/// Handle back to a single broker message.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    /// Tells the broker never to redeliver this message to the consumer group.
    async fn ack(&self) -> Result<()>;
}

/// Receives deliveries from a broker adapter. The adapter awaits each call
/// before handing over the next message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, delivery: Delivery);
}

#[async_trait]
pub trait Broker: Send + Sync + 'static {
    async fn subscribe(
        &self,
        consumer: &str,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()>;

    async fn shutdown(&self);
}
