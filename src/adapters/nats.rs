use crate::config::BrokerConfig;
use crate::domain::model::Delivery;
use crate::domain::ports::{Acknowledge, Broker, MessageHandler};
use crate::utils::error::{BridgeError, Result};
use async_nats::jetstream::{self, consumer::pull, consumer::AckPolicy, consumer::PullConsumer};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// NATS JetStream broker using a durable pull consumer with explicit acks.
pub struct NatsBroker {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    stop: CancellationToken,
}

struct NatsAck {
    message: jetstream::Message,
}

impl NatsBroker {
    /// Opens a TLS connection authenticated with a client certificate and the
    /// consumer name / password pair.
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let client = async_nats::ConnectOptions::with_user_and_password(
            config.consumer.clone(),
            config.password.clone(),
        )
        .add_client_certificate(
            PathBuf::from(&config.cert_path),
            PathBuf::from(&config.key_path),
        )
        .require_tls(true)
        .connect(config.url.as_str())
        .await
        .map_err(|e| BridgeError::broker(format!("cannot create a messaging connection: {}", e)))?;

        tracing::info!(url = %config.url, "Connected to NATS");

        let jetstream = jetstream::new(client.clone());
        Ok(Self {
            client,
            jetstream,
            stop: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn subscribe(
        &self,
        consumer: &str,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        let stream_name = self
            .jetstream
            .stream_by_subject(subject)
            .await
            .map_err(|e| BridgeError::broker(format!("no stream for subject {}: {}", subject, e)))?;

        let stream = self
            .jetstream
            .get_stream(&stream_name)
            .await
            .map_err(|e| BridgeError::broker(format!("cannot open stream {}: {}", stream_name, e)))?;

        let pull_consumer: PullConsumer = stream
            .get_or_create_consumer(
                consumer,
                pull::Config {
                    durable_name: Some(consumer.to_string()),
                    filter_subject: subject.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BridgeError::broker(format!("cannot create consumer {}: {}", consumer, e)))?;

        let messages = pull_consumer
            .messages()
            .await
            .map_err(|e| BridgeError::broker(format!("cannot subscribe to {}: {}", subject, e)))?;
        let mut messages = Box::pin(messages);

        let stop = self.stop.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = stop.cancelled() => break,
                    next = messages.next() => next,
                };

                match next {
                    Some(Ok(message)) => {
                        let delivery = Delivery {
                            subject: message.subject.as_str().to_string(),
                            data: message.payload.to_vec(),
                            handle: Arc::new(NatsAck { message }),
                        };
                        handler.on_message(delivery).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Error receiving message from NATS");
                    }
                    None => break,
                }
            }
            tracing::debug!("NATS delivery loop finished");
        });

        Ok(())
    }

    async fn shutdown(&self) {
        self.stop.cancel();
        if let Err(e) = self.client.flush().await {
            tracing::warn!(error = %e, "Failed to flush NATS connection");
        }
    }
}

#[async_trait]
impl Acknowledge for NatsAck {
    async fn ack(&self) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| BridgeError::broker(format!("ack failed: {}", e)))
    }
}
