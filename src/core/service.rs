use crate::config::BridgeConfig;
use crate::core::inflight::{InFlightCounts, InFlightSet};
use crate::core::router::{handoff_channels, Router};
use crate::core::{Broker, Category, Envelope, Repository, Request, Sample};
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_positive_number, Validate};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Subscribes to the SMILE subject and feeds decoded messages to a
/// [`Repository`].
///
/// Every matched and decoded message is acknowledged once its repository call
/// returns, whether or not that call succeeded. Storage failures are logged
/// and the message is not redelivered.
pub struct SmileService<B: Broker, R: Repository> {
    config: BridgeConfig,
    broker: Arc<B>,
    repository: Arc<R>,
    in_flight: InFlightSet,
}

impl<B: Broker, R: Repository> SmileService<B, R> {
    pub fn new(config: BridgeConfig, broker: Arc<B>, repository: Arc<R>) -> Result<Self> {
        validate_non_empty_string("broker.consumer", &config.broker.consumer)?;
        validate_non_empty_string("broker.subject", &config.broker.subject)?;
        config.routing.validate()?;
        validate_positive_number(
            "dispatch.channel_capacity",
            config.dispatch.channel_capacity,
            1,
        )?;

        Ok(Self {
            config,
            broker,
            repository,
            in_flight: InFlightSet::new(),
        })
    }

    pub fn in_flight(&self) -> InFlightCounts {
        self.in_flight.snapshot()
    }

    /// Runs until `ct` is cancelled, then waits for outstanding writes and
    /// shuts the broker down. Only subscription failures are returned.
    pub async fn run(&self, ct: CancellationToken) -> Result<()> {
        tracing::info!(
            subject = %self.config.broker.subject,
            consumer = %self.config.broker.consumer,
            "Starting up SMILE consumer..."
        );

        let (senders, mut receivers) = handoff_channels(self.config.dispatch.channel_capacity);
        let router = Arc::new(Router::new(self.config.routing.clone(), senders));
        self.broker
            .subscribe(
                &self.config.broker.consumer,
                &self.config.broker.subject,
                router,
            )
            .await?;

        tracing::info!("SMILE consumer running...");

        loop {
            tokio::select! {
                Some(envelope) = receivers.new_request.recv() => {
                    self.add_request(envelope, &ct);
                }
                Some(envelope) = receivers.update_request.recv() => {
                    self.update_requests(envelope, &ct);
                }
                Some(envelope) = receivers.update_sample.recv() => {
                    self.update_samples(envelope, &ct);
                }
                _ = ct.cancelled() => break,
            }
        }

        let counts = self.in_flight.snapshot();
        tracing::info!(
            new_request = counts.new_request,
            update_request = counts.update_request,
            update_sample = counts.update_sample,
            "Cancellation received, draining in-flight messages"
        );

        self.in_flight.wait_idle().await;
        self.broker.shutdown().await;

        tracing::info!("SMILE consumer stopped");
        Ok(())
    }

    fn add_request(&self, envelope: Envelope<Request>, ct: &CancellationToken) {
        tracing::info!(request_id = %envelope.payload.igo_request_id, "Processing add request");
        self.dispatch(Category::NewRequest, envelope, ct, |repo, ct, request| async move {
            repo.add_request(&ct, request).await
        });
    }

    fn update_requests(&self, envelope: Envelope<Vec<Request>>, ct: &CancellationToken) {
        let request_id = first_id(&envelope.payload, |r| &r.igo_request_id);
        tracing::info!(
            request_id = %request_id,
            count = envelope.payload.len(),
            "Processing update request"
        );
        self.dispatch(Category::UpdateRequest, envelope, ct, |repo, ct, requests| async move {
            repo.update_requests(&ct, requests).await
        });
    }

    fn update_samples(&self, envelope: Envelope<Vec<Sample>>, ct: &CancellationToken) {
        let sample = first_id(&envelope.payload, |s| &s.cmo_sample_name);
        tracing::info!(
            sample = %sample,
            count = envelope.payload.len(),
            "Processing update sample"
        );
        self.dispatch(Category::UpdateSample, envelope, ct, |repo, ct, samples| async move {
            repo.update_samples(&ct, samples).await
        });
    }

    /// Counts the message as in flight and hands it to a detached task that
    /// writes, acks, and then releases the count.
    fn dispatch<T, F, Fut>(
        &self,
        category: Category,
        envelope: Envelope<T>,
        ct: &CancellationToken,
        write: F,
    ) where
        T: Send + 'static,
        F: FnOnce(Arc<R>, CancellationToken, T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let guard = self.in_flight.enter(category);
        let repository = Arc::clone(&self.repository);
        let ct = ct.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let Envelope { payload, handle } = envelope;

            if let Err(e) = write(repository, ct, payload).await {
                tracing::error!(category = %category, error = %e, "Error writing to repository");
            }

            // ack even on failure, otherwise the broker keeps redelivering
            if let Err(e) = handle.ack().await {
                tracing::warn!(category = %category, error = %e, "Failed to ack message");
            }
        });
    }
}

fn first_id<T>(items: &[T], id: impl Fn(&T) -> &String) -> &str {
    items.first().map(|item| id(item).as_str()).unwrap_or_default()
}
