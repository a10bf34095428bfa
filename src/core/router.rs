use crate::config::RoutingConfig;
use crate::core::decoder;
use crate::core::{Category, Delivery, Envelope, MessageHandler, Payload, Request, Sample};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub struct HandoffSenders {
    pub new_request: mpsc::Sender<Envelope<Request>>,
    pub update_request: mpsc::Sender<Envelope<Vec<Request>>>,
    pub update_sample: mpsc::Sender<Envelope<Vec<Sample>>>,
}

pub struct HandoffReceivers {
    pub new_request: mpsc::Receiver<Envelope<Request>>,
    pub update_request: mpsc::Receiver<Envelope<Vec<Request>>>,
    pub update_sample: mpsc::Receiver<Envelope<Vec<Sample>>>,
}

/// One bounded channel per category. A full channel makes the sender wait,
/// which is what slows the broker down to the dispatch loop's pace.
pub fn handoff_channels(capacity: usize) -> (HandoffSenders, HandoffReceivers) {
    let (new_request_tx, new_request_rx) = mpsc::channel(capacity);
    let (update_request_tx, update_request_rx) = mpsc::channel(capacity);
    let (update_sample_tx, update_sample_rx) = mpsc::channel(capacity);

    (
        HandoffSenders {
            new_request: new_request_tx,
            update_request: update_request_tx,
            update_sample: update_sample_tx,
        },
        HandoffReceivers {
            new_request: new_request_rx,
            update_request: update_request_rx,
            update_sample: update_sample_rx,
        },
    )
}

/// Classifies broker deliveries by subject, decodes them and pushes them into
/// the matching handoff channel.
pub struct Router {
    routing: RoutingConfig,
    senders: HandoffSenders,
}

impl Router {
    pub fn new(routing: RoutingConfig, senders: HandoffSenders) -> Self {
        Self { routing, senders }
    }

    /// First exact match wins, in the order new-request, update-request,
    /// update-sample.
    pub fn classify(&self, subject: &str) -> Option<Category> {
        if subject == self.routing.new_request_filter {
            Some(Category::NewRequest)
        } else if subject == self.routing.update_request_filter {
            Some(Category::UpdateRequest)
        } else if subject == self.routing.update_sample_filter {
            Some(Category::UpdateSample)
        } else {
            None
        }
    }

    async fn forward(&self, payload: Payload, delivery: Delivery) {
        let category = payload.category();
        let handle = delivery.handle;
        let sent = match payload {
            Payload::NewRequest(request) => self
                .senders
                .new_request
                .send(Envelope::new(request, handle))
                .await
                .is_ok(),
            Payload::UpdateRequests(requests) => self
                .senders
                .update_request
                .send(Envelope::new(requests, handle))
                .await
                .is_ok(),
            Payload::UpdateSamples(samples) => self
                .senders
                .update_sample
                .send(Envelope::new(samples, handle))
                .await
                .is_ok(),
        };

        if !sent {
            tracing::warn!(
                category = %category,
                subject = %delivery.subject,
                "Dispatch loop has stopped, leaving message unacknowledged"
            );
        }
    }
}

#[async_trait]
impl MessageHandler for Router {
    async fn on_message(&self, delivery: Delivery) {
        let Some(category) = self.classify(&delivery.subject) else {
            // not interested, ack so the broker does not send it again
            tracing::debug!(subject = %delivery.subject, "Ignoring unmatched message");
            if let Err(e) = delivery.handle.ack().await {
                tracing::warn!(subject = %delivery.subject, error = %e, "Failed to ack ignored message");
            }
            return;
        };

        match decoder::decode(category, &delivery.data) {
            Ok(payload) => self.forward(payload, delivery).await,
            Err(e) => {
                tracing::error!(
                    category = %category,
                    subject = %delivery.subject,
                    error = %e,
                    "Error decoding message"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Acknowledge;
    use crate::utils::error::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingAck {
        acks: AtomicUsize,
    }

    #[async_trait]
    impl Acknowledge for CountingAck {
        async fn ack(&self) -> Result<()> {
            self.acks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn routing() -> RoutingConfig {
        RoutingConfig {
            new_request_filter: "MDB.new-request".to_string(),
            update_request_filter: "MDB.update-request".to_string(),
            update_sample_filter: "MDB.update-sample".to_string(),
        }
    }

    fn delivery(subject: &str, data: &[u8]) -> (Delivery, Arc<CountingAck>) {
        let ack = Arc::new(CountingAck::default());
        let delivery = Delivery {
            subject: subject.to_string(),
            data: data.to_vec(),
            handle: ack.clone(),
        };
        (delivery, ack)
    }

    #[test]
    fn test_classify_uses_first_match() {
        let (senders, _receivers) = handoff_channels(1);
        let mut routing = routing();
        routing.update_sample_filter = routing.new_request_filter.clone();
        let router = Router::new(routing, senders);

        assert_eq!(router.classify("MDB.new-request"), Some(Category::NewRequest));
        assert_eq!(router.classify("MDB.update-request"), Some(Category::UpdateRequest));
        assert_eq!(router.classify("MDB.new-request.extra"), None);
        assert_eq!(router.classify(""), None);
    }

    #[tokio::test]
    async fn test_unmatched_message_is_acked_and_dropped() {
        let (senders, mut receivers) = handoff_channels(1);
        let router = Router::new(routing(), senders);

        let (msg, ack) = delivery("MDB.something-else", br#""{}""#);
        router.on_message(msg).await;

        assert_eq!(ack.acks.load(Ordering::SeqCst), 1);
        assert!(receivers.new_request.try_recv().is_err());
        assert!(receivers.update_request.try_recv().is_err());
        assert!(receivers.update_sample.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_decode_failure_is_not_acked() {
        let (senders, mut receivers) = handoff_channels(1);
        let router = Router::new(routing(), senders);

        let (msg, ack) = delivery("MDB.new-request", br#"{"IgoRequestID":"REQ1"}"#);
        router.on_message(msg).await;

        assert_eq!(ack.acks.load(Ordering::SeqCst), 0);
        assert!(receivers.new_request.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_matched_message_lands_in_its_channel() {
        let (senders, mut receivers) = handoff_channels(1);
        let router = Router::new(routing(), senders);

        let (msg, ack) = delivery("MDB.update-request", br#""[{\"IgoRequestID\":\"REQ7\"}]""#);
        router.on_message(msg).await;

        let envelope = receivers.update_request.try_recv().unwrap();
        assert_eq!(envelope.payload.len(), 1);
        assert_eq!(envelope.payload[0].igo_request_id, "REQ7");
        // acking is left to the dispatch task
        assert_eq!(ack.acks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stopped_loop_leaves_message_unacked() {
        let (senders, receivers) = handoff_channels(1);
        let router = Router::new(routing(), senders);
        drop(receivers);

        let (msg, ack) = delivery("MDB.update-sample", br#""[{\"CmoSampleName\":\"S1\"}]""#);
        router.on_message(msg).await;

        assert_eq!(ack.acks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_channel_blocks_delivery() {
        let (senders, mut receivers) = handoff_channels(1);
        let router = Arc::new(Router::new(routing(), senders));

        let (first, _) = delivery("MDB.new-request", br#""{\"IgoRequestID\":\"REQ1\"}""#);
        router.on_message(first).await;

        let (second, _) = delivery("MDB.new-request", br#""{\"IgoRequestID\":\"REQ2\"}""#);
        let pending = {
            let router = router.clone();
            tokio::spawn(async move { router.on_message(second).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        let first = receivers.new_request.recv().await.unwrap();
        assert_eq!(first.payload.igo_request_id, "REQ1");

        tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("second delivery should be released")
            .unwrap();
        let second = receivers.new_request.recv().await.unwrap();
        assert_eq!(second.payload.igo_request_id, "REQ2");
    }
}
