use crate::domain::model::Delivery;
use crate::domain::ports::{Acknowledge, Broker, MessageHandler};
use crate::utils::error::{BridgeError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// In-process broker. Every published message is handed to the subscribed
/// handler, one at a time, regardless of subject.
pub struct MemoryBroker {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
    subscription: Mutex<Option<(String, String)>>,
    subscribe_error: Option<String>,
    stop: CancellationToken,
    shutdowns: AtomicUsize,
}

/// Acknowledgement handle for a message published through [`MemoryBroker`].
#[derive(Debug)]
pub struct AckProbe {
    acks: watch::Sender<usize>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            subscription: Mutex::new(None),
            subscribe_error: None,
            stop: CancellationToken::new(),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// A broker whose `subscribe` always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            subscribe_error: Some(message.into()),
            ..Self::new()
        }
    }

    pub fn publish(&self, subject: impl Into<String>, data: impl Into<Vec<u8>>) -> Arc<AckProbe> {
        let probe = Arc::new(AckProbe::new());
        let delivery = Delivery {
            subject: subject.into(),
            data: data.into(),
            handle: probe.clone(),
        };
        // the receiver only goes away once the broker itself is dropped
        let _ = self.tx.send(delivery);
        probe
    }

    /// `(consumer, subject)` of the active subscription, if any.
    pub fn subscription(&self) -> Option<(String, String)> {
        self.subscription.lock().ok().and_then(|s| s.clone())
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(
        &self,
        consumer: &str,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        if let Some(message) = &self.subscribe_error {
            return Err(BridgeError::broker(message.clone()));
        }

        let mut rx = self
            .rx
            .lock()
            .map_err(|_| BridgeError::broker("subscription state poisoned"))?
            .take()
            .ok_or_else(|| BridgeError::broker("memory broker supports a single subscription"))?;

        if let Ok(mut subscription) = self.subscription.lock() {
            *subscription = Some((consumer.to_string(), subject.to_string()));
        }

        let stop = self.stop.clone();
        tokio::spawn(async move {
            loop {
                let delivery = tokio::select! {
                    _ = stop.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(delivery) => delivery,
                        None => break,
                    },
                };
                handler.on_message(delivery).await;
            }
            tracing::debug!("Memory broker delivery loop finished");
        });

        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
    }
}

impl AckProbe {
    fn new() -> Self {
        let (acks, _rx) = watch::channel(0);
        Self { acks }
    }

    pub fn ack_count(&self) -> usize {
        *self.acks.borrow()
    }

    /// Resolves once the message has been acknowledged at least once.
    pub async fn acked(&self) {
        let mut rx = self.acks.subscribe();
        let _ = rx.wait_for(|n| *n > 0).await;
    }
}

#[async_trait]
impl Acknowledge for AckProbe {
    async fn ack(&self) -> Result<()> {
        self.acks.send_modify(|n| *n += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct Recorder {
        subjects: AsyncMutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn on_message(&self, delivery: Delivery) {
            self.subjects.lock().await.push(delivery.subject.clone());
            let _ = delivery.handle.ack().await;
        }
    }

    #[tokio::test]
    async fn test_deliveries_reach_handler_in_order() {
        let broker = MemoryBroker::new();
        let recorder = Arc::new(Recorder::default());
        broker
            .subscribe("consumer", "MDB.>", recorder.clone())
            .await
            .unwrap();

        broker.publish("a", "1");
        let last = broker.publish("b", "2");
        tokio::time::timeout(Duration::from_secs(1), last.acked())
            .await
            .unwrap();

        assert_eq!(*recorder.subjects.lock().await, vec!["a", "b"]);
        assert_eq!(
            broker.subscription(),
            Some(("consumer".to_string(), "MDB.>".to_string()))
        );
    }

    #[tokio::test]
    async fn test_second_subscription_is_rejected() {
        let broker = MemoryBroker::new();
        let recorder = Arc::new(Recorder::default());
        broker.subscribe("c", "s", recorder.clone()).await.unwrap();

        let err = broker.subscribe("c", "s", recorder).await.unwrap_err();
        assert!(err.is_setup_error());
    }

    #[tokio::test]
    async fn test_failing_broker() {
        let broker = MemoryBroker::failing("connection refused");
        let err = broker
            .subscribe("c", "s", Arc::new(Recorder::default()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Broker error: connection refused");
    }

    #[tokio::test]
    async fn test_ack_probe_counts() {
        let probe = AckProbe::new();
        assert_eq!(probe.ack_count(), 0);
        probe.ack().await.unwrap();
        probe.ack().await.unwrap();
        assert_eq!(probe.ack_count(), 2);
        probe.acked().await;
    }
}
