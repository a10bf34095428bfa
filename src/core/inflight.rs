use crate::core::Category;
use std::sync::Arc;
use tokio::sync::watch;

/// Counts outstanding tasks for one category and lets a caller wait for the
/// count to reach zero.
#[derive(Debug, Clone)]
pub struct InFlight {
    tx: Arc<watch::Sender<usize>>,
}

/// Decrements the owning counter when dropped, so a panicking task still
/// releases its slot.
#[derive(Debug)]
pub struct InFlightGuard {
    tx: Arc<watch::Sender<usize>>,
}

impl InFlight {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn enter(&self) -> InFlightGuard {
        self.tx.send_modify(|n| *n += 1);
        InFlightGuard {
            tx: Arc::clone(&self.tx),
        }
    }

    pub fn count(&self) -> usize {
        *self.tx.borrow()
    }

    pub async fn wait_idle(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as self, so this cannot fail
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tx.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InFlightCounts {
    pub new_request: usize,
    pub update_request: usize,
    pub update_sample: usize,
}

impl InFlightCounts {
    pub fn total(&self) -> usize {
        self.new_request + self.update_request + self.update_sample
    }
}

#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    new_request: InFlight,
    update_request: InFlight,
    update_sample: InFlight,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> &InFlight {
        match category {
            Category::NewRequest => &self.new_request,
            Category::UpdateRequest => &self.update_request,
            Category::UpdateSample => &self.update_sample,
        }
    }

    pub fn enter(&self, category: Category) -> InFlightGuard {
        self.get(category).enter()
    }

    pub fn snapshot(&self) -> InFlightCounts {
        InFlightCounts {
            new_request: self.new_request.count(),
            update_request: self.update_request.count(),
            update_sample: self.update_sample.count(),
        }
    }

    /// Resolves once every category has drained.
    pub async fn wait_idle(&self) {
        for category in Category::ALL {
            self.get(category).wait_idle().await;
        }
    }
}
