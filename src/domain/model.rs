use crate::domain::ports::Acknowledge;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A lab request, keyed by its IGO request id. Members other than the id are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "IgoRequestID", default)]
    pub igo_request_id: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A sample, keyed by its CMO sample name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "CmoSampleName", default)]
    pub cmo_sample_name: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    NewRequest,
    UpdateRequest,
    UpdateSample,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::NewRequest,
        Category::UpdateRequest,
        Category::UpdateSample,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::NewRequest => "new-request",
            Category::UpdateRequest => "update-request",
            Category::UpdateSample => "update-sample",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    NewRequest(Request),
    UpdateRequests(Vec<Request>),
    UpdateSamples(Vec<Sample>),
}

impl Payload {
    pub fn category(&self) -> Category {
        match self {
            Payload::NewRequest(_) => Category::NewRequest,
            Payload::UpdateRequests(_) => Category::UpdateRequest,
            Payload::UpdateSamples(_) => Category::UpdateSample,
        }
    }
}

/// Decoded payload plus the handle needed to acknowledge the broker message
/// it came from.
pub struct Envelope<T> {
    pub payload: T,
    pub handle: Arc<dyn Acknowledge>,
}

impl<T> Envelope<T> {
    pub fn new(payload: T, handle: Arc<dyn Acknowledge>) -> Self {
        Self { payload, handle }
    }
}

impl<T: fmt::Debug> fmt::Debug for Envelope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// A raw message as handed over by a broker adapter.
pub struct Delivery {
    pub subject: String,
    pub data: Vec<u8>,
    pub handle: Arc<dyn Acknowledge>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("subject", &self.subject)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}
