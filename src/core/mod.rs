pub mod decoder;
pub mod inflight;
pub mod router;
pub mod service;

pub use crate::domain::model::{Category, Delivery, Envelope, Payload, Request, Sample};
pub use crate::domain::ports::{Acknowledge, Broker, MessageHandler, Repository};
pub use crate::utils::error::Result;
