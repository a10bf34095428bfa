// Adapters layer: concrete brokers and repositories behind the domain ports.

pub mod local_storage;
pub mod memory;

#[cfg(feature = "nats")]
pub mod nats;
