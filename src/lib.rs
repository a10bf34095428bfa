pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

#[cfg(feature = "nats")]
pub use adapters::nats::NatsBroker;

pub use adapters::{local_storage::JsonFileRepository, memory::MemoryBroker};
pub use config::{BridgeConfig, BrokerConfig, DispatchConfig, RoutingConfig};
pub use core::service::SmileService;
pub use utils::error::{BridgeError, Result};
