//! Application use cases. Orchestrate domain logic via ports.

pub mod event_hub;
pub mod facade;
pub mod portfolio_service;
pub mod search_sequencer;
pub mod stats_publisher;

pub use event_hub::EventHub;
pub use facade::{IntegrationStatus, Integrations};
pub use portfolio_service::PortfolioService;
pub use search_sequencer::SearchSequencer;
pub use stats_publisher::StatsPublisher;
