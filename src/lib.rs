//! portfolio-gateway: provider integrations and a live portfolio event stream, with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
