//! Infrastructure adapters. Implement outbound ports.
//!
//! Provider HTTP clients, the HTTP/SSE server surface, and the stream client.
//! Map errors to IntegrationError.

pub mod http;
pub mod integrations;
pub mod stream_client;
