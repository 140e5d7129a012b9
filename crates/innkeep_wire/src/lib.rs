//! # innkeep_wire
//!
//! Wire contract of the relational backend used by innkeep.
//!
//! A relational endpoint is reached only through request/response calls
//! carrying a textual query plus positional parameters. This crate provides:
//!
//! - [`QueryRequest`] / [`QueryResponse`]: the JSON messages
//! - [`QueryClient`]: the async client abstraction the adapter talks to
//! - [`HttpQueryClient`]: HTTP/1.1 client over tokio TCP
//! - [`LoopbackClient`]: in-process client for tests and the CLI
//! - [`MemorySqlServer`]: an in-memory endpoint executing the emitted
//!   statement subset, servable over HTTP with [`serve`]
//!
//! Clients never retry. Failures are reported as [`WireError`] and the
//! caller decides what to do with them.

mod client;
mod error;
mod http;
mod loopback;
mod messages;
mod server;
pub mod sql;

pub use client::{ClientConfig, QueryClient};
pub use error::{WireError, WireResult};
pub use http::{serve, Endpoint, HttpQueryClient};
pub use loopback::{LoopbackClient, QueryServer};
pub use messages::{ErrorBody, QueryRequest, QueryResponse, Row, HEALTH_PATH, QUERY_PATH};
pub use server::MemorySqlServer;
