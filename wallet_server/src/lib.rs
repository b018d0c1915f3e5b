//! # Wallet server
//! This crate hosts the HTTP surface of the wallet engine. It is responsible for:
//! Decoding requests and handing them to the engine APIs.
//! Mapping engine errors onto HTTP status codes, without leaking internal details.
//! Running the background workers: the audit event handlers and the reconciliation cache janitor.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The wallet API. See [routes](routes/index.html) for the full list.

pub mod cache_janitor;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
