//! Proposal evaluation API server library.
//!
//! Exposes config, state, error handling, services and routes so the
//! integration tests and the binary entrypoint share one router.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
