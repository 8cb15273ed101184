//! Deskboard Library
//!
//! The widget data layer behind the deskboard server: settings store,
//! upstream clients, the cache/refresh orchestrator, and the HTTP router.
//! Exposed as a library so integration tests can drive the router directly.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod registry;
pub mod server;
pub mod store;
