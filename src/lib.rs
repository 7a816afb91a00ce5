#![deny(missing_docs)]

//! Core library for the wine catalog search server.

/// HTTP routing and page handlers.
pub mod api;
/// Wine catalog domain and search orchestration.
pub mod catalog;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// MongoDB document store integration.
pub mod mongo;
/// Askama page templates.
pub mod views;
