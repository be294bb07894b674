//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loading.
pub mod config;

/// Headless display adapter.
pub mod display;

/// Tick feed adapters (WebSocket, file replay).
pub mod feed;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Speech synthesizer adapters.
pub mod speech;

/// OpenTelemetry tracing integration.
pub mod telemetry;
