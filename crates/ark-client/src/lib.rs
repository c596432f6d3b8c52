//! Client library for the biz module management API of an ark container
//!
//! This crate provides:
//! - Install, uninstall, query and health operations against a container
//! - Response envelope classification with idempotent uninstall
//! - Direct HTTP and orchestrator exec tunnel transports
//! - Diagnostic suggestions for common deployment failures
//! - Call metrics and structured logging

pub mod client;
pub mod envelope;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod suggestions;
pub mod transport;

pub use client::{ArkClient, ArkClientBuilder, ClientConfig};
pub use envelope::{ResponseEnvelope, UninstallOutcome};
pub use error::{ArkError, TransportErrorKind};
pub use health::{HealthReport, HealthSnapshot, MetricSet};
pub use models::*;
pub use observability::{CallLogger, ClientMetrics};
pub use transport::TunnelProbe;
