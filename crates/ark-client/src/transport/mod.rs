//! Transports to an ark container
//!
//! This module provides:
//! - Route selection from a [`RuntimeCoordinate`]
//! - A direct HTTP transport returning structured envelopes
//! - An exec tunnel through the cluster orchestrator that only yields a
//!   textual transcript and a success verdict

mod direct;
mod tunnel;

pub use direct::HttpTransport;
pub use tunnel::{ExecTunnel, TunnelProbe, SUCCESS_TOKEN};

use url::Url;

use crate::error::ArkError;
use crate::models::{Operation, RuntimeCoordinate};

/// Pod addressed through the exec tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    pub namespace: String,
    pub pod: String,
    pub port: u16,
}

/// How a call reaches its container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct(Url),
    Tunnel(TunnelTarget),
}

impl Route {
    /// Pick the route for `operation` purely from the coordinate variant
    pub fn select(coordinate: &RuntimeCoordinate, operation: Operation) -> Result<Self, ArkError> {
        match coordinate {
            RuntimeCoordinate::Local { host, .. } => {
                direct_url(host, coordinate.port(), operation).map(Route::Direct)
            }
            RuntimeCoordinate::Vm { address, .. } => {
                direct_url(address, coordinate.port(), operation).map(Route::Direct)
            }
            RuntimeCoordinate::Cluster { namespace, pod, .. } => Ok(Route::Tunnel(TunnelTarget {
                namespace: namespace.clone(),
                pod: pod.clone(),
                port: coordinate.port(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Direct(_) => "direct",
            Route::Tunnel(_) => "tunnel",
        }
    }
}

/// `http://{host}:{port}/{operation}`
pub fn direct_url(host: &str, port: u16, operation: Operation) -> Result<Url, ArkError> {
    if host.is_empty() {
        return Err(ArkError::InvalidCoordinate("empty host".to_string()));
    }
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    let raw = format!("http://{}:{}/{}", host, port, operation.path());
    Url::parse(&raw).map_err(|e| ArkError::InvalidCoordinate(format!("{}: {}", raw, e)))
}
