//! Client for the biz module management API of an ark container
//!
//! Every operation performs at most one HTTP call or one exec tunnel run.
//! Nothing is retried; each failure is returned to the caller exactly once.

use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::envelope::{ResponseEnvelope, UninstallOutcome};
use crate::error::ArkError;
use crate::health::{HealthReport, HealthSnapshot};
use crate::models::{
    BizRuntimeState, InstallRequest, Operation, OperationOutcome, RuntimeCoordinate,
    UninstallRequest,
};
use crate::observability::{CallLogger, ClientMetrics};
use crate::transport::{ExecTunnel, HttpTransport, Route, TunnelTarget};

/// Configuration for the ark client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for a whole HTTP request, including reading the body
    pub request_timeout: Duration,
    /// Orchestrator program used for the exec tunnel
    pub exec_program: String,
    /// HTTP program run inside the pod by the exec tunnel
    pub http_probe_program: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            exec_program: "kubectl".to_string(),
            http_probe_program: "curl".to_string(),
        }
    }
}

/// Biz module management client.
///
/// Holds only immutable configuration and a pooled HTTP client, so a single
/// instance can serve concurrent calls against independent containers.
#[derive(Clone)]
pub struct ArkClient {
    config: ClientConfig,
    http: HttpTransport,
    tunnel: ExecTunnel,
    metrics: ClientMetrics,
    logger: CallLogger,
}

impl ArkClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self, ArkError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ArkError> {
        let http = HttpTransport::new(config.request_timeout)?;
        let tunnel = ExecTunnel::new(&config.exec_program, &config.http_probe_program);
        Ok(Self {
            config,
            http,
            tunnel,
            metrics: ClientMetrics::new(),
            logger: CallLogger,
        })
    }

    pub fn builder() -> ArkClientBuilder {
        ArkClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Install a biz module into the request's target container
    pub async fn install(
        &self,
        request: &InstallRequest,
        cancel: &CancellationToken,
    ) -> Result<ResponseEnvelope<OperationOutcome>, ArkError> {
        let operation = Operation::InstallBiz;
        let coordinate = &request.target_container;
        self.observed(operation, coordinate, async {
            let url = self.direct_url(coordinate, operation)?;
            let envelope: ResponseEnvelope<OperationOutcome> =
                self.http.call(operation, &url, request, cancel).await?;
            envelope.classify(operation)
        })
        .await
    }

    /// Uninstall a biz module. A module that is not installed counts as
    /// success and is reported as [`UninstallOutcome::NotInstalled`].
    pub async fn uninstall(
        &self,
        request: &UninstallRequest,
        cancel: &CancellationToken,
    ) -> Result<UninstallOutcome, ArkError> {
        let operation = Operation::UninstallBiz;
        let coordinate = &request.target_container;
        let outcome = self
            .observed(operation, coordinate, async {
                let url = self.direct_url(coordinate, operation)?;
                let envelope: ResponseEnvelope<OperationOutcome> =
                    self.http.call(operation, &url, request, cancel).await?;
                envelope
                    .classify_idempotent(operation)
                    .map(UninstallOutcome::from)
            })
            .await?;

        if !outcome.was_installed() {
            self.logger.log_biz_absent(
                &request.biz_model.name,
                &request.biz_model.version,
                coordinate,
            );
        }
        Ok(outcome)
    }

    /// All biz modules installed in the container, in the order reported
    pub async fn query_all(
        &self,
        coordinate: &RuntimeCoordinate,
        cancel: &CancellationToken,
    ) -> Result<Vec<BizRuntimeState>, ArkError> {
        let operation = Operation::QueryAllBiz;
        self.observed(operation, coordinate, async {
            let envelope: ResponseEnvelope<Vec<BizRuntimeState>> =
                self.call_direct(coordinate, operation, cancel).await?;
            Ok(envelope.classify(operation)?.data)
        })
        .await
    }

    /// Health of the container's base runtime.
    ///
    /// Cluster coordinates go through the exec tunnel and yield
    /// [`HealthReport::Probe`]; all others yield a structured snapshot.
    pub async fn health(
        &self,
        coordinate: &RuntimeCoordinate,
        cancel: &CancellationToken,
    ) -> Result<HealthReport, ArkError> {
        let operation = Operation::Health;
        self.observed(operation, coordinate, async {
            match Route::select(coordinate, operation)? {
                Route::Direct(url) => {
                    let envelope: ResponseEnvelope<HealthSnapshot> =
                        self.http.call(operation, &url, &EmptyBody {}, cancel).await?;
                    Ok(HealthReport::Snapshot(envelope.classify(operation)?.data))
                }
                Route::Tunnel(target) => self.health_through_tunnel(&target, cancel).await,
            }
        })
        .await
    }

    async fn health_through_tunnel(
        &self,
        target: &TunnelTarget,
        cancel: &CancellationToken,
    ) -> Result<HealthReport, ArkError> {
        let operation = Operation::Health;
        let probe = self.tunnel.probe(target, operation, cancel).await?;
        if probe.succeeded {
            Ok(HealthReport::Probe(probe))
        } else {
            Err(ArkError::TunnelRejected {
                operation,
                stdout: probe.stdout,
                stderr: probe.stderr,
            })
        }
    }

    async fn call_direct<T>(
        &self,
        coordinate: &RuntimeCoordinate,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<ResponseEnvelope<T>, ArkError>
    where
        T: DeserializeOwned + Default,
    {
        let url = self.direct_url(coordinate, operation)?;
        self.http.call(operation, &url, &EmptyBody {}, cancel).await
    }

    /// URL for operations that have no tunnel equivalent
    fn direct_url(&self, coordinate: &RuntimeCoordinate, operation: Operation) -> Result<url::Url, ArkError> {
        match Route::select(coordinate, operation)? {
            Route::Direct(url) => Ok(url),
            route @ Route::Tunnel(_) => Err(ArkError::UnsupportedRoute {
                operation,
                route: route.name(),
            }),
        }
    }

    /// Run `call` with timing, metrics and structured logs around it
    async fn observed<T, F>(&self, operation: Operation, coordinate: &RuntimeCoordinate, call: F) -> Result<T, ArkError>
    where
        F: std::future::Future<Output = Result<T, ArkError>>,
    {
        let route = match coordinate {
            RuntimeCoordinate::Cluster { .. } => "tunnel",
            _ => "direct",
        };
        self.logger.log_call_started(operation, coordinate, route);

        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();
        self.metrics.observe_call(operation, route, elapsed.as_secs_f64());

        match &result {
            Ok(_) => self
                .logger
                .log_call_succeeded(operation, coordinate, elapsed.as_millis()),
            Err(err) => {
                self.metrics.inc_failure(operation, err.kind());
                self.logger
                    .log_call_failed(operation, coordinate, elapsed.as_millis(), err);
            }
        }
        result
    }
}

/// `{}` request body
#[derive(Serialize)]
struct EmptyBody {}

/// Builder for [`ArkClient`] configuration
pub struct ArkClientBuilder {
    config: ClientConfig,
}

impl ArkClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn exec_program(mut self, program: impl Into<String>) -> Self {
        self.config.exec_program = program.into();
        self
    }

    pub fn http_probe_program(mut self, program: impl Into<String>) -> Self {
        self.config.http_probe_program = program.into();
        self
    }

    pub fn build(self) -> Result<ArkClient, ArkError> {
        if self.config.exec_program.trim().is_empty() {
            return Err(ArkError::ClientSetup("exec program must not be empty".to_string()));
        }
        ArkClient::with_config(self.config)
    }
}

impl Default for ArkClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
