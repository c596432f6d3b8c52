//! Direct HTTP transport
//!
//! Posts a JSON body to `http://{host}:{port}/{operation}` and decodes the
//! response envelope. The call races the caller's cancellation token; a
//! cancelled call drops the in-flight request and its connection.

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::error::Error as StdError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::envelope::{self, ResponseEnvelope};
use crate::error::{ArkError, TransportErrorKind};
use crate::models::Operation;

const METHOD: &str = "POST";

/// HTTP transport for containers reachable over the network
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, ArkError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ArkError::ClientSetup(e.to_string()))?;

        Ok(Self { client })
    }

    /// Post `body` to `url` and decode the envelope of `T`
    pub async fn call<B, T>(
        &self,
        operation: Operation,
        url: &Url,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<ResponseEnvelope<T>, ArkError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        if cancel.is_cancelled() {
            return Err(ArkError::cancelled(METHOD, url.as_str()));
        }

        let exchange = async {
            let response = self.client.post(url.clone()).json(body).send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let (status, bytes) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(operation = %operation, url = %url, "Request cancelled");
                return Err(ArkError::cancelled(METHOD, url.as_str()));
            }
            result = exchange => result.map_err(|e| transport_error(url, e))?,
        };

        debug!(
            operation = %operation,
            url = %url,
            status = status.as_u16(),
            body_bytes = bytes.len(),
            "Received response"
        );

        envelope::decode(operation, &bytes).map_err(|err| match err {
            ArkError::Decode { operation, reason } if !status.is_success() => ArkError::Decode {
                operation,
                reason: format!(
                    "HTTP {}: {} ({})",
                    status,
                    String::from_utf8_lossy(&bytes).trim(),
                    reason
                ),
            },
            other => other,
        })
    }
}

/// Map a reqwest failure to a transport error carrying the underlying diagnostic
fn transport_error(url: &Url, err: reqwest::Error) -> ArkError {
    let authority = format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    );

    debug!(url = %url, error = %chain_message(&err), "Transport failure");

    let (kind, diagnostic) = if err.is_timeout() {
        (TransportErrorKind::Timeout, "request timed out".to_string())
    } else if is_connection_refused(&err) {
        (
            TransportErrorKind::ConnectionRefused,
            format!("tcp connect {}: connection refused", authority),
        )
    } else if is_dns_failure(&err) {
        (TransportErrorKind::Dns, chain_message(&err))
    } else {
        (TransportErrorKind::Other, chain_message(&err))
    };

    ArkError::Transport {
        kind,
        method: METHOD,
        url: url.to_string(),
        diagnostic,
    }
}

fn error_chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    error_chain(err).any(|e| {
        e.downcast_ref::<std::io::Error>()
            .map(|io| io.kind() == std::io::ErrorKind::ConnectionRefused)
            .unwrap_or(false)
            || e.to_string().to_ascii_lowercase().contains("connection refused")
    })
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    err.is_connect()
        && error_chain(err).any(|e| {
            let message = e.to_string().to_ascii_lowercase();
            message.contains("dns error") || message.contains("failed to lookup address")
        })
}

/// Every distinct message in the error chain, outermost first, joined by `: `.
/// A source already quoted by its parent's message is not repeated.
fn chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    for e in error_chain(err) {
        let message = e.to_string();
        if message.is_empty() || parts.last().map(|p| p.contains(&message)).unwrap_or(false) {
            continue;
        }
        parts.push(message);
    }
    parts.join(": ")
}
