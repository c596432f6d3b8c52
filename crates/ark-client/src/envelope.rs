//! Generic response envelope returned by every ark container operation
//! and the rules that classify it as success or failure.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ArkError;
use crate::models::{null_as_default, Operation, OperationOutcome};

pub const CODE_SUCCESS: &str = "SUCCESS";
pub const CODE_FAILED: &str = "FAILED";

/// Nested sub-code meaning the module to uninstall is not installed
pub const CODE_NOT_FOUND_BIZ: &str = "NOT_FOUND_BIZ";

/// `{code, data, message, errorStackTrace}` wrapper around an operation payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct ResponseEnvelope<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: T,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack_trace: Option<String>,
}

/// Payloads that carry their own sub-code, independent of the envelope code
pub trait NestedCode {
    fn nested_code(&self) -> Option<&str>;
}

impl NestedCode for OperationOutcome {
    fn nested_code(&self) -> Option<&str> {
        if self.code.is_empty() {
            None
        } else {
            Some(&self.code)
        }
    }
}

/// Outcome of an operation that tolerates an already absent module
#[derive(Debug, Clone, PartialEq)]
pub enum UninstallOutcome {
    Uninstalled(ResponseEnvelope<OperationOutcome>),
    /// The container reported `NOT_FOUND_BIZ`; nothing was removed
    NotInstalled(ResponseEnvelope<OperationOutcome>),
}

impl UninstallOutcome {
    pub fn envelope(&self) -> &ResponseEnvelope<OperationOutcome> {
        match self {
            UninstallOutcome::Uninstalled(envelope) | UninstallOutcome::NotInstalled(envelope) => {
                envelope
            }
        }
    }

    pub fn was_installed(&self) -> bool {
        matches!(self, UninstallOutcome::Uninstalled(_))
    }
}

impl<T> ResponseEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }

    /// `message`, followed by the remote stack trace when there is one
    pub fn failure_message(&self) -> String {
        match self.error_stack_trace.as_deref() {
            Some(trace) if !trace.is_empty() => {
                format!("{} \n Caused by: {}", self.message, trace)
            }
            _ => self.message.clone(),
        }
    }

    /// Keep the envelope on `SUCCESS`, otherwise turn it into an error
    pub fn classify(self, operation: Operation) -> Result<Self, ArkError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ArkError::RemoteOperation {
                operation,
                message: self.failure_message(),
            })
        }
    }
}

impl<T: NestedCode + Serialize> ResponseEnvelope<T> {
    /// Classification for uninstall: a `FAILED` envelope whose payload says
    /// `NOT_FOUND_BIZ` is a success. Any other nested code is reported with
    /// the whole envelope so unmapped sub-codes stay diagnosable.
    pub fn classify_idempotent(self, operation: Operation) -> Result<IdempotentVerdict<T>, ArkError> {
        if self.is_success() {
            return Ok(IdempotentVerdict::Applied(self));
        }

        let nested = self.data.nested_code().map(str::to_owned);
        match nested.as_deref() {
            Some(CODE_NOT_FOUND_BIZ) if self.code == CODE_FAILED => {
                Ok(IdempotentVerdict::AlreadyAbsent(self))
            }
            Some(_) => Err(ArkError::RemoteOperation {
                operation,
                message: self.render(),
            }),
            None => Err(ArkError::RemoteOperation {
                operation,
                message: self.failure_message(),
            }),
        }
    }

    /// Compact JSON rendering of the full envelope, fields in declaration order
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{code: {}, data.code: {}, message: {}}}",
                self.code,
                self.data.nested_code().unwrap_or_default(),
                self.message
            )
        })
    }
}

/// Success verdict of [`ResponseEnvelope::classify_idempotent`]
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotentVerdict<T> {
    Applied(ResponseEnvelope<T>),
    AlreadyAbsent(ResponseEnvelope<T>),
}

impl From<IdempotentVerdict<OperationOutcome>> for UninstallOutcome {
    fn from(verdict: IdempotentVerdict<OperationOutcome>) -> Self {
        match verdict {
            IdempotentVerdict::Applied(envelope) => UninstallOutcome::Uninstalled(envelope),
            IdempotentVerdict::AlreadyAbsent(envelope) => UninstallOutcome::NotInstalled(envelope),
        }
    }
}

/// Decode a response body into an envelope of `T`
pub fn decode<T>(operation: Operation, body: &[u8]) -> Result<ResponseEnvelope<T>, ArkError>
where
    T: DeserializeOwned + Default,
{
    serde_json::from_slice(body).map_err(|e| ArkError::Decode {
        operation,
        reason: e.to_string(),
    })
}
