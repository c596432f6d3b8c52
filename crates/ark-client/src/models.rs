//! Core data models for ark container calls

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::ArkError;

/// Port the ark container serves its management API on when none is given
pub const DEFAULT_ARK_PORT: u16 = 1238;

/// Host used for containers running on this machine
pub const LOCAL_HOST: &str = "127.0.0.1";

/// Namespace assumed for a pod reference without one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Missing and `null` members both decode to the type's default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Remote operations exposed by the ark container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InstallBiz,
    UninstallBiz,
    QueryAllBiz,
    Health,
}

impl Operation {
    /// URL path segment of the operation
    pub fn path(&self) -> &'static str {
        match self {
            Operation::InstallBiz => "installBiz",
            Operation::UninstallBiz => "uninstallBiz",
            Operation::QueryAllBiz => "queryAllBiz",
            Operation::Health => "health",
        }
    }

    /// Human label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Operation::InstallBiz => "install biz",
            Operation::UninstallBiz => "uninstall biz",
            Operation::QueryAllBiz => "query all biz",
            Operation::Health => "health",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where an ark container runs.
///
/// `Local` and `Vm` containers are reached over HTTP directly. `Cluster`
/// containers live in a pod and are only reachable through an exec tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ContainerRuntimeInfo", try_from = "ContainerRuntimeInfo")]
pub enum RuntimeCoordinate {
    Local {
        host: String,
        port: Option<u16>,
    },
    Vm {
        address: String,
        port: Option<u16>,
    },
    Cluster {
        namespace: String,
        pod: String,
        port: Option<u16>,
    },
}

impl RuntimeCoordinate {
    pub fn local(port: Option<u16>) -> Self {
        RuntimeCoordinate::Local {
            host: LOCAL_HOST.to_string(),
            port,
        }
    }

    pub fn vm(address: impl Into<String>, port: Option<u16>) -> Self {
        RuntimeCoordinate::Vm {
            address: address.into(),
            port,
        }
    }

    pub fn cluster(namespace: impl Into<String>, pod: impl Into<String>, port: Option<u16>) -> Self {
        RuntimeCoordinate::Cluster {
            namespace: namespace.into(),
            pod: pod.into(),
            port,
        }
    }

    /// Parse a `namespace/pod` reference; a bare pod name lands in `default`
    pub fn from_pod_ref(pod_ref: &str, port: Option<u16>) -> Result<Self, ArkError> {
        let (namespace, pod) = match pod_ref.split_once('/') {
            Some((namespace, pod)) => (namespace, pod),
            None => (DEFAULT_NAMESPACE, pod_ref),
        };
        if namespace.is_empty() || pod.is_empty() || pod.contains('/') {
            return Err(ArkError::InvalidCoordinate(format!(
                "pod reference must be <namespace>/<pod> or <pod>, got {:?}",
                pod_ref
            )));
        }
        Ok(Self::cluster(namespace, pod, port))
    }

    /// The ark API port, falling back to [`DEFAULT_ARK_PORT`]
    pub fn port(&self) -> u16 {
        self.explicit_port().unwrap_or(DEFAULT_ARK_PORT)
    }

    fn explicit_port(&self) -> Option<u16> {
        match self {
            RuntimeCoordinate::Local { port, .. }
            | RuntimeCoordinate::Vm { port, .. }
            | RuntimeCoordinate::Cluster { port, .. } => *port,
        }
    }

    pub fn run_type(&self) -> RunType {
        match self {
            RuntimeCoordinate::Local { .. } => RunType::Local,
            RuntimeCoordinate::Vm { .. } => RunType::Vm,
            RuntimeCoordinate::Cluster { .. } => RunType::Pod,
        }
    }

    /// Host, VM address, or `namespace/pod`
    pub fn location(&self) -> String {
        match self {
            RuntimeCoordinate::Local { host, .. } => host.clone(),
            RuntimeCoordinate::Vm { address, .. } => address.clone(),
            RuntimeCoordinate::Cluster { namespace, pod, .. } => format!("{}/{}", namespace, pod),
        }
    }
}

impl fmt::Display for RuntimeCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.run_type(), self.location(), self.port())
    }
}

/// Kind of place an ark container runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Local,
    Vm,
    Pod,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunType::Local => "local",
            RunType::Vm => "vm",
            RunType::Pod => "pod",
        })
    }
}

/// Wire form of a [`RuntimeCoordinate`] (`targetContainer`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntimeInfo {
    pub run_type: RunType,
    #[serde(default)]
    pub coordinate: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl From<RuntimeCoordinate> for ContainerRuntimeInfo {
    fn from(coordinate: RuntimeCoordinate) -> Self {
        Self {
            run_type: coordinate.run_type(),
            coordinate: coordinate.location(),
            port: coordinate.explicit_port(),
        }
    }
}

impl TryFrom<ContainerRuntimeInfo> for RuntimeCoordinate {
    type Error = ArkError;

    fn try_from(info: ContainerRuntimeInfo) -> Result<Self, Self::Error> {
        match info.run_type {
            RunType::Local => Ok(RuntimeCoordinate::Local {
                host: if info.coordinate.is_empty() {
                    LOCAL_HOST.to_string()
                } else {
                    info.coordinate
                },
                port: info.port,
            }),
            RunType::Vm => Ok(RuntimeCoordinate::Vm {
                address: info.coordinate,
                port: info.port,
            }),
            RunType::Pod => RuntimeCoordinate::from_pod_ref(&info.coordinate, info.port),
        }
    }
}

/// Identity of an installable biz module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BizIdentity {
    #[serde(rename = "bizName", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "bizVersion", default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// URL or filesystem path of the module artifact
    #[serde(rename = "bizUrl", default, skip_serializing_if = "String::is_empty")]
    pub source_location: String,
}

impl BizIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source_location: String::new(),
        }
    }

    pub fn with_source(mut self, source_location: impl Into<String>) -> Self {
        self.source_location = source_location.into();
        self
    }
}

/// How the container fetches the module artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    #[default]
    Filesystem,
    Http,
}

impl InstallType {
    /// `http` for http(s) locations, `filesystem` for everything else
    pub fn for_source(source_location: &str) -> Self {
        let lower = source_location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            InstallType::Http
        } else {
            InstallType::Filesystem
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    pub biz_model: BizIdentity,
    pub target_container: RuntimeCoordinate,
    pub install_type: InstallType,
    /// Directory the container unpacks filesystem modules into
    pub biz_home_dir: Option<String>,
}

impl InstallRequest {
    /// Build a request with the install type inferred from the module source
    pub fn new(biz_model: BizIdentity, target_container: RuntimeCoordinate) -> Self {
        let install_type = InstallType::for_source(&biz_model.source_location);
        Self {
            biz_model,
            target_container,
            install_type,
            biz_home_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallRequest {
    pub biz_model: BizIdentity,
    pub target_container: RuntimeCoordinate,
}

impl UninstallRequest {
    pub fn new(biz_model: BizIdentity, target_container: RuntimeCoordinate) -> Self {
        Self {
            biz_model,
            target_container,
        }
    }
}

/// Payload of install and uninstall envelopes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    /// Operation specific sub-code, e.g. `NOT_FOUND_BIZ`
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub elapsed_space: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub biz_infos: Vec<serde_json::Value>,
}

/// Lifecycle state of a biz module. Unknown states are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BizState {
    Unresolved,
    Resolved,
    Activated,
    Deactivated,
    Broken,
    Other(String),
}

impl BizState {
    pub fn as_str(&self) -> &str {
        match self {
            BizState::Unresolved => "UNRESOLVED",
            BizState::Resolved => "RESOLVED",
            BizState::Activated => "ACTIVATED",
            BizState::Deactivated => "DEACTIVATED",
            BizState::Broken => "BROKEN",
            BizState::Other(state) => state,
        }
    }
}

impl Default for BizState {
    fn default() -> Self {
        BizState::Other(String::new())
    }
}

impl From<String> for BizState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "UNRESOLVED" => BizState::Unresolved,
            "RESOLVED" => BizState::Resolved,
            "ACTIVATED" => BizState::Activated,
            "DEACTIVATED" => BizState::Deactivated,
            "BROKEN" => BizState::Broken,
            _ => BizState::Other(state),
        }
    }
}

impl From<BizState> for String {
    fn from(state: BizState) -> Self {
        match state {
            BizState::Other(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for BizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transition in a module's state history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeRecord {
    #[serde(rename = "changeTime", default, deserialize_with = "null_as_default")]
    pub timestamp_epoch_millis: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: BizState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

impl StateChangeRecord {
    pub fn changed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_epoch_millis).single()
    }
}

/// Runtime view of an installed module as reported by `queryAllBiz`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BizRuntimeState {
    #[serde(rename = "bizName", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "bizVersion", default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(rename = "bizState", default, deserialize_with = "null_as_default")]
    pub state: BizState,
    #[serde(rename = "mainClass", default, deserialize_with = "null_as_default")]
    pub main_class: String,
    #[serde(rename = "webContextPath", default, deserialize_with = "null_as_default")]
    pub web_context_path: String,
    /// Chronological as delivered by the container
    #[serde(rename = "bizStateRecords", default, deserialize_with = "null_as_default")]
    pub state_history: Vec<StateChangeRecord>,
}
