//! Health reporting for the base runtime of an ark container
//!
//! Metric names are chosen by the container (`"free (%)"`,
//! `"committed heap memory(M)"`, ...). They are kept byte-for-byte as map
//! keys so nothing is lost when a snapshot is decoded and encoded again.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{null_as_default, BizState};

/// Well-known JVM metric names
pub mod jvm {
    pub const JAVA_VERSION: &str = "java version";
    pub const JAVA_HOME: &str = "java home";
    pub const MAX_MEMORY_M: &str = "max memory(M)";
    pub const TOTAL_MEMORY_M: &str = "total memory(M)";
    pub const FREE_MEMORY_M: &str = "free memory(M)";
    pub const MAX_HEAP_MEMORY_M: &str = "max heap memory(M)";
    pub const INIT_HEAP_MEMORY_M: &str = "init heap memory(M)";
    pub const USED_HEAP_MEMORY_M: &str = "used heap memory(M)";
    pub const COMMITTED_HEAP_MEMORY_M: &str = "committed heap memory(M)";
    pub const MAX_NON_HEAP_MEMORY_M: &str = "max non heap memory(M)";
    pub const INIT_NON_HEAP_MEMORY_M: &str = "init non heap memory(M)";
    pub const USED_NON_HEAP_MEMORY_M: &str = "used non heap memory(M)";
    pub const COMMITTED_NON_HEAP_MEMORY_M: &str = "committed non heap memory(M)";
    pub const LOADED_CLASS_COUNT: &str = "loaded class count";
    pub const UNLOAD_CLASS_COUNT: &str = "unload class count";
    pub const TOTAL_CLASS_COUNT: &str = "total class count";
    pub const RUN_TIME_S: &str = "run time(s)";
    pub const USED_METASPACE: &str = "java used metaspace";
    pub const COMMITTED_METASPACE: &str = "java committed metaspace";
    pub const MAX_METASPACE: &str = "java max metaspace";
}

/// Well-known CPU metric names
pub mod cpu {
    pub const COUNT: &str = "count";
    pub const TYPE: &str = "type";
    pub const TOTAL_USED_PERCENT: &str = "total used (%)";
    pub const USER_USED_PERCENT: &str = "user used (%)";
    pub const SYSTEM_USED_PERCENT: &str = "system used (%)";
    pub const FREE_PERCENT: &str = "free (%)";
}

/// Named metric values as delivered by the container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, Value>);

impl MetricSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Summary of the master (base) module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterBizInfo {
    #[serde(rename = "bizName", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "bizState", default, deserialize_with = "null_as_default")]
    pub state: BizState,
    #[serde(rename = "bizVersion", default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(rename = "webContextPath", default, deserialize_with = "null_as_default")]
    pub web_context_path: String,
}

/// Flattened health view of a container's base runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HealthInfo", into = "HealthInfo")]
pub struct HealthSnapshot {
    pub jvm_metrics: MetricSet,
    pub cpu_metrics: MetricSet,
    pub master_biz_info: MasterBizInfo,
}

impl HealthSnapshot {
    /// Used heap as a fraction of max heap, when both are reported
    pub fn heap_usage_ratio(&self) -> Option<f64> {
        let used = self.jvm_metrics.get_f64(jvm::USED_HEAP_MEMORY_M)?;
        let max = self.jvm_metrics.get_f64(jvm::MAX_HEAP_MEMORY_M)?;
        if max > 0.0 {
            Some(used / max)
        } else {
            None
        }
    }
}

/// Wire payload of the `health` operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    health_data: HealthData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthData {
    #[serde(default, deserialize_with = "null_as_default")]
    jvm: MetricSet,
    #[serde(default, deserialize_with = "null_as_default")]
    cpu: MetricSet,
    #[serde(default, deserialize_with = "null_as_default")]
    master_biz_info: MasterBizInfo,
}

impl From<HealthInfo> for HealthSnapshot {
    fn from(info: HealthInfo) -> Self {
        let HealthData {
            jvm,
            cpu,
            master_biz_info,
        } = info.health_data;
        Self {
            jvm_metrics: jvm,
            cpu_metrics: cpu,
            master_biz_info,
        }
    }
}

impl From<HealthSnapshot> for HealthInfo {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            health_data: HealthData {
                jvm: snapshot.jvm_metrics,
                cpu: snapshot.cpu_metrics,
                master_biz_info: snapshot.master_biz_info,
            },
        }
    }
}

/// Result of a health query.
///
/// Only the direct HTTP path yields a structured snapshot. The exec tunnel
/// can only tell whether the container answered with the success token, so
/// it hands back the raw transcript instead.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthReport {
    Snapshot(HealthSnapshot),
    Probe(crate::transport::TunnelProbe),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "healthData": {
                "cpu": {
                    "count": 12,
                    "free (%)": 82.90837318159039,
                    "system used (%)": 6.207871242418149,
                    "total used (%)": 139957397,
                    "type": "Apple M3 Pro",
                    "user used (%)": 10.883755575991456
                },
                "jvm": {
                    "committed heap memory(M)": 286.5,
                    "java version": "1.8.0_291",
                    "max heap memory(M)": 4096,
                    "max non heap memory(M)": -9.5367431640625e-7,
                    "used heap memory(M)": 208.35065460205078
                },
                "masterBizInfo": {
                    "bizName": "base",
                    "bizState": "ACTIVATED",
                    "bizVersion": "1.0.0",
                    "webContextPath": "/"
                }
            }
        })
    }

    #[test]
    fn test_snapshot_flattens_health_data() {
        let snapshot: HealthSnapshot = serde_json::from_value(sample_payload()).unwrap();

        assert_eq!(snapshot.cpu_metrics.get_i64(cpu::COUNT), Some(12));
        assert_eq!(snapshot.cpu_metrics.get_str(cpu::TYPE), Some("Apple M3 Pro"));
        assert_eq!(
            snapshot.cpu_metrics.get_f64(cpu::FREE_PERCENT),
            Some(82.90837318159039)
        );
        assert_eq!(
            snapshot.jvm_metrics.get_f64(jvm::MAX_NON_HEAP_MEMORY_M),
            Some(-9.5367431640625e-7)
        );
        assert_eq!(snapshot.master_biz_info.name, "base");
        assert_eq!(snapshot.master_biz_info.state, BizState::Activated);
    }

    #[test]
    fn test_snapshot_encodes_back_to_wire_shape() {
        let snapshot: HealthSnapshot = serde_json::from_value(sample_payload()).unwrap();
        assert_eq!(serde_json::to_value(&snapshot).unwrap(), sample_payload());
    }

    #[test]
    fn test_heap_usage_ratio() {
        let snapshot: HealthSnapshot = serde_json::from_value(sample_payload()).unwrap();
        let ratio = snapshot.heap_usage_ratio().unwrap();
        assert!((ratio - 208.35065460205078 / 4096.0).abs() < f64::EPSILON);

        assert_eq!(HealthSnapshot::default().heap_usage_ratio(), None);
    }

    #[test]
    fn test_missing_health_data_defaults() {
        let snapshot: HealthSnapshot = serde_json::from_value(json!({})).unwrap();
        assert!(snapshot.jvm_metrics.is_empty());
        assert!(snapshot.cpu_metrics.is_empty());
    }

    #[test]
    fn test_null_sections_decode_to_defaults() {
        let snapshot: HealthSnapshot = serde_json::from_value(json!({
            "healthData": {
                "jvm": null,
                "cpu": { "count": 4 },
                "masterBizInfo": { "bizName": "base", "bizState": null, "webContextPath": null }
            }
        }))
        .unwrap();
        assert!(snapshot.jvm_metrics.is_empty());
        assert_eq!(snapshot.cpu_metrics.get_i64(cpu::COUNT), Some(4));
        assert_eq!(snapshot.master_biz_info.name, "base");
        assert_eq!(snapshot.master_biz_info.web_context_path, "");
    }
}
