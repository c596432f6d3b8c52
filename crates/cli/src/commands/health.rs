//! Health command for the base runtime of a container

use anyhow::Result;
use ark_client::health::{cpu, jvm, MetricSet};
use ark_client::{ArkClient, HealthReport, HealthSnapshot, RuntimeCoordinate, TunnelProbe};
use colored::Colorize;
use serde_json::json;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crate::output::{
    color_ratio, color_state, format_metric, print_json, print_success, print_table, OutputFormat,
};

/// Row for metric tables
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Query container health
pub async fn show_health(
    client: &ArkClient,
    target: RuntimeCoordinate,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    match client.health(&target, cancel).await? {
        HealthReport::Snapshot(snapshot) => show_snapshot(&target, &snapshot, format),
        HealthReport::Probe(probe) => show_probe(&target, &probe, format),
    }
}

fn show_snapshot(target: &RuntimeCoordinate, snapshot: &HealthSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(snapshot)?,
        OutputFormat::Table => {
            let master = &snapshot.master_biz_info;
            println!("{}", "Base Runtime Health".bold());
            println!("{}", "=".repeat(50));
            println!("Container:        {}", target.to_string().cyan());
            println!("Master Biz:       {}:{}", master.name, master.version);
            println!("State:            {}", color_state(&master.state));
            println!("Web Context:      {}", master.web_context_path);
            if let Some(ratio) = snapshot.heap_usage_ratio() {
                println!("Heap Usage:       {}", color_ratio(ratio));
            }
            if let Some(cpu_free) = snapshot.cpu_metrics.get_f64(cpu::FREE_PERCENT) {
                println!("CPU Free:         {:.1}%", cpu_free);
            }
            if let Some(version) = snapshot.jvm_metrics.get_str(jvm::JAVA_VERSION) {
                println!("Java Version:     {}", version);
            }

            println!();
            println!("{}", "JVM".bold());
            print_table(&metric_rows(&snapshot.jvm_metrics), "No JVM metrics reported");

            println!();
            println!("{}", "CPU".bold());
            print_table(&metric_rows(&snapshot.cpu_metrics), "No CPU metrics reported");
        }
    }
    Ok(())
}

fn show_probe(target: &RuntimeCoordinate, probe: &TunnelProbe, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "command": probe.command,
            "succeeded": probe.succeeded,
            "stdout": probe.stdout,
            "stderr": probe.stderr,
        }))?,
        OutputFormat::Table => {
            print_success(&format!("{} answered the health probe", target.to_string().cyan()));
            println!("{} {}", "Command:".bold(), probe.command);
            println!();
            println!("{}", probe.stdout.trim_end());
        }
    }
    Ok(())
}

fn metric_rows(metrics: &MetricSet) -> Vec<MetricRow> {
    metrics
        .iter()
        .map(|(name, value)| MetricRow {
            name: name.to_string(),
            value: format_metric(value),
        })
        .collect()
}
