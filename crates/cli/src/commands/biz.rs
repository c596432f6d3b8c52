//! Biz module commands: install, uninstall and status

use anyhow::Result;
use ark_client::{
    ArkClient, BizIdentity, BizRuntimeState, InstallRequest, InstallType, RuntimeCoordinate,
    UninstallOutcome, UninstallRequest,
};
use clap::ValueEnum;
use colored::Colorize;
use serde_json::json;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crate::output::{
    color_state, format_timestamp, print_info, print_json, print_success, print_table,
    OutputFormat,
};

/// How the container should fetch the module artifact
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InstallTypeArg {
    Filesystem,
    Http,
}

impl From<InstallTypeArg> for InstallType {
    fn from(arg: InstallTypeArg) -> Self {
        match arg {
            InstallTypeArg::Filesystem => InstallType::Filesystem,
            InstallTypeArg::Http => InstallType::Http,
        }
    }
}

/// Arguments of `arkctl install`
pub struct InstallArgs {
    pub name: String,
    pub version: String,
    pub url: Option<String>,
    pub install_type: Option<InstallTypeArg>,
    pub home_dir: Option<String>,
}

/// Row for the module table
#[derive(Tabled)]
struct BizRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Web Context")]
    web_context_path: String,
    #[tabled(rename = "Main Class")]
    main_class: String,
    #[tabled(rename = "Last Change")]
    last_change: String,
}

/// Row for a module's state history
#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn biz_label(name: &str, version: &str) -> String {
    format!("{}:{}", name, version)
}

/// Install a biz module
pub async fn install(
    client: &ArkClient,
    target: RuntimeCoordinate,
    args: InstallArgs,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let label = biz_label(&args.name, &args.version);
    let mut identity = BizIdentity::new(args.name, args.version);
    if let Some(url) = args.url {
        identity = identity.with_source(url);
    }

    let mut request = InstallRequest::new(identity, target);
    if let Some(install_type) = args.install_type {
        request.install_type = install_type.into();
    }
    request.biz_home_dir = args.home_dir;

    let envelope = client.install(&request, cancel).await?;

    match format {
        OutputFormat::Json => print_json(&envelope)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Installed {} into {} ({} ms)",
                label.cyan(),
                request.target_container,
                envelope.data.elapsed_space
            ));
            if !envelope.data.message.is_empty() {
                print_info(&envelope.data.message);
            }
        }
    }

    Ok(())
}

/// Uninstall a biz module; an absent module is not an error
pub async fn uninstall(
    client: &ArkClient,
    target: RuntimeCoordinate,
    name: String,
    version: String,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let label = biz_label(&name, &version);
    let request = UninstallRequest::new(BizIdentity::new(name, version), target);
    let outcome = client.uninstall(&request, cancel).await?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "installed": outcome.was_installed(),
            "response": outcome.envelope(),
        }))?,
        OutputFormat::Table => match outcome {
            UninstallOutcome::Uninstalled(_) => {
                print_success(&format!(
                    "Uninstalled {} from {}",
                    label.cyan(),
                    request.target_container
                ));
            }
            UninstallOutcome::NotInstalled(_) => {
                print_info(&format!(
                    "{} is not installed in {}, nothing to uninstall",
                    label.cyan(),
                    request.target_container
                ));
            }
        },
    }

    Ok(())
}

/// Show every module installed in the container
pub async fn status(
    client: &ArkClient,
    target: RuntimeCoordinate,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let modules = client.query_all(&target, cancel).await?;

    match format {
        OutputFormat::Json => print_json(&modules)?,
        OutputFormat::Table => {
            println!("{} {}", "Biz Modules in".bold(), target.to_string().cyan());
            println!();

            let rows: Vec<BizRow> = modules.iter().map(biz_row).collect();
            print_table(&rows, "No biz modules installed");

            for module in modules.iter().filter(|m| !m.state_history.is_empty()) {
                println!();
                println!(
                    "{} {}",
                    "State history of".bold(),
                    biz_label(&module.name, &module.version).cyan()
                );
                let history: Vec<HistoryRow> = module
                    .state_history
                    .iter()
                    .map(|record| HistoryRow {
                        time: format_timestamp(record.changed_at()),
                        state: color_state(&record.state),
                        reason: record.reason.clone(),
                        message: record.message.clone(),
                    })
                    .collect();
                print_table(&history, "No state changes recorded");
            }

            println!("\nTotal: {} modules", modules.len());
        }
    }

    Ok(())
}

fn biz_row(module: &BizRuntimeState) -> BizRow {
    BizRow {
        name: module.name.clone(),
        version: module.version.clone(),
        state: color_state(&module.state),
        web_context_path: module.web_context_path.clone(),
        main_class: module.main_class.clone(),
        last_change: format_timestamp(
            module
                .state_history
                .last()
                .and_then(|record| record.changed_at()),
        ),
    }
}
