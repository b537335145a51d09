use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use approval_gate::cli::{self, ApprovalCommands, Commands};
use approval_gate::config::{self, Config};
use approval_gate::models::family::EntityFamily;
use approval_gate::workflow::processor::ProcessOptions;
use approval_gate::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let cfg = config::load()?;
    init_tracing(cfg.log_json);

    let result = match args.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(Commands::Approval { family, command }) => {
            let family: EntityFamily = family
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let state = AppState::from_config(cfg)?;
            let result = handle_approval_command(&state, family, command).await;
            state.service.flush_notifications().await;
            result
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "approval_gate=debug,tower_http=info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(store = %cfg.store_url, "Connecting to entity store...");
    for (family, policy) in cfg.policies() {
        tracing::info!(%family, ?policy, "apply policy");
    }
    let state = Arc::new(AppState::from_config(cfg)?);
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("approval-gate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_approval_command(
    state: &AppState,
    family: EntityFamily,
    cmd: ApprovalCommands,
) -> anyhow::Result<()> {
    let service = &state.service;
    match cmd {
        ApprovalCommands::List { pending } => {
            let queue = service.list_approval_requests(family).await?;
            let rows: Vec<_> = queue
                .iter()
                .filter(|r| !pending || r.is_selectable())
                .collect();

            if rows.is_empty() {
                println!("No approval requests.");
                return Ok(());
            }

            println!(
                "{:<24} {:<18} {:<17} {:<15} {:<15} TARGET",
                "ID", "FORM", "STATUS", "REQUESTED", "PROCESSED"
            );
            for r in rows {
                let target = r.target_id.clone().unwrap_or_default();
                let target_display = if target.chars().count() > 30 {
                    format!("{}...", target.chars().take(27).collect::<String>())
                } else {
                    target
                };
                println!(
                    "{:<24} {:<18} {:<17} {:<15} {:<15} {}",
                    r.id,
                    r.approval_form.map(|f| f.as_str()).unwrap_or("-"),
                    r.status.map(|s| s.as_str()).unwrap_or("-"),
                    r.request_date.map(|d| d.to_string()).unwrap_or_default(),
                    r.process_date.map(|d| d.to_string()).unwrap_or_default(),
                    target_display
                );
            }
        }
        ApprovalCommands::Show { request_id } => {
            let request = service.fetch_approval_request(family, &request_id).await?;
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        ApprovalCommands::Detail { request_id } => {
            let list = service.fetch_approval_detail(family, &request_id).await?;
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        ApprovalCommands::Process {
            request_ids,
            confirm_in_review,
        } => {
            let report = service
                .process_approvals(family, &request_ids, ProcessOptions { confirm_in_review })
                .await?;
            for notice in &report.notices {
                println!("{}", notice.message);
            }
            if !report.skipped_in_review.is_empty() {
                println!(
                    "Skipped {} in_review request(s); pass --confirm-in-review to close them.",
                    report.skipped_in_review.len()
                );
            }
            println!("{}", serde_json::to_string_pretty(&report.items)?);
            if report.halted {
                anyhow::bail!("batch halted; failed: {}", report.failed_ids().join(", "));
            }
        }
        ApprovalCommands::FinalApproval { request_id } => {
            service.request_final_approval(family, &request_id).await?;
            println!("Request {} moved to in_review.", request_id);
        }
        ApprovalCommands::Submit { form, file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let parsed: Value = serde_json::from_str(&raw).context("input is not valid JSON")?;
            let items = match parsed {
                Value::Array(items) => items,
                other => vec![other],
            };
            let submission = service.submit_approval(family, form.into(), &items).await?;
            println!(
                "Submitted {} request(s): {}",
                submission.request_ids.len(),
                submission.request_ids.join(", ")
            );
            if submission.dropped > 0 {
                println!("{} request(s) could not be stored; see logs.", submission.dropped);
            }
        }
    }
    Ok(())
}
