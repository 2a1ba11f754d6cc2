//! Run command handlers
//!
//! Launching a run, inspecting and cancelling it, and following its output
//! until it reaches a terminal state.

use anyhow::{Result, anyhow};
use ciencia_client::CienciaClient;
use ciencia_core::domain::run::RunStatus;
use ciencia_core::dto::run::{RunSummary, RunView};
use clap::Subcommand;
use colored::*;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Config;
use crate::id_resolver::{resolve_pipeline_id, resolve_run_id};
use crate::types::IdOrPrefix;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Execute a pipeline
    Execute {
        /// Pipeline ID or unambiguous prefix
        pipeline: String,

        /// Engine parameters as key=value pairs (e.g. genome=GRCh38 threads=8)
        ///
        /// Values are read as JSON when possible, otherwise as plain strings.
        #[arg(short, long, value_parser = parse_param)]
        param: Vec<(String, JsonValue)>,

        /// Follow the run until it finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Show the status and logs of a run
    Status {
        /// Run ID, or a prefix together with --pipeline
        id: String,

        #[arg(short, long)]
        pipeline: Option<String>,
    },
    /// Cancel a running run
    Cancel {
        /// Run ID, or a prefix together with --pipeline
        id: String,

        #[arg(short, long)]
        pipeline: Option<String>,

        /// Recorded in the run logs
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Follow a run's output until it finishes
    Watch {
        /// Run ID, or a prefix together with --pipeline
        id: String,

        #[arg(short, long)]
        pipeline: Option<String>,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,
    },
}

/// Parse a single key=value pair
fn parse_param(s: &str) -> Result<(String, JsonValue)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(anyhow!("invalid KEY=value: empty key in `{}`", s));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()));
    Ok((key.to_string(), value))
}

pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        RunCommands::Execute {
            pipeline,
            param,
            watch,
        } => execute(&client, &pipeline, param, watch).await,
        RunCommands::Status { id, pipeline } => {
            let uuid = resolve(&client, pipeline.as_deref(), &id).await?;
            print_run_details(&client.get_run(uuid).await?);
            Ok(())
        }
        RunCommands::Cancel {
            id,
            pipeline,
            reason,
        } => {
            let uuid = resolve(&client, pipeline.as_deref(), &id).await?;
            cancel(&client, uuid, reason.as_deref()).await
        }
        RunCommands::Watch {
            id,
            pipeline,
            interval,
        } => {
            let uuid = resolve(&client, pipeline.as_deref(), &id).await?;
            watch_run(&client, uuid, Duration::from_millis(interval)).await
        }
    }
}

async fn resolve(client: &CienciaClient, pipeline: Option<&str>, id: &str) -> Result<uuid::Uuid> {
    let pipeline = pipeline.map(IdOrPrefix::parse);
    resolve_run_id(client, pipeline.as_ref(), &IdOrPrefix::parse(id)).await
}

async fn execute(
    client: &CienciaClient,
    pipeline: &str,
    params: Vec<(String, JsonValue)>,
    watch: bool,
) -> Result<()> {
    let pipeline_id = resolve_pipeline_id(client, &IdOrPrefix::parse(pipeline)).await?;
    let params: HashMap<String, JsonValue> = params.into_iter().collect();

    let response = client.execute_pipeline(pipeline_id, params).await?;

    if response.status == RunStatus::Failed {
        println!("{}", "✗ Run failed to start".red().bold());
        println!("  Run ID: {}", response.run_id.to_string().cyan());
        println!("  {}", response.message.red());
        return Ok(());
    }

    println!("{}", "✓ Run started successfully!".green().bold());
    println!("  Run ID:      {}", response.run_id.to_string().cyan());
    println!("  Pipeline ID: {}", pipeline_id.to_string().dimmed());
    println!("  Status:      {}", colorize_status(response.status));

    if watch {
        println!();
        watch_run(client, response.run_id, Duration::from_secs(1)).await?;
    }

    Ok(())
}

async fn cancel(client: &CienciaClient, run_id: uuid::Uuid, reason: Option<&str>) -> Result<()> {
    let response = client.cancel_run(run_id, reason).await?;

    println!(
        "{}",
        format!("✓ Run {} is now {}", response.run_id, response.status)
            .green()
            .bold()
    );
    Ok(())
}

/// Polls a run, printing output as it arrives, until it is terminal
async fn watch_run(client: &CienciaClient, run_id: uuid::Uuid, interval: Duration) -> Result<()> {
    let mut printed = 0;

    loop {
        let run = client.get_run(run_id).await?;

        let fresh = match run.logs.get(printed..) {
            Some(fresh) => fresh,
            None => run.logs.as_str(),
        };
        if !fresh.is_empty() {
            print!("{}", fresh);
            if !fresh.ends_with('\n') {
                println!();
            }
        }
        printed = run.logs.len();

        if run.status.is_terminal() {
            println!("{}", "─".repeat(80).dimmed());
            println!("Run {} finished: {}", run.id, colorize_status(run.status));
            return Ok(());
        }

        tokio::time::sleep(interval).await;
    }
}

pub(super) fn print_run_summary(run: &RunSummary) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Status:  {}", colorize_status(run.status));
    println!(
        "    Created: {}",
        run.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(completed) = run.completed_at {
        println!(
            "    Ended:   {}",
            completed.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    println!();
}

fn print_run_details(run: &RunView) {
    println!("{}", "Run Details:".bold());
    println!("  ID:          {}", run.id.to_string().cyan());
    println!("  Pipeline ID: {}", run.pipeline_id.to_string().dimmed());
    println!("  Status:      {}", colorize_status(run.status));
    println!("  Output:      {}", run.output_dir.display());

    if let Some(started) = run.started_at {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(completed) = run.completed_at {
        println!("  Completed:   {}", completed.format("%Y-%m-%d %H:%M:%S"));
        if let Some(started) = run.started_at {
            let duration = completed.signed_duration_since(started);
            println!("  Duration:    {}s", duration.num_seconds());
        }
    }

    if !run.logs.is_empty() {
        println!("\n{}", "Logs:".bold());
        println!("{}", "─".repeat(80).dimmed());
        println!("{}", run.logs.trim_end());
        println!("{}", "─".repeat(80).dimmed());
    }
}

fn colorize_status(status: RunStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        RunStatus::Pending => label.yellow(),
        RunStatus::Running => label.cyan(),
        RunStatus::Completed => label.green(),
        RunStatus::Failed => label.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param_reads_json_values() {
        assert_eq!(parse_param("threads=8").unwrap(), ("threads".to_string(), json!(8)));
        assert_eq!(parse_param("dry=true").unwrap(), ("dry".to_string(), json!(true)));
        assert_eq!(parse_param("ratio=0.5").unwrap().1, json!(0.5));
    }

    #[test]
    fn test_parse_param_falls_back_to_string() {
        assert_eq!(
            parse_param("genome=GRCh38").unwrap(),
            ("genome".to_string(), json!("GRCh38"))
        );
        assert_eq!(parse_param("expr=a=b").unwrap().1, json!("a=b"));
        assert_eq!(parse_param("empty=").unwrap().1, json!(""));
    }

    #[test]
    fn test_parse_param_rejects_malformed_pairs() {
        assert!(parse_param("no-separator").is_err());
        assert!(parse_param("=value").is_err());
    }
}
