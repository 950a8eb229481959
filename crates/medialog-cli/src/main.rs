//! Medialog CLI: one-shot invocations of the grouping pipeline and the
//! delivery handler.
//!
//! The scheduled trigger that would call these periodically lives outside
//! this repository; each subcommand runs exactly one pass and exits.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use medialog_applog::AppendLogStore;
use medialog_cli::init_tracing;
use medialog_core::Config;
use medialog_storage::create_storage;
use medialog_transport::{MemoryTransport, Message, SqsTransport, Transport};
use medialog_worker::{
    DeliveryConfig, DeliveryHandler, GroupingPipeline, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "medialog", about = "Media activity append log worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one grouping pass over the activity queue
    Pipeline,
    /// Run one delivery pass over the batch queue
    Deliver,
    /// Feed pre-shaped transport messages to the delivery handler
    Manual {
        /// Path to a JSON array of messages; reads stdin when omitted
        file: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("load configuration")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Pipeline => {
            let input = sqs_transport(config.activity_queue_url(), "ACTIVITY_QUEUE_URL").await?;
            let output = sqs_transport(config.batch_queue_url(), "BATCH_QUEUE_URL").await?;
            let pipeline = GroupingPipeline::new(input, output, PipelineConfig::from(&config));
            let summary = pipeline.run_once().await?;
            println!("{}", summary);
        }
        Commands::Deliver => {
            let transport = sqs_transport(config.batch_queue_url(), "BATCH_QUEUE_URL").await?;
            let handler = DeliveryHandler::new(
                transport,
                create_storage(&config)?,
                log_store(&config)?,
                DeliveryConfig::from(&config),
            );
            let summary = handler.run_once().await?;
            if !summary.failed_message_ids.is_empty() {
                tracing::warn!(
                    failed = ?summary.failed_message_ids,
                    "some batch messages were left for redelivery"
                );
            }
            println!("{}", summary);
        }
        Commands::Manual { file } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("read messages from stdin")?;
                    buffer
                }
            };
            let messages = parse_manual_messages(&raw)?;

            let handler = DeliveryHandler::new(
                Arc::new(MemoryTransport::new()),
                create_storage(&config)?,
                log_store(&config)?,
                DeliveryConfig::from(&config),
            );
            for message in &messages {
                handler
                    .process_message(message)
                    .await
                    .with_context(|| format!("process message {}", message.id))?;
            }
            println!("processed {} messages", messages.len());
        }
    }

    Ok(())
}

async fn sqs_transport(
    queue_url: Option<&str>,
    env_var: &str,
) -> Result<Arc<dyn Transport>> {
    let url = queue_url
        .with_context(|| format!("{} must be set", env_var))?
        .to_string();
    Ok(Arc::new(SqsTransport::from_env(url).await))
}

fn log_store(config: &Config) -> Result<AppendLogStore> {
    Ok(AppendLogStore::new(
        create_storage(config)?,
        config.log_file_max_bytes,
    ))
}

/// Parse the manual-mode input: a JSON array whose elements are either a
/// transport message shape (`{"body": "..."}`) or a bare batch payload,
/// which is wrapped as a message body verbatim.
fn parse_manual_messages(raw: &str) -> Result<Vec<Message>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(raw).context("input is not a JSON array of messages")?;

    Ok(values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let body = value
                .get("body")
                .and_then(serde_json::Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| value.to_string());
            Message {
                id: format!("manual-{}", i),
                receipt: format!("manual-{}", i),
                body,
            }
        })
        .collect())
}
