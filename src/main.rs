use clap::Parser;
use credit_engine::application::engine::CreditEngine;
use credit_engine::application::signature::SecretKeys;
use credit_engine::domain::course_key::CourseKey;
use credit_engine::domain::requirement::RequirementStatus;
use credit_engine::infrastructure::in_memory::{
    InMemoryCourseStore, InMemoryProfileStore, InMemoryRequestStore, InMemoryStatusStore,
};
use credit_engine::interfaces::config::SetupConfig;
use credit_engine::interfaces::csv::event_reader::{CreditEvent, CreditEventType, EventReader};
use credit_engine::interfaces::csv::report_writer::ReportWriter;
use miette::{IntoDiagnostic, Result};
use std::env;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input credit events CSV file
    input: PathBuf,

    /// JSON setup file with courses, providers, requirements, users and
    /// provider secret keys
    #[arg(long)]
    setup: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "credit_engine=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let setup = SetupConfig::load(&cli.setup).into_diagnostic()?;
    let secrets = SecretKeys::from(setup.secret_keys.clone());

    let engine = build_engine(&cli, secrets).into_diagnostic()?;
    setup.apply(&engine).await.into_diagnostic()?;

    // Process the event stream, reporting per-event failures without
    // stopping the batch.
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event_result in reader.events() {
        match event_result {
            Ok(event) => {
                if let Err(e) = process_event(&engine, &event).await {
                    eprintln!("Error processing event: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading event: {}", e);
            }
        }
    }

    // Report the final state of every stored credit request.
    let requests = engine.into_results().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_requests(requests.iter()).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn build_engine(cli: &Cli, secrets: SecretKeys) -> credit_engine::error::Result<CreditEngine> {
    use credit_engine::infrastructure::rocksdb::RocksDBStore;

    if let Some(db_path) = &cli.db_path {
        let store = RocksDBStore::open(db_path)?;
        Ok(CreditEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store),
            secrets,
        ))
    } else {
        Ok(in_memory_engine(secrets))
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_engine(_cli: &Cli, secrets: SecretKeys) -> credit_engine::error::Result<CreditEngine> {
    Ok(in_memory_engine(secrets))
}

fn in_memory_engine(secrets: SecretKeys) -> CreditEngine {
    CreditEngine::new(
        Box::new(InMemoryCourseStore::new()),
        Box::new(InMemoryProfileStore::new()),
        Box::new(InMemoryStatusStore::new()),
        Box::new(InMemoryRequestStore::new()),
        secrets,
    )
}

async fn process_event(
    engine: &CreditEngine,
    event: &CreditEvent,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    match event.r#type {
        CreditEventType::Status => {
            let course_key: CourseKey = require(event.course_key.as_deref(), "course_key")?.parse()?;
            let username = require(event.username.as_deref(), "username")?;
            let namespace = require(event.namespace.as_deref(), "namespace")?;
            let name = require(event.name.as_deref(), "name")?;
            let status: RequirementStatus = require(event.status.as_deref(), "status")?.parse()?;
            let reason = event
                .reason
                .as_deref()
                .filter(|raw| !raw.is_empty())
                .map(serde_json::from_str)
                .transpose()?;
            engine
                .set_requirement_status(username, &course_key, namespace, name, status, reason)
                .await?;
        }
        CreditEventType::Request => {
            let course_key: CourseKey = require(event.course_key.as_deref(), "course_key")?.parse()?;
            let provider_id = require(event.provider_id.as_deref(), "provider_id")?;
            let username = require(event.username.as_deref(), "username")?;
            let descriptor = engine
                .create_credit_request(&course_key, provider_id, username)
                .await?;
            tracing::info!(
                url = %descriptor.url,
                method = ?descriptor.method,
                "credit request descriptor ready"
            );
        }
        CreditEventType::Response => {
            let uuid = require(event.uuid.as_deref(), "uuid")?;
            let provider_id = require(event.provider_id.as_deref(), "provider_id")?;
            let status = require(event.status.as_deref(), "status")?;
            engine.update_request_status(uuid, provider_id, status).await?;
        }
    }
    Ok(())
}

fn require<'a>(
    value: Option<&'a str>,
    column: &str,
) -> std::result::Result<&'a str, Box<dyn std::error::Error>> {
    value
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| format!("event is missing the {column} column").into())
}
