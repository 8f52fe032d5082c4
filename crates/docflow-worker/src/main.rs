//! Document worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use docflow_queue::{
    MessageQueue, QueueBackend, QueueConfig, RedisStatusStore, RedisStreamQueue, SqsQueue,
};
use docflow_storage::S3ArtifactStore;
use docflow_tools::{check_program, CommandRunner, ToolRegistry};
use docflow_worker::{metrics, JobProcessor, QueueConsumer, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting docflow-worker");

    let consumer = match build().await {
        Ok(consumer) => Arc::new(consumer),
        Err(e) => {
            error!("Failed to start worker: {:#}", e);
            std::process::exit(1);
        }
    };

    // Setup signal handlers
    let signal_consumer = Arc::clone(&consumer);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        signal_consumer.shutdown();
    });

    if let Err(e) = consumer.run().await {
        error!("Consumer error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["docflow=info", "aws_config=warn", "aws_smithy_runtime=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn build() -> anyhow::Result<QueueConsumer> {
    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics::install_exporter(addr)?;
        info!("Metrics exporter listening on {}", addr);
    }

    let registry = ToolRegistry::for_kind(config.kind)?;
    info!("Serving {} tools: {}", config.kind, registry.names().join(", "));
    for program in registry.required_programs() {
        if let Err(e) = check_program(program) {
            warn!("{}; jobs needing it will fail", e);
        }
    }

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("creating work dir {}", config.work_dir.display()))?;

    let store = S3ArtifactStore::from_env().await?;
    store.check_connectivity().await?;

    let status = RedisStatusStore::from_env().await?;

    let queue_config = QueueConfig::from_env(config.kind.as_str())?;
    let queue: Arc<dyn MessageQueue> = match queue_config.backend {
        QueueBackend::Sqs => {
            let queue = SqsQueue::new(&queue_config).await?;
            queue.check_connectivity().await?;
            Arc::new(queue)
        }
        QueueBackend::Redis => {
            let queue = RedisStreamQueue::new(&queue_config, format!("worker-{}", Uuid::new_v4()))?;
            queue.init().await?;
            Arc::new(queue)
        }
    };

    let mut runner = CommandRunner::new();
    if let Some(timeout) = config.tool_timeout {
        runner = runner.with_timeout(timeout);
    }

    let processor = JobProcessor::new(
        Arc::new(store),
        Arc::new(status),
        Arc::new(registry),
        config.work_dir.clone(),
    )
    .with_runner(runner);

    Ok(QueueConsumer::new(queue, Arc::new(processor), &config))
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
