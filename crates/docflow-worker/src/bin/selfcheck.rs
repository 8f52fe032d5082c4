use std::path::Path;

use docflow_tools::{check_program, ToolRegistry};
use docflow_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env()?;

    println!(
        "docflow-selfcheck: starting with kind={} work_dir={}",
        config.kind,
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_programs(&ToolRegistry::for_kind(config.kind)?)?;
    ensure_env_present(&["AWS_S3_BUCKET"])?;
    ensure_any_env_present(&["REDIS_URL", "REDIS_HOST"])?;
    docflow_queue::QueueConfig::from_env(config.kind.as_str())?;

    println!("docflow-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let marker = path.join(".selfcheck");
    tokio::fs::write(&marker, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

fn ensure_programs(registry: &ToolRegistry) -> anyhow::Result<()> {
    let missing: Vec<&str> = registry
        .required_programs()
        .into_iter()
        .filter(|program| check_program(program).is_err())
        .collect();

    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "programs not found on PATH: {}",
            missing.join(", ")
        ));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}

fn ensure_any_env_present(vars: &[&str]) -> anyhow::Result<()> {
    if vars.iter().any(|var| std::env::var(var).is_ok()) {
        return Ok(());
    }
    Err(anyhow::anyhow!(
        "missing required env var, one of {}",
        vars.join(", ")
    ))
}
