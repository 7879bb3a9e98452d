use anyhow::{Context, Result};
use console::style;
use e2e::cli::commands::{ListCommand, RunCommand};
use e2e::cli::output::{format_container_table, format_error, format_execution_event, INFO, WARN};
use e2e::cli::{Cli, Command};
use e2e::core::Settings;
use e2e::docker::{ContainerRegistry, DockerCliClient, DockerClientConfig};
use e2e::execution::ExecutionEngine;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    if let Err(e) = init_logging(cli.verbosity.into()) {
        eprintln!("{}", format_error(&e));
        std::process::exit(1);
    }

    let result = match &cli.command {
        Command::Run(cmd) => run_test(cmd).await,
        Command::List(cmd) => list_containers(cmd).await,
        Command::Version => {
            println!("e2e {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", format_error(&e));
        std::process::exit(1);
    }
}

fn init_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")
}

async fn connect(config: DockerClientConfig) -> Result<ContainerRegistry> {
    let runtime = Arc::new(DockerCliClient::new(config));
    let registry = ContainerRegistry::initialize(runtime)
        .await
        .context("Failed to connect to the Docker daemon")?;
    Ok(registry)
}

async fn run_test(cmd: &RunCommand) -> Result<()> {
    let settings = Settings::from_env();
    let path = settings.test_path(&cmd.test);
    println!("{} Loading test {}", INFO, style(path.display()).bold());

    let mut engine = ExecutionEngine::new(&settings).context("Failed to register built-in steps")?;

    // Procedures without container steps still run when no daemon is reachable
    match connect(DockerClientConfig::from_env()).await {
        Ok(registry) => engine = engine.with_containers(registry.into_shared()),
        Err(e) => println!("{} {:#}; container steps will fail", WARN, e),
    }

    engine.add_event_handler(|event| println!("{}", format_execution_event(&event)));

    engine.run_file(&path, &cmd.stage_filter()).await?;
    Ok(())
}

async fn list_containers(cmd: &ListCommand) -> Result<()> {
    let registry = connect(DockerClientConfig::from_env()).await?;
    let containers = registry.list_runtime(cmd.all).await?;

    if cmd.json {
        let data = serde_json::json!({ "containers": containers });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else if containers.is_empty() {
        println!("{} No containers found", INFO);
    } else {
        println!("{}", format_container_table(&containers));
    }

    Ok(())
}
