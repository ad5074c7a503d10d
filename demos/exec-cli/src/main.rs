//! Run a script file against a remote execution context.
//!
//! Run with: cargo run -p exec-cli-demo -- --host https://... --cluster <id> script.py

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbrun_core::{ConnectionInfo, Language, Outcome, Transport};
use dbrun_exec::ExecutionClient;
use dbrun_transport::{ClustersClient, RestClient};

#[derive(Parser, Debug)]
#[command(name = "exec-cli", about = "Run a script on a remote execution context", version)]
struct Cli {
    /// Script file to execute.
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Workspace base URL.
    #[arg(long, env = "DBRUN_HOST")]
    host: String,

    /// API token.
    #[arg(long, env = "DBRUN_TOKEN", hide_env_values = true)]
    token: String,

    /// Target cluster id.
    #[arg(long, env = "DBRUN_CLUSTER")]
    cluster: String,

    /// Profile label used in status messages.
    #[arg(long, default_value = "default")]
    profile: String,

    /// Execution language (python|sql|r|scala).
    #[arg(long, default_value = "python")]
    language: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let language: Language = cli.language.parse()?;
    let code = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("reading {}", cli.script.display()))?;

    let transport: Arc<dyn Transport> = Arc::new(RestClient::new(&cli.host, &cli.token)?);
    let clusters = ClustersClient::new(Arc::clone(&transport));
    let cluster_name = match clusters.info(&cli.cluster).await {
        Ok(info) => info
            .get("cluster_name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&cli.cluster)
            .to_string(),
        Err(e) => {
            tracing::warn!("cluster lookup failed: {e}");
            cli.cluster.clone()
        }
    };

    let info = ConnectionInfo::new(&cli.profile, &cli.host, &cli.cluster, cluster_name, language);
    let mut client = ExecutionClient::new(transport, info);

    report(&client.create_context().await)?;
    report(&client.execute(&code, None).await)?;
    report(&client.stop().await)?;
    Ok(())
}

fn report(outcome: &Outcome) -> anyhow::Result<()> {
    if outcome.is_failure() {
        anyhow::bail!("{}", outcome.text());
    }
    println!("{}", outcome.text());
    Ok(())
}
