use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use envstore_client::{EnvstoreClient, PollPolicy};
use envstore_config::{load as load_config, AppConfig};
use envstore_journeys::run_environment_journey;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "envstore",
    about = "Drive an envstore server through its REST API",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a namespace and wait for it to become ready.
    CreateNamespace {
        /// Namespace name; a random hex name is generated when omitted.
        name: Option<String>,
    },
    /// Submit a specification file and wait for the build to finish.
    CreateEnvironment {
        namespace: String,
        specification: PathBuf,
    },
    /// Delete an environment.
    DeleteEnvironment { namespace: String, name: String },
    /// Delete a namespace.
    DeleteNamespace { name: String },
    /// Mint a scoped token for a role within a namespace.
    MintToken {
        namespace: String,
        role: String,
        #[arg(long, default_value = "default")]
        primary_namespace: String,
    },
    /// Run the full create/build/teardown journey in a fresh namespace.
    Journey {
        /// Environment name declared inside the specification file.
        environment: String,
        specification: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.telemetry.log_level);

    let client = build_client(&config).await?;
    let policy = poll_policy(&config);
    info!(target: "cli", base_url = %client.base_url(), "client ready");

    match cli.command {
        Command::CreateNamespace { name } => {
            let response = client.create_namespace(name.as_deref(), &policy).await?;
            println!("{}", response.body);
        }
        Command::CreateEnvironment {
            namespace,
            specification,
        } => {
            let response = client
                .create_environment(&namespace, &specification, &policy)
                .await?;
            println!("{}", response.body);
        }
        Command::DeleteEnvironment { namespace, name } => {
            let response = client.delete_environment(&namespace, &name).await?;
            println!("{}", response.body);
        }
        Command::DeleteNamespace { name } => {
            let response = client.delete_namespace(&name).await?;
            println!("{}", response.body);
        }
        Command::MintToken {
            namespace,
            role,
            primary_namespace,
        } => {
            let response = client
                .mint_token(&namespace, &role, &primary_namespace)
                .await?;
            println!("{}", response.body);
        }
        Command::Journey {
            environment,
            specification,
        } => {
            let report =
                run_environment_journey(&client, &environment, &specification, &policy).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let fmt_layer = fmt::layer().with_target(true).with_level(true);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn build_client(config: &AppConfig) -> Result<EnvstoreClient> {
    let builder = EnvstoreClient::builder(&config.server.base_url);
    let builder = match &config.auth.token {
        Some(token) => builder.token(token),
        None => builder.credentials(&config.auth.username, &config.auth.password),
    };
    Ok(builder.connect().await?)
}

fn poll_policy(config: &AppConfig) -> PollPolicy {
    PollPolicy::new(
        config.polling.max_iterations,
        Duration::from_secs(config.polling.sleep_seconds),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn create_namespace_accepts_optional_name() {
        let cli = Cli::parse_from(["envstore", "create-namespace"]);
        assert!(matches!(
            cli.command,
            Command::CreateNamespace { name: None }
        ));

        let cli = Cli::parse_from(["envstore", "create-namespace", "team-a"]);
        match cli.command {
            Command::CreateNamespace { name } => assert_eq!(name.as_deref(), Some("team-a")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn mint_token_defaults_primary_namespace() {
        let cli = Cli::parse_from(["envstore", "mint-token", "team-a", "developer"]);
        match cli.command {
            Command::MintToken {
                namespace,
                role,
                primary_namespace,
            } => {
                assert_eq!(namespace, "team-a");
                assert_eq!(role, "developer");
                assert_eq!(primary_namespace, "default");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn poll_policy_maps_config_values() {
        let mut config = AppConfig::default();
        config.polling.max_iterations = 7;
        config.polling.sleep_seconds = 2;

        let policy = poll_policy(&config);
        assert_eq!(policy.max_iterations, 7);
        assert_eq!(policy.sleep, Duration::from_secs(2));
    }
}
