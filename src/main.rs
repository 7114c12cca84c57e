use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use snapsweep::{
    config::{ConfigError, SweeperConfig},
    dynamo::AwsDynamo,
    observability,
    policy::{self, AwsIdentity, DeploymentSettings, PolicyError, PolicyTemplate},
    server,
    sweep::{RetentionWindow, SweepError, SweepOptions, Sweeper, SystemClock},
};

#[derive(Parser, Debug)]
#[command(version, about = "Scheduled DynamoDB backup rotation", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (all defaults apply when omitted)
    #[arg(short, long, global = true, env = "SNAPSWEEP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Back up every matching table and delete expired snapshots
    Run {
        /// Log every decision without creating or deleting anything
        #[arg(long)]
        dry_run: bool,
        /// Days to keep snapshots (overrides BACKUP_RETENTION_IN_DAYS)
        #[arg(long, value_name = "DAYS")]
        retention_days: Option<RetentionWindow>,
        /// Only back up tables whose name matches (overrides TABLE_PATTERN)
        #[arg(long, value_name = "REGEX")]
        table_pattern: Option<String>,
    },
    /// Create or update the deployment role for a stage
    UpdateRole {
        /// Stage name in the deployment settings
        stage: String,
        /// Deployment settings file (defaults to policy.settings_path)
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Policy template file (defaults to policy.template_path)
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Serve the HTTP landing endpoint
    Serve,
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sweep(#[from] SweepError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match SweeperConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    let result = match args.command {
        Command::Run {
            dry_run,
            retention_days,
            table_pattern,
        } => run_sweep(config, dry_run, retention_days, table_pattern).await,
        Command::UpdateRole {
            stage,
            settings,
            template,
        } => run_update_role(&config, &stage, settings, template).await,
        Command::Serve => server::serve(&config.server).await.map_err(CliError::from),
        Command::CheckConfig => run_check_config(&config),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// CLI flags take precedence over the environment and the config file.
async fn run_sweep(
    mut config: SweeperConfig,
    dry_run: bool,
    retention_days: Option<RetentionWindow>,
    table_pattern: Option<String>,
) -> Result<(), CliError> {
    if dry_run {
        config.backup.dry_run = true;
    }
    if let Some(retention) = retention_days {
        config.backup.retention_days = retention.as_days();
    }
    if let Some(pattern) = table_pattern {
        config.backup.table_pattern = pattern;
    }

    let options = SweepOptions::from_config(&config.backup)?;

    let dynamo = Arc::new(AwsDynamo::new(&config.aws).await);
    let sweeper = Sweeper::new(dynamo.clone(), dynamo, Arc::new(SystemClock));

    sweeper.sweep(&options).await?;

    Ok(())
}

async fn run_update_role(
    config: &SweeperConfig,
    stage: &str,
    settings_path: Option<PathBuf>,
    template_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let settings_path = settings_path.unwrap_or_else(|| config.policy.settings_path.clone());
    let template_path = template_path.unwrap_or_else(|| config.policy.template_path.clone());

    let settings = DeploymentSettings::from_file(&settings_path)?;
    let template = PolicyTemplate::from_file(&template_path)?;
    let identity = AwsIdentity::new(&config.aws).await;

    let update = policy::update_role(
        stage,
        &settings,
        &template,
        &identity,
        &config.policy.policy_name,
    )
    .await?;

    if update.created {
        println!("Created role {}", update.role_name);
    }
    println!(
        "IAM policy '{}' has been updated on role {}",
        update.policy_name, update.role_name
    );

    Ok(())
}

fn run_check_config(config: &SweeperConfig) -> Result<(), CliError> {
    tracing::info!(
        retention = %config.backup.retention(),
        table_pattern = %config.backup.table_pattern,
        dry_run = config.backup.dry_run,
        "Configuration is valid"
    );

    println!("{}", toml::to_string_pretty(config)?);

    Ok(())
}
