use std::path::PathBuf;

use clap::Parser;
use tollgate::{AttemptSummary, PolicyConfig, Tollgate, TollgateBuilder};

/// Command line interface for Tollgate
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, default_value = "sqlite://tollgate.db")]
    db_url: String,

    /// JSON policy file; `TOLLGATE_*` environment variables are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Show the most recent failed logins
    List {
        #[arg(long, default_value_t = 100)]
        limit: u32,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete records older than the retention period
    Prune {
        /// Override the policy's retention period
        #[arg(long)]
        days: Option<u32>,
    },
    /// Delete every record, lifting all blocks
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Evaluate a login attempt as the authentication pipeline would
    Check { address: String, username: String },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("Tollgate v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let policy = match &cli.config {
        Some(path) => PolicyConfig::from_json_file(path)?,
        None => PolicyConfig::from_env()?,
    };

    let tollgate = TollgateBuilder::new()
        .with_sqlite(&cli.db_url)
        .await?
        .with_policy(policy)
        .build()
        .await?;

    match cli.command {
        Commands::Migrate => {
            println!("Running migrations...");
            tollgate.migrate().await?;
        }
        Commands::List { limit, json } => list(&tollgate, limit, json).await?,
        Commands::Prune { days } => {
            let throttle = tollgate.throttle();
            let count = match days {
                Some(days) => throttle.prune(days).await?,
                None => throttle.prune_default().await?,
            };
            println!("Deleted {count} records");
        }
        Commands::Clear { yes } => {
            if !yes {
                return Err("refusing to clear the log without --yes".into());
            }
            let count = tollgate.throttle().clear_all().await?;
            println!("Deleted {count} records");
        }
        Commands::Check { address, username } => {
            let decision = tollgate.throttle().evaluate(&address, &username).await?;
            match decision.message() {
                None => println!("allow"),
                Some(message) => println!("deny: {message}"),
            }
        }
        Commands::Version => {}
    }

    Ok(())
}

async fn list(
    tollgate: &Tollgate,
    limit: u32,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let attempts = tollgate.throttle().list_recent(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&attempts)?);
        return Ok(());
    }

    println!(
        "{:<8} {:<40} {:<24} {:<20} {:<20} STATUS",
        "ID", "ADDRESS", "USERNAME", "DATE", "BLOCKED UNTIL"
    );
    for summary in &attempts {
        println!("{}", format_row(summary));
    }

    Ok(())
}

fn format_row(summary: &AttemptSummary) -> String {
    let attempt = &summary.attempt;
    let blocked_until = attempt
        .blocked_until
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let status = if summary.currently_blocked {
        "blocked"
    } else {
        "failed"
    };

    format!(
        "{:<8} {:<40} {:<24} {:<20} {:<20} {}",
        attempt.id,
        attempt.address,
        attempt.username,
        attempt.occurred_at.format("%Y-%m-%d %H:%M:%S"),
        blocked_until,
        status
    )
}
