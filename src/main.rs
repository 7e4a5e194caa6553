mod cli;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use rootstore::config::ServerConfig;
use rootstore::StorageRegistry;

#[derive(Parser)]
#[command(name = "rootstored")]
#[command(about = "Prefix-addressed storage roots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, help = "Config file path")]
    config: Option<String>,

    #[arg(long, help = "Output as JSON")]
    json: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List storage roots with their status and notices
    Roots,
    /// List a folder
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Print a file
    Cat { path: String },
    /// Store a file, read from FILE, --value or stdin
    Put {
        path: String,
        file: Option<PathBuf>,
        #[arg(long, conflicts_with = "file")]
        value: Option<String>,
    },
    /// Delete a file or folder
    Rm { path: String },
    /// Write a default configuration file
    GenerateConfig {
        #[arg(
            long,
            default_value = rootstore::config::DEFAULT_CONFIG_FILE,
            help = "Config file path"
        )]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rootstored=info,rootstore=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::GenerateConfig { output } = &cli.command {
        ServerConfig::default().save(output)?;
        if cli.json {
            println!("{}", serde_json::json!({"config": output}));
        } else {
            println!("✅ Wrote default configuration to {}", output);
        }
        return Ok(());
    }

    let config = ServerConfig::load_or_create(cli.config.as_deref())?;
    if let Err(e) = config.ensure_directories() {
        if cli.json {
            let message = format!("Failed to create directories: {}", e);
            println!("{}", serde_json::json!({ "error": message }));
        } else {
            eprintln!("❌ Failed to create directories: {}", e);
        }
        return Err(e);
    }

    let registry = StorageRegistry::from_config(&config)?;

    match cli.command {
        Commands::Roots => cli::show_roots(&registry, cli.json),
        Commands::Ls { path } => cli::list(&registry, &path, cli.json).await,
        Commands::Cat { path } => cli::cat(&registry, &path, cli.json).await,
        Commands::Put { path, file, value } => {
            let body = match (file, value) {
                (Some(file), _) => tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("failed to read {}", file.display()))?,
                (None, Some(value)) => value.into_bytes(),
                (None, None) => {
                    let mut buf = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buf).await?;
                    buf
                }
            };
            cli::put(&registry, &path, body, cli.json).await
        }
        Commands::Rm { path } => cli::remove(&registry, &path, cli.json).await,
        Commands::GenerateConfig { .. } => Ok(()),
    }
}
