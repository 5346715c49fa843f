//! MCP Jive command-line entry point
//!
//! `jive server start` runs the stdio MCP server; `jive sync export` and
//! `jive sync import` drive markdown I/O without a server. Exit codes:
//! 0 success, 1 validation failure, 2 unrecoverable internal error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use jive_application::ImportMode;
use jive_domain::entities::MemoryNamespace;
use jive_infrastructure::{AppConfig, AppContext, logging};
use jive_server::{McpServer, ServerConfig};

#[derive(Parser)]
#[command(name = "jive", version, about = "MCP Jive - agile workflow engine over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Server lifecycle
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },
    /// Markdown export/import
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Run the MCP server on stdio until stdin closes
    Start,
}

#[derive(Subcommand)]
enum SyncCommand {
    /// Export memory items to markdown files
    Export {
        /// Target directory
        #[arg(long)]
        dir: PathBuf,
    },
    /// Import memory items from markdown files
    Import {
        /// Source directory
        #[arg(long)]
        dir: PathBuf,
        /// Merge mode
        #[arg(long, default_value = "create_or_update")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };
    logging::init_logging(&config);

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "unrecoverable error");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<ExitCode> {
    let app = Arc::new(AppContext::build(config).await?);

    match cli.command {
        Command::Server {
            command: ServerCommand::Start,
        } => {
            let server = McpServer::new(app, ServerConfig::default())?;
            server.run().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync { command } => match command {
            SyncCommand::Export { dir } => {
                for namespace in [MemoryNamespace::Architecture, MemoryNamespace::Troubleshoot] {
                    let report = app.sync.export_namespace(namespace, &dir).await?;
                    tracing::info!(
                        namespace = %report.namespace,
                        exported = report.exported,
                        dir = %report.directory.display(),
                        "export complete"
                    );
                }
                Ok(ExitCode::SUCCESS)
            }
            SyncCommand::Import { dir, mode } => {
                let Ok(mode) = mode.parse::<ImportMode>() else {
                    eprintln!(
                        "invalid mode '{mode}': expected create_only, update_only, \
                         create_or_update, or replace"
                    );
                    return Ok(ExitCode::from(1));
                };
                let mut failures = 0usize;
                for namespace in [MemoryNamespace::Architecture, MemoryNamespace::Troubleshoot] {
                    let report = app.sync.import_namespace(namespace, &dir, mode).await?;
                    failures += report.failures.len();
                    tracing::info!(
                        namespace = %namespace,
                        created = report.created,
                        updated = report.updated,
                        skipped = report.skipped,
                        failed = report.failures.len(),
                        "import complete"
                    );
                    for failure in &report.failures {
                        eprintln!("import failure: {failure}");
                    }
                }
                if failures > 0 {
                    Ok(ExitCode::from(1))
                } else {
                    Ok(ExitCode::SUCCESS)
                }
            }
        },
    }
}
