use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tether_lib::notion::NotionClient;
use tether_lib::storage::LocalFs;
use tether_lib::sync::{PassReport, SyncConfig, SyncCursor, SyncManager};

#[derive(Parser)]
#[command(name = "tether-cli", about = "Two-way sync between Notion and an Obsidian vault", version)]
struct Cli {
    /// Config file (default: <config dir>/tether/config.toml)
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Push local changes, pull remote notes and advance the cursor (default)
    Sync,

    /// Only push notes modified since the last sync; the cursor is kept
    Push,

    /// Only pull remote notes into the vault; the cursor is kept
    Pull,
}

fn print_pass(label: &str, pass: &PassReport) {
    println!(
        "{}: {} changed, {} skipped, {} failed",
        label,
        pass.changed(),
        pass.skipped(),
        pass.failed()
    );
    for item in pass.items.iter().filter(|i| i.outcome.is_failure()) {
        println!("  failed: {} ({:?})", item.item, item.outcome);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = SyncConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let client = NotionClient::new(&config.api_base_url, &config.notion_token, &config.notion_version)
        .context("Failed to create Notion client")?;
    let fs = Arc::new(LocalFs);
    let manager = SyncManager::new(config, Arc::new(client), fs.clone());

    match cli.command.unwrap_or(Command::Sync) {
        Command::Sync => {
            let report = manager.run().await.context("Sync failed")?;
            print_pass("push", &report.push);
            print_pass("pull", &report.pull);
            println!("{}", report);
        }
        Command::Push => {
            let since = SyncCursor::new(manager.config().cursor_path.clone())
                .load(fs.as_ref())
                .await
                .context("Failed to read sync cursor")?;
            let pass = manager.push_local_changes(since).await.context("Push failed")?;
            print_pass("push", &pass);
        }
        Command::Pull => {
            let pass = manager.pull_remote_notes().await.context("Pull failed")?;
            print_pass("pull", &pass);
        }
    }

    Ok(())
}
