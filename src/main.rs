use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use drover::cmd::{self, RunOptions};

#[derive(Parser)]
#[command(name = "drover")]
#[command(version, about = "Autonomous Kanban task runner for AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Autonomously process Ready cards from the board
    Run {
        /// Board name (defaults to the project config)
        #[arg(long)]
        board: Option<String>,
        /// Poll interval in seconds
        #[arg(long, default_value_t = 300)]
        interval: u64,
        /// Per-card timeout in minutes
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        /// Code review timeout in minutes (0 disables review)
        #[arg(long, default_value_t = 10)]
        review_timeout: u64,
        /// Process one card and exit
        #[arg(long)]
        once: bool,
        /// Report what would run without executing anything
        #[arg(long)]
        dry_run: bool,
        /// Plain log output instead of the status renderer
        #[arg(long)]
        no_tui: bool,
    },
    /// Write the project configuration (.drover.toml)
    Init,
    /// Store and verify Trello credentials
    Login,
    /// Create a Ready card from a plan markdown file
    Push {
        /// Plan file; the first `#` heading becomes the card title
        file: PathBuf,
        /// Board name (defaults to the project config)
        #[arg(long)]
        board: Option<String>,
        /// Column to create the card in
        #[arg(long, default_value = "Ready")]
        list: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            board,
            interval,
            timeout,
            review_timeout,
            once,
            dry_run,
            no_tui,
        } => {
            cmd::cmd_run(RunOptions {
                board,
                interval_secs: interval,
                timeout_mins: timeout,
                review_timeout_mins: review_timeout,
                once,
                dry_run,
                no_tui,
            })
            .await
        }
        Commands::Init => cmd::cmd_init(),
        Commands::Login => cmd::cmd_login().await,
        Commands::Push { file, board, list } => cmd::cmd_push(&file, board, &list).await,
    }
}
