//! The `drover run` command: wire the collaborators and start the loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::auth::CredentialStore;
use crate::board::{BoardApi, TrelloClient};
use crate::config::Config;
use crate::git::{GitOps, Workspace};
use crate::project;
use crate::runner::{events, shutdown, Runner, RunnerConfig};
use crate::ui;

pub struct RunOptions {
    pub board: Option<String>,
    pub interval_secs: u64,
    pub timeout_mins: u64,
    pub review_timeout_mins: u64,
    pub once: bool,
    pub dry_run: bool,
    pub no_tui: bool,
}

pub async fn cmd_run(opts: RunOptions) -> Result<()> {
    let config = Config::load(None)?;
    config.ensure_directories()?;

    let board_name = match opts.board {
        Some(board) => board,
        None => project::load(&config.work_dir)?.board.unwrap_or_default(),
    };
    if board_name.is_empty() {
        bail!("--board is required (or set one with `drover init`)");
    }

    let store = CredentialStore::new(config.credentials_path());
    let creds = store
        .load("trello")
        .context("not logged in to Trello; run `drover login` first")?;
    let api_key = creds.get("api_key").cloned().unwrap_or_default();
    let token = creds.get("token").cloned().unwrap_or_default();
    if api_key.is_empty() || token.is_empty() {
        bail!("stored Trello credentials are incomplete; run `drover login` again");
    }

    let board: Arc<dyn BoardApi> = Arc::new(TrelloClient::new(api_key, token));
    let workspace: Arc<dyn Workspace> = Arc::new(GitOps::new(&config.work_dir));

    let runner_config = RunnerConfig {
        board_name,
        poll_interval: Duration::from_secs(opts.interval_secs),
        card_timeout: Duration::from_secs(opts.timeout_mins * 60),
        review_timeout: Duration::from_secs(opts.review_timeout_mins * 60),
        once: opts.once,
        dry_run: opts.dry_run,
        work_dir: config.work_dir.clone(),
        state_dir: config.state_dir.clone(),
        agent_command: config.agent_command.clone(),
        agent_args: config.agent_args.clone(),
    };

    let (sink, rx) = events::channel();
    let (controller, cancel) = shutdown::channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n[runner] interrupt received, finishing current task...");
            controller.trigger();
        }
    });

    let plain = opts.no_tui || !console::Term::stdout().is_term();
    let runner = Runner::new(runner_config, board, workspace, sink);
    let runner_task = tokio::spawn(async move { runner.run(cancel).await });

    // The render loop ends when the runner drops its event sink.
    ui::render_events(rx, plain).await;

    runner_task.await.context("runner task panicked")??;
    Ok(())
}
