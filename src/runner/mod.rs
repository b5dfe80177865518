//! The supervision loop: poll the board, run the agent, drive the PR
//! workflow, report status back to the board.
//!
//! The runner is strictly sequential — one card in flight at a time, because
//! the working tree is shared state. Collaborators (board, workspace) come
//! in as trait objects so tests can substitute doubles; the agent command is
//! part of the configuration for the same reason.

pub mod bridge;
pub mod events;
pub mod executor;
pub mod priority;
pub mod review;
pub mod shutdown;
pub mod stream;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::board::{BoardApi, BoardError, Card};
use crate::git::{GitError, Workspace};
use crate::util::format_duration_secs;

use bridge::EventBridge;
use events::{EventSink, RunnerEvent};
use executor::{ExecuteResult, Executor, ExecutorError, OutputStream};
use review::Reviewer;
use shutdown::ShutdownToken;

pub const COLUMN_READY: &str = "Ready";
pub const COLUMN_IN_PROGRESS: &str = "In Progress";
pub const COLUMN_DONE: &str = "Done";
pub const COLUMN_FAILED: &str = "Failed";

/// Everything the runner needs to know up front.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub board_name: String,
    pub poll_interval: Duration,
    /// Per-card deadline for the agent run.
    pub card_timeout: Duration,
    /// Deadline for the review pass; zero disables review entirely.
    pub review_timeout: Duration,
    pub once: bool,
    pub dry_run: bool,
    pub work_dir: PathBuf,
    /// Root for persisted state; per-card logs land in `<state_dir>/logs`.
    pub state_dir: PathBuf,
    pub agent_command: String,
    pub agent_args: Vec<String>,
}

/// Fatal startup failures. Everything below this scope is absorbed into a
/// card failure or a logged warning.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("find board {name:?}: {source}")]
    BoardLookup {
        name: String,
        #[source]
        source: BoardError,
    },

    #[error("find column {name:?}: {source}")]
    ColumnLookup {
        name: String,
        #[source]
        source: BoardError,
    },

    #[error("working tree check failed: {0}")]
    WorktreeCheck(#[source] GitError),

    #[error("working tree has uncommitted changes; commit or stash them before running")]
    DirtyWorktree,
}

/// Column ids resolved once at startup.
struct ResolvedBoard {
    ready: String,
    in_progress: String,
    done: String,
    failed: String,
}

pub struct Runner {
    config: RunnerConfig,
    board: Arc<dyn BoardApi>,
    workspace: Arc<dyn Workspace>,
    events: EventSink,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        board: Arc<dyn BoardApi>,
        workspace: Arc<dyn Workspace>,
        events: EventSink,
    ) -> Self {
        Self {
            config,
            board,
            workspace,
            events,
        }
    }

    /// Run the polling loop until cancelled (or after one card in `--once`
    /// mode). Exactly one `RunnerStopped` event is emitted on every exit
    /// path past initialization.
    pub async fn run(&self, mut cancel: ShutdownToken) -> Result<(), RunnerError> {
        let resolved = self.init().await?;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.events.emit(RunnerEvent::Polling);
            let mut cards = match self.board.fetch_cards(&resolved.ready).await {
                Ok(cards) => cards,
                Err(err) => {
                    self.events.emit(RunnerEvent::RunnerError {
                        message: format!("poll failed: {err}"),
                    });
                    if !self.sleep(&mut cancel).await {
                        break;
                    }
                    continue;
                }
            };

            if cards.is_empty() {
                self.events.emit(RunnerEvent::NoTasks {
                    next_poll_secs: self.config.poll_interval.as_secs(),
                });
                if !self.sleep(&mut cancel).await {
                    break;
                }
                continue;
            }

            priority::sort_by_priority(&mut cards);
            let card = cards.remove(0);
            self.process_card(&resolved, card, &cancel).await;

            if self.config.once {
                break;
            }
        }

        self.events.emit(RunnerEvent::RunnerStopped);
        Ok(())
    }

    /// Resolve the board and all four columns, verify the working tree is
    /// clean, and announce the runner. Fails loudly; there is no retry here.
    async fn init(&self) -> Result<ResolvedBoard, RunnerError> {
        let board_name = &self.config.board_name;
        let board =
            self.board
                .find_board(board_name)
                .await
                .map_err(|source| RunnerError::BoardLookup {
                    name: board_name.clone(),
                    source,
                })?;

        let mut ids = Vec::with_capacity(4);
        for name in [COLUMN_READY, COLUMN_IN_PROGRESS, COLUMN_DONE, COLUMN_FAILED] {
            let column = self
                .board
                .find_column(&board.id, name)
                .await
                .map_err(|source| RunnerError::ColumnLookup {
                    name: name.to_string(),
                    source,
                })?;
            ids.push(column.id);
        }
        let [ready, in_progress, done, failed]: [String; 4] =
            ids.try_into().expect("four columns resolved");

        match self.workspace.is_clean().await {
            Ok(true) => {}
            Ok(false) => return Err(RunnerError::DirtyWorktree),
            Err(err) => return Err(RunnerError::WorktreeCheck(err)),
        }

        self.events.emit(RunnerEvent::RunnerStarted {
            board_name: board_name.clone(),
            board_id: board.id.clone(),
            columns: [
                (COLUMN_READY, &ready),
                (COLUMN_IN_PROGRESS, &in_progress),
                (COLUMN_DONE, &done),
                (COLUMN_FAILED, &failed),
            ]
            .into_iter()
            .map(|(name, id)| (name.to_string(), id.clone()))
            .collect(),
        });

        Ok(ResolvedBoard {
            ready,
            in_progress,
            done,
            failed,
        })
    }

    /// Full lifecycle for one card. Every exit emits exactly one of
    /// `CardDone`, `CardFailed`, or `CardDryRun`.
    async fn process_card(&self, resolved: &ResolvedBoard, card: Card, cancel: &ShutdownToken) {
        let start = Instant::now();

        if card.desc.is_empty() {
            let err_msg = "Empty plan — card description is empty";
            if let Err(err) = self.board.move_card(&card.id, &resolved.failed).await {
                eprintln!("[runner] failed to move card to Failed: {err}");
            }
            let comment = format!("❌ Task failed\nError: {err_msg}");
            if let Err(err) = self.board.add_comment(&card.id, &comment).await {
                eprintln!("[runner] failed to comment on card: {err}");
            }
            self.events.emit(RunnerEvent::CardFailed {
                card_id: card.id.clone(),
                card_name: card.name.clone(),
                err_msg: err_msg.to_string(),
                duration_secs: 0,
            });
            return;
        }

        if self.config.dry_run {
            self.events.emit(RunnerEvent::CardDryRun {
                card_id: card.id.clone(),
                card_name: card.name.clone(),
            });
            return;
        }

        // Best-effort: the agent run proceeds even if the board move fails.
        if let Err(err) = self.board.move_card(&card.id, &resolved.in_progress).await {
            eprintln!("[runner] failed to move card to In Progress: {err}");
        }

        let branch = self.workspace.branch_name(&card.id, &card.name);
        if let Err(err) = self.workspace.checkout_default().await {
            self.fail_card(resolved, &card, start, &format!("checkout default branch: {err}"))
                .await;
            return;
        }
        if let Err(err) = self.workspace.pull_ff_only().await {
            eprintln!("[runner] pull --ff-only failed (continuing): {err}");
        }
        if let Err(err) = self.workspace.create_branch(&branch).await {
            self.fail_card(resolved, &card, start, &format!("create branch: {err}"))
                .await;
            self.restore_default_branch().await;
            return;
        }

        self.events.emit(RunnerEvent::CardStarted {
            card_id: card.id.clone(),
            card_name: card.name.clone(),
            branch: branch.clone(),
        });

        let prompt = build_prompt(&card);
        let outcome = self.run_agent(&prompt, cancel.clone()).await;

        // Persist the captured output regardless of how the run ended.
        match &outcome {
            Ok(result) | Err(ExecutorError::Interrupted { result }) => {
                self.save_log(&card.id, result);
            }
            Err(_) => {}
        }

        let result = match outcome {
            Ok(result) => result,
            Err(ExecutorError::Interrupted { result }) => {
                let err_msg = if result.timed_out {
                    "execution timed out"
                } else {
                    "execution interrupted"
                };
                self.fail_card(resolved, &card, start, err_msg).await;
                self.restore_default_branch().await;
                return;
            }
            Err(err) => {
                self.fail_card(resolved, &card, start, &format!("agent run failed: {err}"))
                    .await;
                self.restore_default_branch().await;
                return;
            }
        };

        if result.exit_code != 0 {
            let stderr = result.stderr.trim();
            let err_msg = if stderr.is_empty() {
                "non-zero exit code".to_string()
            } else {
                crate::util::truncate(stderr, 500)
            };
            self.fail_card(resolved, &card, start, &err_msg).await;
            self.restore_default_branch().await;
            return;
        }

        // Verify the agent actually committed before publishing anything.
        match self.workspace.has_new_commits(&branch).await {
            Ok(true) => {}
            Ok(false) => {
                self.fail_card(resolved, &card, start, "agent produced no commits on task branch")
                    .await;
                self.restore_default_branch().await;
                return;
            }
            Err(err) => {
                self.fail_card(resolved, &card, start, &format!("check commits: {err}"))
                    .await;
                self.restore_default_branch().await;
                return;
            }
        }

        if let Err(err) = self.workspace.push(&branch).await {
            self.fail_card(resolved, &card, start, &format!("git push: {err}"))
                .await;
            self.restore_default_branch().await;
            return;
        }

        let pr_body = format!("## Task\n{}\n\n🤖 Executed by drover", card.url());
        let pr_url = match self.workspace.create_pr(&card.name, &pr_body).await {
            Ok(url) => url,
            Err(err) => {
                self.fail_card(resolved, &card, start, &format!("create PR: {err}"))
                    .await;
                self.restore_default_branch().await;
                return;
            }
        };

        if !self.config.review_timeout.is_zero() {
            self.review_pr(&pr_url, cancel.clone()).await;
        }

        // Approval may be required; auto-merge failure never fails the card.
        if let Err(err) = self.workspace.merge_pr().await {
            eprintln!("[runner] auto-merge failed (may need approval): {err}");
        }

        let duration_secs = start.elapsed().as_secs();
        if let Err(err) = self.board.move_card(&card.id, &resolved.done).await {
            eprintln!("[runner] failed to move card to Done: {err}");
        }
        let comment = format!(
            "✅ Task completed by drover\nDuration: {}\nPR: {}",
            format_duration_secs(duration_secs),
            pr_url
        );
        if let Err(err) = self.board.add_comment(&card.id, &comment).await {
            eprintln!("[runner] failed to comment on card: {err}");
        }
        self.events.emit(RunnerEvent::CardDone {
            card_id: card.id.clone(),
            card_name: card.name.clone(),
            pr_url,
            duration_secs,
        });

        self.restore_default_branch().await;
        if let Err(err) = self.workspace.pull_ff_only().await {
            eprintln!("[runner] pull --ff-only failed (continuing): {err}");
        }
    }

    /// Run the agent with the stream parser and event bridge wired into the
    /// per-line handler. Parse errors are logged and skipped; one bad line
    /// must not end the session.
    async fn run_agent(
        &self,
        prompt: &str,
        cancel: ShutdownToken,
    ) -> Result<ExecuteResult, ExecutorError> {
        let mut bridge = EventBridge::new(self.events.clone());
        let executor = Executor::new()
            .command(self.config.agent_command.clone(), self.config.agent_args.clone())
            .output_handler(move |line| {
                if line.stream != OutputStream::Stdout {
                    return;
                }
                match stream::parse_line(&line.text) {
                    Ok(Some(event)) => bridge.handle(event),
                    Ok(None) => {}
                    Err(err) => eprintln!("[runner] stream parse error: {err}"),
                }
            });
        executor
            .run(prompt, Some(self.config.card_timeout), cancel)
            .await
    }

    async fn review_pr(&self, pr_url: &str, cancel: ShutdownToken) {
        self.events.emit(RunnerEvent::ReviewStarted {
            pr_url: pr_url.to_string(),
        });
        let reviewer = Reviewer::new(
            self.config.agent_command.clone(),
            self.config.agent_args.clone(),
        );
        match reviewer
            .review(pr_url, self.config.review_timeout, cancel)
            .await
        {
            Ok(result) => self.events.emit(RunnerEvent::ReviewDone {
                pr_url: pr_url.to_string(),
                exit_code: result.exit_code,
            }),
            Err(err) => eprintln!("[runner] code review error: {err}"),
        }
    }

    async fn fail_card(
        &self,
        resolved: &ResolvedBoard,
        card: &Card,
        start: Instant,
        err_msg: &str,
    ) {
        let duration_secs = start.elapsed().as_secs();
        let comment = format!(
            "❌ Task failed\nDuration: {}\nError: {}\nSee full log: {}",
            format_duration_secs(duration_secs),
            err_msg,
            self.log_path(&card.id).display()
        );
        if let Err(err) = self.board.move_card(&card.id, &resolved.failed).await {
            eprintln!("[runner] failed to move card to Failed: {err}");
        }
        if let Err(err) = self.board.add_comment(&card.id, &comment).await {
            eprintln!("[runner] failed to comment on card: {err}");
        }
        self.events.emit(RunnerEvent::CardFailed {
            card_id: card.id.clone(),
            card_name: card.name.clone(),
            err_msg: err_msg.to_string(),
            duration_secs,
        });
        eprintln!("[runner] card {:?} failed: {err_msg}", card.name);
    }

    async fn restore_default_branch(&self) {
        if let Err(err) = self.workspace.checkout_default().await {
            eprintln!("[runner] failed to restore default branch: {err}");
        }
    }

    fn log_path(&self, card_id: &str) -> PathBuf {
        self.config.state_dir.join("logs").join(format!("{card_id}.log"))
    }

    fn save_log(&self, card_id: &str, result: &ExecuteResult) {
        let log_dir = self.config.state_dir.join("logs");
        if let Err(err) = std::fs::create_dir_all(&log_dir) {
            eprintln!("[runner] failed to create log directory: {err}");
            return;
        }
        let content = format!(
            "=== STDOUT ===\n{}\n\n=== STDERR ===\n{}\n",
            result.stdout, result.stderr
        );
        if let Err(err) = std::fs::write(self.log_path(card_id), content) {
            eprintln!("[runner] failed to write card log: {err}");
        }
    }

    /// Interruptible sleep between polls. Returns false when cancellation
    /// fired, signalling the loop to exit.
    async fn sleep(&self, cancel: &mut ShutdownToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.poll_interval) => true,
        }
    }
}

fn build_prompt(card: &Card) -> String {
    format!(
        "Execute the following task plan.\n\n\
         Task: {}\n\n\
         Plan:\n{}\n\n\
         When done:\n\
         - Commit all changes with a descriptive message\n\
         - Push to the current branch",
        card.name, card.desc
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_name_plan_and_instructions() {
        let card = Card {
            id: "c1".to_string(),
            name: "Fix auth bug".to_string(),
            desc: "# Plan\n1. find it\n2. fix it".to_string(),
            column_id: String::new(),
            short_url: String::new(),
            labels: vec![],
        };
        let prompt = build_prompt(&card);
        assert!(prompt.contains("Task: Fix auth bug"));
        assert!(prompt.contains("# Plan\n1. find it\n2. fix it"));
        assert!(prompt.contains("Commit all changes"));
    }
}
