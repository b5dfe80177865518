//! Renderers for the runner's event stream.
//!
//! Two modes: a timestamped plain-text log for non-interactive use (and
//! `--no-tui`), and a `console`/`indicatif` status renderer for terminals —
//! a steady spinner carrying the live activity line, with card-level
//! milestones printed above it.

use chrono::Local;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tokio::sync::mpsc::Receiver;

use crate::runner::events::RunnerEvent;
use crate::util::{format_duration_ms, format_duration_secs, format_tokens, truncate};

/// Consume events until the runner closes the channel.
pub async fn render_events(mut rx: Receiver<RunnerEvent>, plain: bool) {
    if plain {
        while let Some(event) = rx.recv().await {
            render_plain(&event);
        }
    } else {
        let mut renderer = StatusRenderer::new();
        while let Some(event) = rx.recv().await {
            renderer.render(&event);
        }
        renderer.finish();
    }
}

fn timestamp() -> String {
    Local::now().format("%Y/%m/%d %H:%M:%S").to_string()
}

fn render_plain(event: &RunnerEvent) {
    let ts = timestamp();
    match event {
        RunnerEvent::RunnerStarted {
            board_name,
            board_id,
            columns,
        } => {
            println!("{ts} Board: {board_name} ({board_id})");
            let mut names: Vec<_> = columns.iter().collect();
            names.sort();
            for (name, id) in names {
                println!("{ts}   Column {name:?} -> {id}");
            }
        }
        RunnerEvent::Polling => println!("{ts} Polling for tasks..."),
        RunnerEvent::NoTasks { next_poll_secs } => {
            println!("{ts} No tasks. Next poll in {}", format_duration_secs(*next_poll_secs));
        }
        RunnerEvent::CardStarted {
            card_name, branch, ..
        } => {
            println!("{ts} [card] Started: {card_name:?} on branch {branch}");
        }
        RunnerEvent::CardDryRun { card_name, .. } => {
            println!("{ts} [dry-run] Would process card: {card_name:?}");
        }
        RunnerEvent::TextOutput { text } => {
            println!("{ts} [text] {}", truncate(text, 120));
        }
        RunnerEvent::ToolStart { tool_name, input } => {
            println!("{ts} [tool] {tool_name} {} ...", tool_summary(tool_name, input));
        }
        RunnerEvent::ToolResult {
            tool_name,
            duration_ms,
            ..
        } => {
            println!("{ts} [tool] {tool_name} done ({})", format_duration_ms(*duration_ms));
        }
        RunnerEvent::StatsUpdate {
            input_tokens,
            output_tokens,
            turns,
        } => {
            if *turns > 0 {
                println!(
                    "{ts} [stats] in:{} out:{} turns:{turns}",
                    format_tokens(*input_tokens),
                    format_tokens(*output_tokens)
                );
            }
        }
        RunnerEvent::ReviewStarted { pr_url } => {
            println!("{ts} [review] Starting code review for {pr_url}");
        }
        RunnerEvent::ReviewDone { exit_code, .. } => {
            println!("{ts} [review] Done (exit {exit_code})");
        }
        RunnerEvent::CardDone {
            card_name,
            pr_url,
            duration_secs,
            ..
        } => {
            println!(
                "{ts} [card] Done: {card_name:?} ({}) PR: {pr_url}",
                format_duration_secs(*duration_secs)
            );
        }
        RunnerEvent::CardFailed {
            card_name,
            err_msg,
            duration_secs,
            ..
        } => {
            println!(
                "{ts} [card] Failed: {card_name:?} ({}) — {err_msg}",
                format_duration_secs(*duration_secs)
            );
        }
        RunnerEvent::RunnerError { message } => println!("{ts} [error] {message}"),
        RunnerEvent::RunnerStopped => println!("{ts} Runner stopped."),
    }
}

/// Spinner-based renderer for interactive terminals.
struct StatusRenderer {
    spinner: ProgressBar,
}

impl StatusRenderer {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .expect("spinner template is a valid static string"),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { spinner }
    }

    fn println(&self, msg: String) {
        self.spinner.println(msg);
    }

    fn render(&mut self, event: &RunnerEvent) {
        match event {
            RunnerEvent::RunnerStarted {
                board_name,
                board_id,
                ..
            } => {
                self.println(format!(
                    "{} {} ({})",
                    style("Board:").bold(),
                    board_name,
                    style(board_id).dim()
                ));
            }
            RunnerEvent::Polling => self.spinner.set_message("polling for tasks..."),
            RunnerEvent::NoTasks { next_poll_secs } => {
                self.spinner.set_message(format!(
                    "no tasks — next poll in {}",
                    format_duration_secs(*next_poll_secs)
                ));
            }
            RunnerEvent::CardStarted {
                card_name, branch, ..
            } => {
                self.println(format!(
                    "{} {} {}",
                    style("▶").cyan(),
                    style(card_name).bold(),
                    style(format!("[{branch}]")).dim()
                ));
                self.spinner.set_message("agent starting...");
            }
            RunnerEvent::CardDryRun { card_name, .. } => {
                self.println(format!(
                    "{} would process {}",
                    style("dry-run").yellow(),
                    style(card_name).bold()
                ));
            }
            RunnerEvent::TextOutput { text } => {
                self.spinner.set_message(truncate(text, 80));
            }
            RunnerEvent::ToolStart { tool_name, input } => {
                self.spinner
                    .set_message(format!("{tool_name} {}", tool_summary(tool_name, input)));
            }
            RunnerEvent::ToolResult {
                tool_name,
                duration_ms,
                ..
            } => {
                self.spinner.set_message(format!(
                    "{tool_name} done ({})",
                    format_duration_ms(*duration_ms)
                ));
            }
            RunnerEvent::StatsUpdate {
                input_tokens,
                output_tokens,
                turns,
            } => {
                if *turns > 0 {
                    self.println(format!(
                        "  {} in:{} out:{} turns:{turns}",
                        style("tokens").dim(),
                        format_tokens(*input_tokens),
                        format_tokens(*output_tokens)
                    ));
                }
            }
            RunnerEvent::ReviewStarted { .. } => {
                self.spinner.set_message("reviewing PR...");
            }
            RunnerEvent::ReviewDone { exit_code, .. } => {
                self.println(format!(
                    "  {} review finished (exit {exit_code})",
                    style("✓").green()
                ));
            }
            RunnerEvent::CardDone {
                card_name,
                pr_url,
                duration_secs,
                ..
            } => {
                self.println(format!(
                    "{} {} ({}) {}",
                    style("✔").green().bold(),
                    style(card_name).bold(),
                    format_duration_secs(*duration_secs),
                    style(pr_url).underlined()
                ));
            }
            RunnerEvent::CardFailed {
                card_name,
                err_msg,
                duration_secs,
                ..
            } => {
                self.println(format!(
                    "{} {} ({}) {}",
                    style("✘").red().bold(),
                    style(card_name).bold(),
                    format_duration_secs(*duration_secs),
                    style(err_msg).red()
                ));
            }
            RunnerEvent::RunnerError { message } => {
                self.println(format!("{} {message}", style("error:").red().bold()));
            }
            RunnerEvent::RunnerStopped => {
                self.spinner.set_message("stopped");
            }
        }
    }

    fn finish(self) {
        self.spinner.finish_with_message("runner stopped");
    }
}

/// One-line summary of a tool invocation for the activity display.
fn tool_summary(name: &str, input: &Map<String, Value>) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str).map(str::to_string);
    match name {
        "Read" | "Write" | "Edit" => field("file_path").unwrap_or_default(),
        "Bash" => field("command").map(|c| truncate(&c, 60)).unwrap_or_default(),
        "Glob" | "Grep" => field("pattern").map(|p| truncate(&p, 40)).unwrap_or_default(),
        _ => String::new(),
    }
}
