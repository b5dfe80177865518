//! The `drover init` command: write the project configuration.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;

use crate::project::{self, ProjectConfig};

pub fn cmd_init() -> Result<()> {
    let dir = std::env::current_dir().context("failed to get working directory")?;
    let existing = project::load(&dir)?;

    let mut input = Input::<String>::new().with_prompt("Trello board name");
    if let Some(board) = existing.board {
        input = input.default(board);
    }
    let board = input.interact_text().context("prompt cancelled")?;

    project::save(
        &dir,
        &ProjectConfig {
            board: Some(board.trim().to_string()),
        },
    )?;

    println!(
        "{} wrote {}",
        style("✔").green(),
        style(project::PROJECT_FILE).bold()
    );
    Ok(())
}
