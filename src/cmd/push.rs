//! The `drover push` command: create a board card from a plan file.
//!
//! The card title comes from the file's first `#` heading; the whole file
//! becomes the card description, which the runner later hands to the agent
//! verbatim.

use std::path::Path;

use anyhow::{bail, Context, Result};
use console::style;

use crate::auth::CredentialStore;
use crate::board::{BoardApi, TrelloClient};
use crate::config::Config;
use crate::project;

pub async fn cmd_push(file: &Path, board: Option<String>, list: &str) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let Some(title) = extract_title(&content) else {
        bail!("no # heading found in {}", file.display());
    };

    let config = Config::load(None)?;
    let board_name = match board {
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
    let client = TrelloClient::new(
        creds.get("api_key").cloned().unwrap_or_default(),
        creds.get("token").cloned().unwrap_or_default(),
    );

    let board = client.find_board(&board_name).await?;
    let column = client.find_column(&board.id, list).await?;
    let card = client.create_card(&column.id, &title, &content).await?;

    println!(
        "{} created card {} in {}",
        style("✔").green(),
        style(&card.name).bold(),
        style(list).bold()
    );
    println!("  {}", card.url());
    Ok(())
}

/// First `#` heading in the file, without the marker.
fn extract_title(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.strip_prefix("# ")
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_comes_from_first_heading() {
        let content = "intro\n# Fix the login flow\n## Details\n# Second";
        assert_eq!(extract_title(content), Some("Fix the login flow".to_string()));
    }

    #[test]
    fn deeper_headings_do_not_count() {
        assert_eq!(extract_title("## Only a subheading\ntext"), None);
    }

    #[test]
    fn empty_heading_is_skipped() {
        assert_eq!(extract_title("# \n# Real title"), Some("Real title".to_string()));
    }
}
