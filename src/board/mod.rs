//! Board types and the API seam the runner consumes.
//!
//! The runner only ever talks to a [`BoardApi`] trait object; the concrete
//! Trello client lives in [`client`] and test doubles implement the trait
//! directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod client;

pub use client::TrelloClient;

/// A board, resolved by name at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
}

/// A named column (Trello calls these lists). Cards belong to exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A single work unit. `desc` holds the plan the agent executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, rename = "idList")]
    pub column_id: String,
    #[serde(default, rename = "shortUrl")]
    pub short_url: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Card {
    /// Web URL for the card, for PR bodies and comments.
    pub fn url(&self) -> String {
        if self.short_url.is_empty() {
            format!("https://trello.com/c/{}", self.id)
        } else {
            self.short_url.clone()
        }
    }
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board not found: {0}")]
    BoardNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("board API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("board API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode board API response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// The board operations the runner consumes. All errors are treated as
/// transient during polling and best-effort during status updates.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn find_board(&self, name: &str) -> Result<Board, BoardError>;
    async fn find_column(&self, board_id: &str, name: &str) -> Result<Column, BoardError>;
    async fn fetch_cards(&self, column_id: &str) -> Result<Vec<Card>, BoardError>;
    async fn move_card(&self, card_id: &str, column_id: &str) -> Result<(), BoardError>;
    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), BoardError>;
    async fn create_card(&self, column_id: &str, name: &str, desc: &str)
        -> Result<Card, BoardError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_decodes_trello_payload() {
        let json = r##"{
            "id": "abc123",
            "name": "Fix auth bug",
            "desc": "# Plan\ndo it",
            "idList": "list9",
            "shortUrl": "https://trello.com/c/abc123",
            "labels": [{"id": "l1", "name": "P0-crit"}]
        }"##;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.id, "abc123");
        assert_eq!(card.column_id, "list9");
        assert_eq!(card.labels[0].name, "P0-crit");
    }

    #[test]
    fn card_decodes_with_missing_optional_fields() {
        let card: Card = serde_json::from_str(r#"{"id":"x","name":"y"}"#).unwrap();
        assert!(card.desc.is_empty());
        assert!(card.labels.is_empty());
        assert_eq!(card.url(), "https://trello.com/c/x");
    }

    #[test]
    fn card_url_prefers_short_url() {
        let card: Card =
            serde_json::from_str(r#"{"id":"x","name":"y","shortUrl":"https://trello.com/c/x9"}"#)
                .unwrap();
        assert_eq!(card.url(), "https://trello.com/c/x9");
    }
}
