//! Trello REST client.
//!
//! Auth is the key+token query-parameter scheme; every request carries both.
//! Responses other than 2xx surface as [`BoardError::Status`] with the body
//! attached, which is what the runner logs on transient poll failures.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{Board, BoardApi, BoardError, Card, Column};

const DEFAULT_BASE_URL: &str = "https://api.trello.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TrelloClient {
    api_key: String,
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl TrelloClient {
    pub fn new(api_key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("default reqwest client"),
        }
    }

    /// Point the client at a different server. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Check the credentials by fetching the authenticated member.
    pub async fn verify(&self) -> Result<(), BoardError> {
        self.request(reqwest::Method::GET, "/1/members/me", &[])
            .await?;
        Ok(())
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<String, BoardError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .request(method, url)
            .query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BoardError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, BoardError> {
        let body = self.request(reqwest::Method::GET, path, params).await?;
        serde_json::from_str(&body).map_err(BoardError::Decode)
    }

    async fn boards(&self) -> Result<Vec<Board>, BoardError> {
        self.get_json("/1/members/me/boards", &[("filter", "open")])
            .await
    }

    async fn columns(&self, board_id: &str) -> Result<Vec<Column>, BoardError> {
        self.get_json(&format!("/1/boards/{board_id}/lists"), &[("filter", "open")])
            .await
    }
}

#[async_trait]
impl BoardApi for TrelloClient {
    async fn find_board(&self, name: &str) -> Result<Board, BoardError> {
        self.boards()
            .await?
            .into_iter()
            .find(|board| board.name == name)
            .ok_or_else(|| BoardError::BoardNotFound(name.to_string()))
    }

    async fn find_column(&self, board_id: &str, name: &str) -> Result<Column, BoardError> {
        self.columns(board_id)
            .await?
            .into_iter()
            .find(|column| column.name == name)
            .ok_or_else(|| BoardError::ColumnNotFound(name.to_string()))
    }

    async fn fetch_cards(&self, column_id: &str) -> Result<Vec<Card>, BoardError> {
        self.get_json(&format!("/1/lists/{column_id}/cards"), &[]).await
    }

    async fn move_card(&self, card_id: &str, column_id: &str) -> Result<(), BoardError> {
        self.request(
            reqwest::Method::PUT,
            &format!("/1/cards/{card_id}"),
            &[("idList", column_id)],
        )
        .await?;
        Ok(())
    }

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), BoardError> {
        self.request(
            reqwest::Method::POST,
            &format!("/1/cards/{card_id}/actions/comments"),
            &[("text", text)],
        )
        .await?;
        Ok(())
    }

    async fn create_card(
        &self,
        column_id: &str,
        name: &str,
        desc: &str,
    ) -> Result<Card, BoardError> {
        let body = self
            .request(
                reqwest::Method::POST,
                "/1/cards",
                &[("idList", column_id), ("name", name), ("desc", desc)],
            )
            .await?;
        serde_json::from_str(&body).map_err(BoardError::Decode)
    }
}
