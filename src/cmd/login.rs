//! The `drover login` command: collect, verify, and store Trello credentials.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use console::style;
use dialoguer::{Input, Password};

use crate::auth::CredentialStore;
use crate::board::TrelloClient;
use crate::config::Config;

pub async fn cmd_login() -> Result<()> {
    println!("Trello login");
    println!();
    println!("To authenticate you need an API key and a token:");
    println!("  1. Go to https://trello.com/power-ups/admin");
    println!("  2. Create (or open) a Power-Up and copy its API key");
    println!("  3. Follow the Token link next to the key to generate a token");
    println!();

    let api_key: String = Input::new()
        .with_prompt("API key")
        .interact_text()
        .context("prompt cancelled")?;
    let token = Password::new()
        .with_prompt("Token")
        .interact()
        .context("prompt cancelled")?;

    let api_key = api_key.trim().to_string();
    let token = token.trim().to_string();
    if api_key.is_empty() || token.is_empty() {
        bail!("both API key and token are required");
    }

    print!("Verifying credentials... ");
    use std::io::Write;
    std::io::stdout().flush().ok();
    let client = TrelloClient::new(api_key.clone(), token.clone());
    client
        .verify()
        .await
        .context("credential verification failed")?;
    println!("{}", style("ok").green());

    let config = Config::load(None)?;
    config.ensure_directories()?;
    let store = CredentialStore::new(config.credentials_path());
    store.save(
        "trello",
        HashMap::from([
            ("api_key".to_string(), api_key),
            ("token".to_string(), token),
        ]),
    )?;

    println!("{} credentials stored", style("✔").green());
    Ok(())
}
