//! Token acquisition: reuse the stored token or log in interactively and persist the new one.

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{CredentialStore, StoredCredentials};
use crate::error::LoginError;
use crate::{colors, LOGIN_ENDPOINT, LOGIN_SERVICE, VERSION};

/// Username and token returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub username: Option<String>,
    pub token: String,
}

/// Something that can hand out a fresh token for a Moodle site
pub trait TokenSource {
    fn issue(&self, base_url: &str) -> Result<IssuedToken>;
}

/// Prompts for username and password on the terminal
pub struct InteractiveLogin {
    client: Client,
    username: Option<String>,
}

impl InteractiveLogin {
    pub fn new(username: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("moodle-sync/{VERSION}"))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, username })
    }
}

impl TokenSource for InteractiveLogin {
    fn issue(&self, base_url: &str) -> Result<IssuedToken> {
        let theme = ColorfulTheme::default();

        println!("{} Connecting to {}...", "🔑".cyan(), base_url.color(colors::PATH));

        let username: String = match &self.username {
            Some(name) => name.clone(),
            None => Input::with_theme(&theme)
                .with_prompt("Username")
                .interact_text()
                .context("Failed to read username")?,
        };
        let password = Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?;

        let token = request_token(&self.client, base_url, &username, &password)?;
        Ok(IssuedToken {
            username: Some(username),
            token,
        })
    }
}

/// Ask the Moodle token endpoint for a mobile-app token
pub fn request_token(
    client: &Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<String, LoginError> {
    let endpoint = format!("{}{}", base_url.trim_end_matches('/'), LOGIN_ENDPOINT);
    debug!(%endpoint, username, "requesting token");

    let response: Value = client
        .post(&endpoint)
        .form(&[
            ("username", username),
            ("password", password),
            ("service", LOGIN_SERVICE),
        ])
        .send()?
        .json()?;

    parse_token_response(response)
}

/// `{"token": ...}` on success, `{"error": ...}` when Moodle refuses
pub fn parse_token_response(response: Value) -> Result<String, LoginError> {
    if let Some(token) = response.get("token").and_then(Value::as_str) {
        return Ok(token.to_string());
    }
    if let Some(error) = response.get("error").and_then(Value::as_str) {
        return Err(LoginError::Rejected(error.to_string()));
    }
    Err(LoginError::Unexpected(response))
}

/// Prompt the user for the Moodle URL when none is configured
pub fn prompt_base_url() -> Result<String> {
    let url: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Moodle URL (ex: https://moodle.isep.ipp.pt)")
        .interact_text()
        .context("Failed to read Moodle URL")?;
    Ok(url.trim().trim_end_matches('/').to_string())
}

/// Stored token for `base_url`, or a new one from `source` that is then saved.
///
/// With `force` the stored token is ignored and a new login always happens.
pub fn fetch_or_prompt(
    store: &CredentialStore,
    source: &dyn TokenSource,
    base_url: &str,
    force: bool,
) -> Result<String> {
    if !force {
        if let Some(stored) = store.load()? {
            if stored.matches_site(base_url) && !stored.token.trim().is_empty() {
                debug!("reusing stored token");
                return Ok(stored.token);
            }
        }
    }

    let issued = source.issue(base_url)?;
    let credentials = StoredCredentials::new(base_url, &issued.token, issued.username);
    store
        .save(&credentials)
        .context("Failed to save credentials")?;
    info!(path = %store.path().display(), "token saved");

    Ok(issued.token)
}
