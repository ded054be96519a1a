//! Token validation and the startup login flow

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use chatview_utils::{ChatviewError, Result};

use crate::config::Credentials;
use crate::connection::{normalize_channel, Login};

/// Identity service the token is checked against
pub const VALIDATE_BASE_URL: &str = "https://id.twitch.tv";

/// Prefix the chat server expects on `PASS` tokens
pub const TOKEN_PREFIX: &str = "oauth:";

const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

const USER_PROMPT: &str = "Enter your username: ";
const TOKEN_PROMPT: &str = "Enter your oauth token: ";
const RETRY_TOKEN_PROMPT: &str = "Token invalid. Please enter a valid token: ";
const CHANNEL_PROMPT: &str = "Enter a channel to join: ";
const RETRY_CHANNEL_PROMPT: &str = "Invalid channel. Please enter a channel to join: ";

/// Checks whether a token is accepted
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<bool>;
}

/// Validates tokens with `GET /oauth2/validate`
pub struct HttpTokenValidator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTokenValidator {
    pub fn new() -> Result<Self> {
        Self::with_base_url(VALIDATE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(VALIDATE_TIMEOUT)
            .build()
            .map_err(|e| ChatviewError::auth(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, token: &str) -> Result<bool> {
        let url = format!("{}/oauth2/validate", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("OAuth {}", strip_token_prefix(token)))
            .send()
            .await
            .map_err(|e| ChatviewError::auth(format!("Token validation request failed: {}", e)))?;

        let status = response.status();
        tracing::debug!(status = %status, "Token validation response");
        Ok(status == StatusCode::OK)
    }
}

/// Token without its `oauth:` prefix
pub fn strip_token_prefix(token: &str) -> &str {
    token.strip_prefix(TOKEN_PREFIX).unwrap_or(token)
}

/// Token with exactly one `oauth:` prefix
pub fn with_token_prefix(token: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, strip_token_prefix(token.trim()))
}

/// Asks the user for a single answer
///
/// `None` means the user interrupted the prompt.
#[async_trait]
pub trait Prompter: Send {
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Ask until a non-blank answer is given
async fn ask_non_empty(prompter: &mut dyn Prompter, prompt: &str) -> Result<Option<String>> {
    loop {
        match prompter.ask(prompt).await? {
            Some(answer) if !answer.trim().is_empty() => return Ok(Some(answer.trim().to_string())),
            Some(_) => continue,
            None => return Ok(None),
        }
    }
}

fn saved(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Fill in whatever the saved credentials lack
///
/// Missing values are prompted for. With a validator, the token is
/// re-prompted until it is accepted. `credentials` is updated with the
/// result so it can be saved. Returns `None` if the user interrupted.
pub async fn resolve_login(
    credentials: &mut Credentials,
    user_override: Option<&str>,
    channel_override: Option<&str>,
    prompter: &mut dyn Prompter,
    validator: Option<&dyn TokenValidator>,
) -> Result<Option<Login>> {
    let username = match user_override.map(str::to_string).or_else(|| saved(&credentials.user)) {
        Some(user) => user,
        None => match ask_non_empty(prompter, USER_PROMPT).await? {
            Some(user) => user,
            None => return Ok(None),
        },
    };

    let mut token = match saved(&credentials.oauth) {
        Some(token) => token,
        None => match ask_non_empty(prompter, TOKEN_PROMPT).await? {
            Some(token) => token,
            None => return Ok(None),
        },
    };

    if let Some(validator) = validator {
        loop {
            match validator.validate(&token).await {
                Ok(true) => break,
                Ok(false) => tracing::info!("Token rejected"),
                Err(e) => tracing::warn!("Token validation failed: {}", e),
            }
            token = match ask_non_empty(prompter, RETRY_TOKEN_PROMPT).await? {
                Some(token) => token,
                None => return Ok(None),
            };
        }
    }
    let token = with_token_prefix(&token);

    let mut candidate = channel_override
        .map(str::to_string)
        .or_else(|| saved(&credentials.channel));
    let channel = loop {
        let name = match candidate.take() {
            Some(name) => name,
            None => match ask_non_empty(prompter, CHANNEL_PROMPT).await? {
                Some(name) => name,
                None => return Ok(None),
            },
        };
        match normalize_channel(&name) {
            Ok(channel) => break channel,
            Err(e) => {
                tracing::debug!("{}", e);
                match ask_non_empty(prompter, RETRY_CHANNEL_PROMPT).await? {
                    Some(name) => candidate = Some(name),
                    None => return Ok(None),
                }
            }
        }
    };

    credentials.user = Some(username.clone());
    credentials.oauth = Some(token.clone());
    credentials.channel = Some(channel.clone());

    Ok(Some(Login {
        token,
        username,
        channel,
    }))
}
