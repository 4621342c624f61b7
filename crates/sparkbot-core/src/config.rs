use serde::Deserialize;

use crate::signature::SecretCheck;

pub const DEFAULT_API_BASE_URL: &str = "https://webexapis.com/v1";

/// Settings of a [`Webhook`](crate::Webhook).
///
/// Every field has a default, so an empty YAML/JSON document is a valid
/// configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Local port the webhook listens on.
    pub port: u16,
    /// Path receiving the platform's POSTs (and serving the health check).
    pub path: String,
    /// API access token. Without one, message details cannot be fetched
    /// and commands are not interpreted.
    pub token: Option<String>,
    /// Secret used by the platform to sign payloads.
    pub secret: Option<String>,
    /// Keep processing events whose signature does not match `secret`.
    pub soft_secret_check: bool,
    /// Prefix a message must start with to be read as a command.
    pub command_prefix: String,
    /// Remove mentions of the bot before reading commands in group rooms.
    pub trim_mention: bool,
    /// Skip messages written by the token's own account.
    pub ignore_self: bool,
    pub api_base_url: String,
}

// Token and secret are reported as set or unset, never printed.
impl core::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("port", &self.port)
            .field("path", &self.path)
            .field("token", &self.token().map(|_| "<redacted>"))
            .field("secret", &self.secret().map(|_| "<redacted>"))
            .field("soft_secret_check", &self.soft_secret_check)
            .field("command_prefix", &self.command_prefix)
            .field("trim_mention", &self.trim_mention)
            .field("ignore_self", &self.ignore_self)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            path: "/".to_owned(),
            token: None,
            secret: None,
            soft_secret_check: false,
            command_prefix: String::new(),
            trim_mention: true,
            ignore_self: true,
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
        }
    }
}

impl WebhookConfig {
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    #[must_use]
    pub const fn secret_check(&self) -> SecretCheck {
        SecretCheck::from_soft_flag(self.soft_secret_check)
    }
}
