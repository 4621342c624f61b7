use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    api::{ApiError, SparkApi},
    config::WebhookConfig,
    mention::trim_mentions,
    model::{AccountIdentity, AccountType, Command, Message, RoomType},
};

/// Turns messages into [`Command`]s.
#[derive(Debug)]
pub struct CommandInterpreter {
    prefix: String,
    trim_mention: bool,
    ignore_self: bool,
    identity: OnceLock<AccountIdentity>,
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::from_config(&WebhookConfig::default())
    }
}

impl CommandInterpreter {
    #[must_use]
    pub fn new(prefix: impl Into<String>, trim_mention: bool, ignore_self: bool) -> Self {
        Self {
            prefix: prefix.into(),
            trim_mention,
            ignore_self,
            identity: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &WebhookConfig) -> Self {
        if !config.ignore_self && config.command_prefix.is_empty() {
            warn!("neither ignore_self nor a command prefix is set: the bot may read its own messages");
        }
        Self::new(
            config.command_prefix.clone(),
            config.trim_mention,
            config.ignore_self,
        )
    }

    /// Sets the identity directly instead of resolving it.
    #[must_use]
    pub fn with_identity(self, identity: AccountIdentity) -> Self {
        let _ = self.identity.set(identity);
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn trim_mention(&self) -> bool {
        self.trim_mention
    }

    #[must_use]
    pub const fn ignore_self(&self) -> bool {
        self.ignore_self
    }

    /// `None` until identity resolution has completed.
    #[must_use]
    pub fn identity(&self) -> Option<&AccountIdentity> {
        self.identity.get()
    }

    #[must_use]
    pub fn account_type(&self) -> AccountType {
        self.identity().map_or(AccountType::Unknown, |i| i.account_type)
    }

    /// Looks up the token's account and records it.
    ///
    /// # Errors
    ///
    /// Returns the API error when `/people/me` cannot be read.
    pub async fn resolve_identity(&self, api: &dyn SparkApi) -> Result<&AccountIdentity, ApiError> {
        if let Some(identity) = self.identity.get() {
            return Ok(identity);
        }
        let identity = AccountIdentity::from_person(api.me().await?);
        info!(
            account_type = ?identity.account_type,
            name = %identity.person.display_name,
            "resolved account behind the access token"
        );
        Ok(self.identity.get_or_init(|| identity))
    }

    /// Resolves the identity in the background. Messages processed before it
    /// completes are interpreted against an unknown account.
    pub fn spawn_identity_resolution(self: &Arc<Self>, api: Arc<dyn SparkApi>) -> JoinHandle<()> {
        let interpreter = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = interpreter.resolve_identity(api.as_ref()).await {
                warn!(error = %e, "could not resolve account type, continuing without it");
            }
        })
    }

    /// Extracts a command from `message`, or `None` when the message is not
    /// one.
    #[must_use]
    pub fn extract(&self, message: &Message) -> Option<Command> {
        let me = self.identity();

        if self.ignore_self
            && let Some(me) = me
            && message.person_id == me.person.id
        {
            debug!(message_id = %message.id, "message written by self, ignoring");
            return None;
        }

        let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) else {
            debug!(message_id = %message.id, "no text in message, ignoring");
            return None;
        };

        let trimmed;
        let mut text = text;
        if message.room_type == RoomType::Group
            && self.trim_mention
            && message.mentions_anyone()
            && let Some(me) = me
        {
            trimmed = trim_mentions(me, message);
            text = &trimmed;
        }

        let normalized = collapse_whitespace(text);
        if normalized.is_empty() {
            debug!(message_id = %message.id, "blank message, ignoring");
            return None;
        }

        let Some(body) = normalized.strip_prefix(self.prefix.as_str()) else {
            debug!(prefix = %self.prefix, "text does not start with the command prefix, ignoring");
            return None;
        };

        let mut tokens = body.split(' ');
        let keyword = tokens.next().unwrap_or_default();
        if keyword.is_empty() {
            debug!(message_id = %message.id, "empty command, ignoring");
            return None;
        }
        let args = tokens.map(ToOwned::to_owned).collect::<Vec<_>>();

        debug!(keyword, ?args, message_id = %message.id, "detected command");
        Some(Command {
            keyword: keyword.to_owned(),
            args,
            message: message.clone(),
        })
    }
}

/// Replaces every run of whitespace with a single space. Leading and
/// trailing runs are kept.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}
