use core::{fmt, future::Future};
use std::{collections::HashMap, sync::Arc};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    api::SparkApi, events::EventListener, interpreter::CommandInterpreter, model::Command,
    trigger::Trigger,
};

/// Keyword whose handler receives commands nobody else claimed.
pub const FALLBACK: &str = "fallback";

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn on_command(&self, command: &Command) -> Result<()>;
}

pub struct FnCommand<F>(F);

impl<F> fmt::Debug for FnCommand<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCommand")
    }
}

#[async_trait]
impl<F, Fut> CommandHandler for FnCommand<F>
where
    F: Fn(Command) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_command(&self, command: &Command) -> Result<()> {
        (self.0)(command.clone()).await
    }
}

pub fn command_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(Command) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnCommand(f))
}

/// `messages/created` listener dispatching on the command keyword.
#[derive(Clone)]
pub struct CommandRouter {
    commands: Arc<RwLock<HashMap<String, Arc<dyn CommandHandler>>>>,
    interpreter: Arc<CommandInterpreter>,
    api: Arc<dyn SparkApi>,
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("interpreter", &self.interpreter)
            .finish_non_exhaustive()
    }
}

impl CommandRouter {
    #[must_use]
    pub fn new(interpreter: Arc<CommandInterpreter>, api: Arc<dyn SparkApi>) -> Self {
        Self {
            commands: Arc::default(),
            interpreter,
            api,
        }
    }

    /// Registers `handler` for `keyword`, replacing any previous one. Use
    /// [`FALLBACK`] to catch unknown keywords.
    pub async fn add_command(&self, keyword: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let keyword = keyword.into();
        if keyword.is_empty() {
            debug!("empty keyword, command not registered");
            return;
        }
        debug!(keyword = %keyword, "registered command");
        self.commands.write().await.insert(keyword, handler);
    }

    /// Registered keywords, sorted.
    pub async fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self.commands.read().await.keys().cloned().collect();
        keywords.sort();
        keywords
    }

    /// Runs the handler for `command`, or the fallback one. Returns whether
    /// a handler ran.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub async fn dispatch(&self, command: &Command) -> Result<bool> {
        let handler = {
            let commands = self.commands.read().await;
            match commands.get(&command.keyword) {
                Some(h) => Some(Arc::clone(h)),
                None => {
                    debug!(keyword = %command.keyword, "no handler for command, trying fallback");
                    commands.get(FALLBACK).map(Arc::clone)
                }
            }
        };
        let Some(handler) = handler else {
            debug!(keyword = %command.keyword, "no handler nor fallback for command");
            return Ok(false);
        };
        info!(keyword = %command.keyword, args = ?command.args, message_id = %command.message.id, "dispatching command");
        handler
            .on_command(command)
            .await
            .with_context(|| format!("command {}", command.keyword))?;
        Ok(true)
    }
}

#[async_trait]
impl EventListener for CommandRouter {
    async fn on_event(&self, trigger: &Trigger) -> Result<()> {
        let id = trigger
            .data_id()
            .context("messages/created trigger without a message id")?;
        let message = self
            .api
            .message(id)
            .await
            .with_context(|| format!("fetching message {id}"))?;
        let Some(command) = self.interpreter.extract(&message) else {
            debug!(message_id = %message.id, "message is not a command");
            return Ok(());
        };
        self.dispatch(&command).await?;
        Ok(())
    }
}
