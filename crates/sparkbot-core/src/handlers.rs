//! Listeners that fetch the details a trigger only references by id before
//! calling application code.

use core::{fmt, future::Future};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    api::SparkApi,
    events::EventListener,
    model::{AttachmentActions, Message},
    trigger::Trigger,
};

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, trigger: &Trigger, message: &Message) -> Result<()>;
}

#[async_trait]
pub trait CardSubmissionHandler: Send + Sync {
    async fn on_submission(&self, trigger: &Trigger, actions: &AttachmentActions) -> Result<()>;
}

pub struct FnHandler<F>(F);

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Trigger, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_message(&self, trigger: &Trigger, message: &Message) -> Result<()> {
        (self.0)(trigger.clone(), message.clone()).await
    }
}

pub fn message_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Trigger, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

pub struct FnSubmission<F>(F);

impl<F> fmt::Debug for FnSubmission<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSubmission")
    }
}

#[async_trait]
impl<F, Fut> CardSubmissionHandler for FnSubmission<F>
where
    F: Fn(Trigger, AttachmentActions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_submission(&self, trigger: &Trigger, actions: &AttachmentActions) -> Result<()> {
        (self.0)(trigger.clone(), actions.clone()).await
    }
}

pub fn submission_fn<F, Fut>(f: F) -> Arc<dyn CardSubmissionHandler>
where
    F: Fn(Trigger, AttachmentActions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnSubmission(f))
}

/// `messages/created` listener handing message details to a [`MessageHandler`].
pub(crate) struct MessageListener {
    pub(crate) api: Arc<dyn SparkApi>,
    pub(crate) handler: Arc<dyn MessageHandler>,
}

#[async_trait]
impl EventListener for MessageListener {
    async fn on_event(&self, trigger: &Trigger) -> Result<()> {
        let id = trigger.data_id().context("trigger without a message id")?;
        let message = self
            .api
            .message(id)
            .await
            .with_context(|| format!("fetching message {id}, listener not fired"))?;
        debug!(message_id = %message.id, "message details fetched");
        self.handler.on_message(trigger, &message).await
    }
}

/// `attachmentActions/created` listener handing the submission to a
/// [`CardSubmissionHandler`].
pub(crate) struct SubmissionListener {
    pub(crate) api: Arc<dyn SparkApi>,
    pub(crate) handler: Arc<dyn CardSubmissionHandler>,
}

#[async_trait]
impl EventListener for SubmissionListener {
    async fn on_event(&self, trigger: &Trigger) -> Result<()> {
        let id = trigger
            .data_id()
            .context("trigger without an attachment action id")?;
        let actions = self
            .api
            .attachment_actions(id)
            .await
            .with_context(|| format!("fetching attachment actions {id}, listener not fired"))?;
        debug!(actions_id = %actions.id, inputs = actions.inputs.len(), "card submission fetched");
        self.handler.on_submission(trigger, &actions).await
    }
}
