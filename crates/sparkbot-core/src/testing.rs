//! In-memory [`SparkApi`] used by unit tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    api::{ApiError, SparkApi},
    model::{AttachmentActions, Message, Person},
    registration::{WebhookRegistration, WebhookSpec},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Me,
    Message(String),
    AttachmentActions(String),
    List,
    Create(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct State {
    me: Option<Person>,
    messages: HashMap<String, Message>,
    actions: HashMap<String, AttachmentActions>,
    webhooks: Vec<WebhookRegistration>,
    calls: Vec<ApiCall>,
    next_id: usize,
    fail_creates: bool,
    unauthorized: bool,
}

#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_me(&self, person: Person) {
        self.state().me = Some(person);
    }

    pub fn add_message(&self, message: Message) {
        self.state().messages.insert(message.id.clone(), message);
    }

    pub fn add_actions(&self, actions: AttachmentActions) {
        self.state().actions.insert(actions.id.clone(), actions);
    }

    pub fn push_webhook(&self, webhook: WebhookRegistration) {
        self.state().webhooks.push(webhook);
    }

    pub fn webhooks(&self) -> Vec<WebhookRegistration> {
        self.state().webhooks.clone()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn fail_creates(&self, fail: bool) {
        self.state().fail_creates = fail;
    }

    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.state().unauthorized = unauthorized;
    }

    fn record(&self, call: ApiCall) -> Result<std::sync::MutexGuard<'_, State>, ApiError> {
        let mut state = self.state();
        state.calls.push(call);
        if state.unauthorized {
            return Err(ApiError::Unauthorized);
        }
        Ok(state)
    }
}

#[async_trait]
impl SparkApi for FakeApi {
    async fn me(&self) -> Result<Person, ApiError> {
        let state = self.record(ApiCall::Me)?;
        state
            .me
            .clone()
            .ok_or_else(|| ApiError::NotFound("/people/me".to_owned()))
    }

    async fn message(&self, id: &str) -> Result<Message, ApiError> {
        let state = self.record(ApiCall::Message(id.to_owned()))?;
        state
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/messages/{id}")))
    }

    async fn attachment_actions(&self, id: &str) -> Result<AttachmentActions, ApiError> {
        let state = self.record(ApiCall::AttachmentActions(id.to_owned()))?;
        state
            .actions
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/attachment/actions/{id}")))
    }

    async fn list_webhooks(&self) -> Result<Vec<WebhookRegistration>, ApiError> {
        let state = self.record(ApiCall::List)?;
        Ok(state.webhooks.clone())
    }

    async fn create_webhook(&self, spec: &WebhookSpec) -> Result<WebhookRegistration, ApiError> {
        let mut state = self.record(ApiCall::Create(spec.name.clone()))?;
        if state.fail_creates {
            return Err(ApiError::Status {
                status: 500,
                path: "/webhooks".to_owned(),
            });
        }
        state.next_id += 1;
        let created = WebhookRegistration {
            id: format!("webhook-{}", state.next_id),
            name: spec.name.clone(),
            target_url: spec.target_url.clone(),
            resource: spec.resource.clone(),
            event: spec.event.clone(),
            filter: spec.filter.clone(),
            secret: spec.secret.clone(),
            status: Some("active".to_owned()),
            created: None,
        };
        state.webhooks.push(created.clone());
        Ok(created)
    }

    async fn delete_webhook(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.record(ApiCall::Delete(id.to_owned()))?;
        let before = state.webhooks.len();
        state.webhooks.retain(|w| w.id != id);
        if state.webhooks.len() == before {
            return Err(ApiError::NotFound(format!("/webhooks/{id}")));
        }
        Ok(())
    }
}
