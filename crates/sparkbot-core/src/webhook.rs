use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::net::TcpListener;
use tracing::{debug, info, trace, warn};

use crate::{
    api::{ApiError, SparkApi, WebexClient},
    commands::{CommandHandler, CommandRouter},
    config::WebhookConfig,
    events::{EventListener, EventRouter},
    handlers::{CardSubmissionHandler, MessageHandler, MessageListener, SubmissionListener},
    interpreter::CommandInterpreter,
    model::{AttachmentActions, Command, Message},
    registration::{RegistrationError, WebhookRegistrar, WebhookRegistration, WebhookSpec},
    signature::{self, SIGNATURE_HEADER, SecretCheck},
    trigger::{Event, EventKey, Resource, Trigger},
};

/// A webhook endpoint: receives triggers, acknowledges them, then routes
/// them to the registered listeners.
///
/// Listeners are registered while the webhook is being wired, before
/// [`Webhook::router`] or [`Webhook::serve`] takes ownership.
pub struct Webhook {
    config: WebhookConfig,
    api: Option<Arc<dyn SparkApi>>,
    interpreter: Arc<CommandInterpreter>,
    events: EventRouter,
    commands: Option<CommandRouter>,
    started: OffsetDateTime,
}

impl core::fmt::Debug for Webhook {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Webhook")
            .field("path", &self.config.path)
            .field("port", &self.config.port)
            .field("token", &self.api.is_some())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Webhook {
    /// Builds a webhook talking to the platform with the configured token.
    ///
    /// Must be called from within a Tokio runtime: identity resolution is
    /// spawned right away.
    #[must_use]
    pub fn new(config: WebhookConfig) -> Self {
        let api = config.token().map(|token| {
            Arc::new(WebexClient::new(&config.api_base_url, token)) as Arc<dyn SparkApi>
        });
        Self::with_api(config, api)
    }

    /// Like [`Webhook::new`] with an explicit API client.
    #[must_use]
    pub fn with_api(config: WebhookConfig, api: Option<Arc<dyn SparkApi>>) -> Self {
        let interpreter = Arc::new(CommandInterpreter::from_config(&config));
        let mut events = EventRouter::new();

        let commands = if let Some(api) = &api {
            interpreter.spawn_identity_resolution(Arc::clone(api));
            let router = CommandRouter::new(Arc::clone(&interpreter), Arc::clone(api));
            events.insert(
                EventKey::new(Resource::Messages, Event::Created),
                Arc::new(router.clone()),
            );
            Some(router)
        } else {
            info!("no access token: message details will not be fetched nor commands interpreted");
            None
        };

        Self {
            config,
            api,
            interpreter,
            events,
            commands,
            started: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &WebhookConfig {
        &self.config
    }

    #[must_use]
    pub const fn interpreter(&self) -> &Arc<CommandInterpreter> {
        &self.interpreter
    }

    #[must_use]
    pub const fn events(&self) -> &EventRouter {
        &self.events
    }

    /// Registers a listener for a resource/event pair (`all` accepted for
    /// either). Returns the number of pairs registered.
    pub fn on_event(
        &mut self,
        resource: &str,
        event: &str,
        listener: Arc<dyn EventListener>,
    ) -> usize {
        self.events.on(resource, event, listener)
    }

    /// Calls `handler` with the details of every new message. Replaces the
    /// command router. Returns false when no token is configured.
    pub fn on_message(&mut self, handler: Arc<dyn MessageHandler>) -> bool {
        let Some(api) = self.api.clone() else {
            warn!("no access token: cannot read message details, handler not registered");
            return false;
        };
        self.events.insert(
            EventKey::new(Resource::Messages, Event::Created),
            Arc::new(MessageListener { api, handler }),
        );
        true
    }

    /// Calls `handler` with every card submission. Returns false when no
    /// token is configured.
    pub fn on_card_submission(&mut self, handler: Arc<dyn CardSubmissionHandler>) -> bool {
        let Some(api) = self.api.clone() else {
            warn!("no access token: cannot read card submissions, handler not registered");
            return false;
        };
        self.events.insert(
            EventKey::new(Resource::AttachmentActions, Event::Created),
            Arc::new(SubmissionListener { api, handler }),
        );
        true
    }

    /// Registers a command handler; `fallback` catches unknown keywords.
    /// Returns false when no token is configured.
    pub async fn on_command(
        &self,
        keyword: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> bool {
        let Some(commands) = &self.commands else {
            warn!("no access token: commands cannot be interpreted, handler not registered");
            return false;
        };
        commands.add_command(keyword, handler).await;
        true
    }

    #[must_use]
    pub fn as_command(&self, message: &Message) -> Option<Command> {
        self.interpreter.extract(message)
    }

    /// Fetches the message a `messages/created` trigger refers to.
    ///
    /// # Errors
    ///
    /// Fails without a token, or when the message cannot be read.
    pub async fn read_message(&self, trigger: &Trigger) -> Result<Message, ApiError> {
        let api = self.api.as_ref().ok_or(ApiError::MissingToken)?;
        let id = trigger
            .data_id()
            .ok_or_else(|| ApiError::Malformed("trigger without a message id".to_owned()))?;
        api.message(id).await
    }

    /// Fetches the card submission an `attachmentActions/created` trigger
    /// refers to.
    ///
    /// # Errors
    ///
    /// Fails without a token, or when the submission cannot be read.
    pub async fn read_card_submission(
        &self,
        trigger: &Trigger,
    ) -> Result<AttachmentActions, ApiError> {
        let api = self.api.as_ref().ok_or(ApiError::MissingToken)?;
        let id = trigger
            .data_id()
            .ok_or_else(|| ApiError::Malformed("trigger without an attachment id".to_owned()))?;
        api.attachment_actions(id).await
    }

    /// Makes sure the platform delivers to `spec` (see
    /// [`WebhookRegistrar::reconcile`]).
    ///
    /// # Errors
    ///
    /// Fails without a token, or when reconciliation fails.
    pub async fn create_or_update_webhook(
        &self,
        spec: &WebhookSpec,
    ) -> Result<WebhookRegistration, RegistrationError> {
        let api = self.api.clone().ok_or(ApiError::MissingToken)?;
        WebhookRegistrar::new(api).reconcile(spec).await
    }

    /// Checks the signature, then routes the trigger. Returns whether a
    /// listener ran.
    pub async fn process(&self, trigger: &Trigger, body: &[u8], signature: Option<&str>) -> bool {
        if let Some(secret) = self.config.secret() {
            if signature::verify(secret, body, signature) {
                trace!(trigger_id = %trigger.id, "signature check ok");
            } else {
                match self.config.secret_check() {
                    SecretCheck::Hard => {
                        warn!(trigger_id = %trigger.id, "signature does not match secret, dropping event");
                        return false;
                    }
                    SecretCheck::Soft => {
                        warn!(trigger_id = %trigger.id, "signature does not match secret, continuing");
                    }
                }
            }
        }
        self.events.fire(trigger).await
    }

    async fn status(&self) -> Value {
        let identity = self.interpreter.identity();
        let commands = match &self.commands {
            Some(router) => router.keywords().await,
            None => Vec::new(),
        };
        json!({
            "message": "Congrats, your bot is up and running",
            "since": self.started.format(&Rfc3339).unwrap_or_default(),
            "tip": "Register a webhook pointing to this endpoint to start receiving events",
            "webhook": {
                "secret": self.config.secret().is_some(),
                "softSecretCheck": self.config.soft_secret_check,
                "listeners": self.events.keys(),
            },
            "token": self.api.is_some(),
            "account": {
                "type": self.interpreter.account_type(),
                "nickName": identity.map(|i| i.nick_name.as_str()),
                "person": identity.map(|i| &i.person),
            },
            "interpreter": {
                "prefix": self.interpreter.prefix(),
                "trimMention": self.interpreter.trim_mention(),
                "ignoreSelf": self.interpreter.ignore_self(),
            },
            "commands": commands,
        })
    }

    /// Axum router serving the health check (GET) and triggers (POST) on
    /// the configured path.
    pub fn router(self) -> Router {
        let path = self.config.path.clone();
        Router::new()
            .route(&path, get(health).post(receive))
            .with_state(Arc::new(self))
    }

    /// Binds the configured port and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Fails when the port cannot be bound.
    pub async fn serve(self) -> Result<()> {
        let addr = ("0.0.0.0", self.config.port);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding port {}", self.config.port))?;
        info!(port = self.config.port, path = %self.config.path, "webhook listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("serving webhook")
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        core::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health(State(webhook): State<Arc<Webhook>>) -> Json<Value> {
    debug!("health check");
    Json(webhook.status().await)
}

async fn receive(
    State(webhook): State<Arc<Webhook>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trigger = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(Trigger::from_payload);
    let Some(trigger) = trigger else {
        debug!("unexpected payload POSTed, rejecting");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Bad payload for Webhook",
                "details": "either the bot is misconfigured or the platform is running a new API version",
            })),
        )
            .into_response();
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    debug!(key = %trigger.key(), trigger_id = %trigger.id, "trigger accepted");

    // Processing happens after the acknowledgment; failures are only logged.
    tokio::spawn(async move {
        webhook
            .process(&trigger, &body, signature.as_deref())
            .await;
    });

    (
        StatusCode::OK,
        Json(json!({ "message": "message received and being processed by webhook" })),
    )
        .into_response()
}
