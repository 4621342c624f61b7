//! Webhook ingestion and command dispatch for Webex bots.
//!
//! A [`Webhook`] validates inbound triggers, acknowledges them, checks their
//! signature and routes them by resource/event to listeners. The built-in
//! `messages/created` listener turns messages into [`Command`]s and
//! dispatches them by keyword. [`WebhookRegistrar`] keeps the platform-side
//! webhook registration in line with the desired configuration.

pub mod api;
pub mod commands;
pub mod config;
pub mod events;
pub mod handlers;
pub mod html;
pub mod interpreter;
pub mod mention;
pub mod model;
pub mod registration;
pub mod signature;
pub mod trigger;
mod webhook;

#[cfg(test)]
mod testing;

pub use api::{ApiError, SparkApi, WebexClient};
pub use commands::{CommandHandler, CommandRouter, FALLBACK, command_fn};
pub use config::{DEFAULT_API_BASE_URL, WebhookConfig};
pub use events::{ALL, EventListener, EventRouter, listener_fn};
pub use handlers::{CardSubmissionHandler, MessageHandler, message_fn, submission_fn};
pub use interpreter::CommandInterpreter;
pub use model::{AccountIdentity, AccountType, AttachmentActions, Command, Message, Person};
pub use registration::{RegistrationError, WebhookRegistrar, WebhookRegistration, WebhookSpec};
pub use signature::SecretCheck;
pub use trigger::{Event, EventKey, Resource, Trigger, is_valid_trigger};
pub use webhook::Webhook;
