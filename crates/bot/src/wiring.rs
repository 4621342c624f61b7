use std::sync::Arc;

use sparkbot_core::{
    ALL, AttachmentActions, Command, FALLBACK, Trigger, Webhook, command_fn, listener_fn,
    submission_fn,
};
use tracing::info;

/// Keywords answered by this bot, besides the fallback.
pub const COMMANDS: [&str; 2] = ["help", "about"];

/// Registers the bot's listeners. Handlers only log what they receive.
pub async fn wire(webhook: &mut Webhook) {
    let help = Arc::new(COMMANDS.join(", "));
    webhook
        .on_command(
            "help",
            command_fn(move |command: Command| {
                let help = Arc::clone(&help);
                async move {
                    info!(from = %command.message.person_email, room_id = %command.message.room_id, commands = %help, "help requested");
                    Ok(())
                }
            }),
        )
        .await;

    webhook
        .on_command(
            "about",
            command_fn(|command: Command| async move {
                info!(from = %command.message.person_email, version = env!("CARGO_PKG_VERSION"), "about requested");
                Ok(())
            }),
        )
        .await;

    webhook
        .on_command(
            FALLBACK,
            command_fn(|command: Command| async move {
                info!(keyword = %command.keyword, args = ?command.args, from = %command.message.person_email, "unknown command");
                Ok(())
            }),
        )
        .await;

    webhook.on_card_submission(submission_fn(
        |trigger: Trigger, actions: AttachmentActions| async move {
            for (input, value) in &actions.inputs {
                info!(person_id = %trigger.actor_id, message_id = %actions.message_id, input = %input, value = %value, "card input");
            }
            Ok(())
        },
    ));

    let log_event = listener_fn(|trigger: Trigger| async move {
        info!(
            event = %trigger.key(),
            data_id = trigger.data_id().map(|id| truncate(id, 80)),
            actor_id = %trigger.actor_id,
            "event received"
        );
        Ok(())
    });
    webhook.on_event("memberships", ALL, Arc::clone(&log_event));
    webhook.on_event("rooms", ALL, Arc::clone(&log_event));
    webhook.on_event("messages", "deleted", log_event);
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
