//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the bot. Handlers
//! only translate Telegram updates into [`Event`]s for the dialogue
//! controller and render the resulting [`Outcome`]s back into messages,
//! so integration tests can drive the same logic without a dispatcher.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::core::error::AppResult;
use crate::dialogue::{DialogueController, Event, Outcome, UserRef};
use crate::telegram::bot::Command;
use crate::telegram::keyboards;
use crate::telegram::Bot;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Cached regex for the hidden credit-grant command («встречи5»)
/// Compiled once at startup and reused for all requests
static GRANT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^встречи(\d+)$").expect("Failed to compile grant regex"));

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub controller: Arc<DialogueController>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(controller: Arc<DialogueController>) -> Self {
        Self { controller }
    }
}

/// Creates the main dispatcher schema for the Telegram bot.
///
/// This function returns a handler tree that can be used with teloxide's
/// Dispatcher. The same schema is used in production and in integration
/// tests.
///
/// # Arguments
/// * `deps` - Handler dependencies (dialogue controller)
///
/// # Returns
/// The complete handler tree for the bot
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_grant = deps.clone();
    let deps_messages = deps;

    dptree::entry()
        // Command handler
        .branch(command_handler(deps_commands))
        // Hidden credit-grant command (not in the Command enum)
        .branch(grant_handler(deps_grant))
        // Button captions and free text
        .branch(message_handler(deps_messages))
}

/// Handler for the commands listed in [`Command`]
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                let user = user_ref(&msg);
                let event = match cmd {
                    Command::Start(payload) => {
                        let token = payload.trim();
                        Event::Start {
                            payload: if token.is_empty() {
                                None
                            } else {
                                Some(token.to_string())
                            },
                        }
                    }
                    Command::Meet => Event::Meet,
                    Command::Count => Event::Count,
                    Command::Reset => Event::Reset,
                };
                run_event(&bot, &deps, &user, event).await.map_err(Into::into)
            }
        })
}

/// Handler for the hidden «встречи<N>» credit-grant message
fn grant_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text()
                .map(|text| GRANT_REGEX.is_match(text.trim()))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user = user_ref(&msg);
                // Digits that overflow i64 are treated as a format error,
                // same as a non-positive amount
                let amount = msg
                    .text()
                    .and_then(|text| GRANT_REGEX.captures(text.trim()))
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse::<i64>().ok())
                    .unwrap_or(0);
                run_event(&bot, &deps, &user, Event::GrantCredits(amount))
                    .await
                    .map_err(Into::into)
            }
        })
}

/// Handler for button captions and free text
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user = user_ref(&msg);
                let text = msg.text().unwrap_or_default();
                let event = match keyboards::menu_choice_from_label(text) {
                    Some(choice) => Event::Menu(choice),
                    None => Event::Text(text.to_string()),
                };
                run_event(&bot, &deps, &user, event).await.map_err(Into::into)
            }
        })
}

/// Extract the event author from a Telegram message
fn user_ref(msg: &Message) -> UserRef {
    UserRef {
        chat_id: msg.chat.id.0,
        username: msg.from.as_ref().and_then(|u| u.username.clone()),
    }
}

/// Runs one controller event and delivers the outcome.
///
/// Storage failures are reported to the user as a generic unavailability
/// message; nothing has been mutated on that path.
async fn run_event(bot: &Bot, deps: &HandlerDeps, user: &UserRef, event: Event) -> AppResult<()> {
    match deps.controller.handle(user, event).await {
        Ok(outcome) => deliver_outcome(bot, user.chat_id, outcome).await?,
        Err(e) => {
            if e.is_storage_unavailable() {
                log::error!("Storage unavailable for {}: {}", user.chat_id, e);
            } else {
                log::error!("Dialogue error for {}: {}", user.chat_id, e);
            }
            bot.send_message(ChatId(user.chat_id), "❌ Ошибка: база недоступна.")
                .await?;
        }
    }
    Ok(())
}

/// Sends the controller replies and the best-effort partner notice.
async fn deliver_outcome(bot: &Bot, chat_id: i64, outcome: Outcome) -> AppResult<()> {
    for reply in outcome.replies {
        let request = bot.send_message(ChatId(chat_id), reply.text);
        match keyboards::render(reply.keyboard) {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
    }

    if let Some(notice) = outcome.notice {
        // The match is already committed; a failed notification (blocked
        // bot, placeholder profile) must not fail the handler
        if let Err(e) = bot.send_message(ChatId(notice.chat_id), notice.text).await {
            log::warn!("Failed to notify partner {}: {}", notice.chat_id, e);
        }
    }

    Ok(())
}
