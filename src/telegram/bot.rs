//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

use crate::core::config;

/// Keeps the whole tail of the message as the /start payload.
///
/// Telegram deep links arrive as `/start <token>`; a bare `/start` gives an
/// empty string.
fn start_payload(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "регистрация или зачисление встречи", parse_with = start_payload)]
    Start(String),
    #[command(description = "устроить встречу")]
    Meet,
    #[command(description = "показать остаток встреч")]
    Count,
    #[command(description = "удалить свои данные")]
    Reset,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, network issues, etc.)
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        return Err(anyhow::anyhow!(
            "BOT_TOKEN (or TELOXIDE_TOKEN) environment variable not set"
        ));
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;

    // Check if local Bot API server is configured
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let api_url = url::Url::parse(&bot_api_url)
            .map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::with_client(token, client).set_api_url(api_url)
    } else {
        Bot::with_client(token, client)
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// # Arguments
/// * `bot` - Bot instance to configure
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "регистрация или зачисление встречи"),
        BotCommand::new("meet", "устроить встречу"),
        BotCommand::new("count", "показать остаток встреч"),
        BotCommand::new("reset", "удалить свои данные"),
    ])
    .await?;

    Ok(())
}
