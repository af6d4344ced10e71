use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use hubabot::chatbot::{telegram, ChatbotEngine, OllamaClient, TelegramClient};
use hubabot::config::Config;
use hubabot::telegram_log::TelegramLogLayer;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    /// Show what the bot does.
    Start,
    /// Check that the bot is alive.
    Ping,
}

struct BotState {
    config: Config,
    bot_user_id: i64,
    bot_username: String,
    chatbot: ChatbotEngine<TelegramClient>,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hubabot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("hubabot.log"))
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(TelegramLogLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting hubabot...");
    info!("Loaded config from {config_path}");
    info!(
        "Ollama: {} (model {}), trigger word \"{}\", max chain depth {}",
        config.ollama_host, config.ollama_model, config.trigger_word, config.max_chain_depth
    );
    info!("System prompt: {} ({} chars)", config.system_prompt_path.display(), config.system_prompt.chars().count());

    let (bot_user_id, bot_username) = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            (me.id.0 as i64, me.username().to_string())
        }
        Err(e) => {
            error!("Failed to get bot info: {e}");
            return;
        }
    };

    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        warn!("Failed to drop pending updates: {e}");
    }

    let ollama = match OllamaClient::new(
        &config.ollama_host,
        &config.ollama_model,
        &config.system_prompt,
        config.request_timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Ollama client: {e}");
            return;
        }
    };

    let telegram = Arc::new(TelegramClient::new(bot.clone()));
    let chatbot = ChatbotEngine::new(
        config.chatbot_config(bot_user_id, Some(bot_username.clone())),
        telegram,
        ollama,
    );

    let state = Arc::new(BotState {
        config,
        bot_user_id,
        bot_username,
        chatbot,
    });

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
                .branch(dptree::endpoint(handle_new_message)),
        )
        .branch(Update::filter_edited_message().endpoint(handle_edited_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let text = match cmd {
        Command::Start => format!(
            "🤖 Бот @{} активен! Начните сообщение со слова «{}» или ответьте на моё сообщение.",
            state.bot_username, state.config.trigger_word
        ),
        Command::Ping => "🏓 Понг! Бот работает исправно!".to_string(),
    };

    if let Err(e) = bot.send_message(msg.chat.id, text).await {
        warn!("Failed to answer command in chat {}: {e}", msg.chat.id);
    }
    Ok(())
}

async fn handle_new_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_msg = telegram::to_chat_message(&msg, state.bot_user_id);
    let parent = telegram::parent_message(&msg, state.bot_user_id);
    state
        .chatbot
        .handle_message(chat_msg, parent, msg.chat.is_private())
        .await;
    Ok(())
}

async fn handle_edited_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text().or(msg.caption()) else {
        return Ok(());
    };
    state
        .chatbot
        .handle_edit(msg.chat.id.0, msg.id.0 as i64, text)
        .await;
    Ok(())
}
