//! Telegram command bot: the chat front-end over `Tracker`.

use futures::StreamExt;
use pricewatch_channels::telegram::TelegramChannel;
use pricewatch_core::config::TelegramConfig;
use pricewatch_core::error::PriceWatchError;
use pricewatch_core::types::{JobId, JobStatus};
use pricewatch_scheduler::messages;
use pricewatch_scheduler::{ConfirmKey, Tracker};

use crate::commands::{self, BotCommand, HELP};

pub struct Bot {
    tracker: Tracker,
    telegram: TelegramConfig,
}

impl Bot {
    pub fn new(tracker: Tracker, telegram: TelegramConfig) -> Self {
        Self { tracker, telegram }
    }

    /// Consume the polling stream until it ends, replying to each command.
    pub async fn run(self, channel: TelegramChannel) {
        match channel.get_me().await {
            Ok(me) => tracing::info!(
                "🤖 Telegram bot: @{} ({})",
                me.username.as_deref().unwrap_or("unknown"),
                me.first_name
            ),
            Err(e) => tracing::warn!("⚠️ Telegram getMe failed: {e}"),
        }

        let mut stream = channel.clone().start_polling();
        while let Some(msg) = stream.next().await {
            let preview: String = msg.text.chars().take(100).collect();
            tracing::info!("[telegram] {} ({}): {preview}", msg.sender_name, msg.chat_id);

            if let Some(reply) = self.handle(msg.chat_id, &msg.text).await
                && let Err(e) = channel.send_message(msg.chat_id, &reply).await
            {
                tracing::error!("[telegram] Reply failed: {e}");
            }
        }
        tracing::info!("Telegram bot stopped");
    }

    /// Reply text for one message, `None` when the bot stays silent.
    pub async fn handle(&self, chat_id: i64, text: &str) -> Option<String> {
        let command = match commands::parse(text) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(usage) => return Some(usage),
        };
        let chat = chat_id.to_string();
        let currency = &self.tracker.policy().currency_symbol;

        let reply = match command {
            BotCommand::Start(None) => HELP.to_string(),
            BotCommand::Start(Some(token)) => {
                match self.tracker.confirm(ConfirmKey::Token(token), &chat, None) {
                    Ok(job) => messages::tracking_started(&job, currency),
                    Err(PriceWatchError::NotFound(_)) => {
                        "No pending tracking found for that link/token.".into()
                    }
                    Err(e) => confirm_failure(&e),
                }
            }
            BotCommand::Track(url) => match self.tracker.submit(&url, None).await {
                Ok(sub) => {
                    let link = self.telegram.deep_link(&sub.job.token);
                    messages::product_found(&sub.job, &sub.snapshot, &link, currency)
                }
                Err(PriceWatchError::Fetch(e)) => {
                    tracing::warn!("⚠️ /track {url}: {e}");
                    "Couldn't fetch product data. Paste a valid Amazon product URL.".into()
                }
                Err(e) => internal_failure(&e),
            },
            BotCommand::Confirm { id, target } => {
                let key = id.map_or(ConfirmKey::LatestPending, ConfirmKey::Id);
                match self.tracker.confirm(key, &chat, Some(target)) {
                    Ok(job) => messages::tracking_started(&job, currency),
                    Err(PriceWatchError::NotFound(_)) if id.is_none() => {
                        "No pending track found. Use /track <URL> first.".into()
                    }
                    Err(PriceWatchError::NotFound(_)) => "Entry not found.".into(),
                    Err(e) => confirm_failure(&e),
                }
            }
            BotCommand::Cancel => match self.tracker.cancel_latest(&chat) {
                Ok(job) => format!("🛑 Stopped tracking:\n{}", job.title),
                Err(PriceWatchError::NotFound(_)) => {
                    "No active tracking found for your chat.".into()
                }
                Err(e) => internal_failure(&e),
            },
            BotCommand::Stop(id) => self.stop(id, &chat),
            BotCommand::List => match self.tracker.list(&chat) {
                Ok(jobs) => messages::job_list(&jobs, currency),
                Err(e) => internal_failure(&e),
            },
        };
        Some(reply)
    }

    /// Stop a job owned by this chat, or an unclaimed pending one.
    fn stop(&self, id: JobId, chat: &str) -> String {
        let job = match self.tracker.store().get(id) {
            Ok(Some(job)) => job,
            Ok(None) => return "Entry not found.".into(),
            Err(e) => return internal_failure(&e),
        };
        let owned = match job.recipient.as_deref() {
            Some(recipient) => recipient == chat,
            None => job.status == JobStatus::Pending,
        };
        if !owned {
            return "Entry not found.".into();
        }
        match self.tracker.cancel(id) {
            Ok(true) => format!("🛑 Stopped tracking #{id}."),
            Ok(false) => format!("#{id} is already stopped."),
            Err(e) => internal_failure(&e),
        }
    }
}

fn confirm_failure(e: &PriceWatchError) -> String {
    match e {
        e if e.is_already_tracked() => "This item is already being tracked.".into(),
        PriceWatchError::InvalidTransition {
            from: JobStatus::Stopped,
            ..
        } => "This tracking has already been stopped.".into(),
        PriceWatchError::InvalidTargetPrice(_) => {
            format!("⚠️ {e}\nUse /confirm <entry_id> <target_price>.")
        }
        other => internal_failure(other),
    }
}

fn internal_failure(e: &PriceWatchError) -> String {
    tracing::warn!("⚠️ Bot command failed: {e}");
    "⚠️ Something went wrong, please try again later.".into()
}
