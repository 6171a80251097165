//! # PriceWatch Channels
//! Messaging channels. Telegram is both the alert sink (`Notifier`) and
//! the bot's command source (long polling).

pub mod telegram;

pub use telegram::{IncomingMessage, TelegramChannel};
