//! # MechaHelper Channels
//! Chat transport implementations. Telegram is the only backend the bot ships with.

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramPollingStream};
