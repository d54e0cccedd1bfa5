//! Telegram adapter: the file side channel used to fetch user attachments.

pub mod files;

pub use files::TelegramFileSource;
