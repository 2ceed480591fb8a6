// Notification sink implementations
pub mod email;
pub mod discord;

pub use email::EmailSink;
pub use discord::DiscordSink;
