pub mod adapter;
pub mod notifier;

pub use adapter::SourceAdapter;
pub use notifier::NotificationSink;
