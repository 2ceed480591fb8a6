pub mod tracked_item;
pub mod snapshot;
pub mod change_event;
pub mod price_history;
pub mod progress;

// Re-exports for convenience
pub use tracked_item::*;
pub use snapshot::*;
pub use change_event::*;
pub use price_history::*;
pub use progress::*;
