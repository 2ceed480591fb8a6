pub mod config;
pub mod core;
pub mod models;
pub mod plugins;
pub mod repository;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use core::{ChangeDetector, OrchestratorSettings, ScrapeOrchestrator};
pub use repository::{HistoryLedger, InMemoryStore, ItemRepository, SqliteStore};
pub use scheduler::RunScheduler;
pub use utils::error::{AppError, ItemError};

pub type Result<T> = std::result::Result<T, AppError>;
