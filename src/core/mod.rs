pub mod change_detector;
pub mod merge;
pub mod orchestrator;

pub use change_detector::{ChangeDetector, Detection, DispatchReport};
pub use merge::{merge_snapshot, ItemField, MergeOutcome};
pub use orchestrator::{launch_throttle, OrchestratorSettings, ScrapeOrchestrator};
