pub mod traits;
pub mod manager;
pub mod adapters;
pub mod notifiers;

pub use manager::{
    initialize_default_plugins, AdapterRegistry, DefaultPlugins, NotificationSinkRef, SourceAdapterRef,
};
pub use traits::{NotificationSink, SourceAdapter};
