pub mod autocomplete;
pub mod bookmarks;
pub mod catalog;
pub mod config;
pub mod connection_session;
pub mod credentials;
pub mod driver;
pub mod format;
pub mod notifications;
pub mod preferences;
pub mod query_history;
pub mod query_session;
pub mod query_tabs;
pub mod settings;
pub mod storage;
pub mod validate;
pub mod value;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use config::{ConnectionConfig, ConnectionIdentity};
pub use connection_session::{ConnectionSession, OperationOutcome};
pub use driver::{DatabaseDriver, DriverError, DriverErrorKind, QueryOutput};
pub use notifications::{Notifier, ToastLevel};
pub use settings::Settings;
pub use storage::{FileStateStore, MemoryStateStore, StateStore};
pub use value::SqlValue;
pub use workspace::Workspace;
