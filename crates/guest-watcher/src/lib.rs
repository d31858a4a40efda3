//! In-container artifact watcher: uploads files written by user code to
//! object storage and reports their retrieval URLs on stdout.

pub mod config;
pub mod error;
pub mod filter;
pub mod key;
pub mod store;
pub mod supervise;
pub mod watch;

pub use config::{S3Config, WatcherConfig};
pub use error::{StoreError, WatcherError};
pub use store::{ObjectHandle, ObjectStore, S3Store};
pub use watch::{ArtifactWatcher, WatchHandle};
