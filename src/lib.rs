pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;
pub mod status;

pub use crate::core::{
    MoveResult, PathEntry, PathIndex, PendingMove, ReconcileEngine, ReconcileReport, SafeMover,
    SessionEnd, SyncSession, WatchLoop,
};
pub use config::AppConfig;
pub use error::SyncError;
pub use models::{SessionOptions, WatchMode, WatchedPair};
pub use status::{MemoryStatusSink, StatusEvent, StatusSink, TracingStatusSink};
