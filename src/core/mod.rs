pub mod comparator;
pub mod engine;
pub mod mover;
pub mod prune;
pub mod registry;
pub mod scanner;
pub mod session;
pub mod title;
pub mod watcher;

pub use comparator::{ActionSummary, FileComparator, SyncAction};
pub use engine::{ReconcileEngine, ReconcilePlan, ReconcileReport};
pub use mover::{MoveResult, PendingMove, SafeMover, WritingSentinel};
pub use prune::{prune_empty_ancestors, remove_and_prune};
pub use registry::{MovedLog, SeenSet};
pub use scanner::{FileScanner, PathEntry, PathIndex, ScanConfig};
pub use session::{SessionEnd, SyncSession};
pub use title::{NoTitle, ReleaseTitleExtractor, TitleExtractor};
pub use watcher::{EventOutcome, IgnoreReason, WatchEnd, WatchLoop, WatchState};
