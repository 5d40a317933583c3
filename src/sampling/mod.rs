pub mod checkpoint;
pub mod collector;
pub mod coverage;
pub mod label;
pub mod poll;
pub mod watcher;

pub use checkpoint::{Checkpointer, ResumePoint};
pub use collector::{CollectionDriver, CollectionOutcome, CollectionSummary};
pub use coverage::{CharacterRecord, CoverageTracker};
pub use label::extract_label;
pub use poll::{await_condition, WaitError};
pub use watcher::DirectoryWatcher;
