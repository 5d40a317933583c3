pub mod run;

pub use run::{CollectionRun, RunStatus};
