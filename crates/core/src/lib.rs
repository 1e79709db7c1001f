pub mod dedup;
pub mod error;
pub mod extract;
pub mod identity;
pub mod index;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod verify;

pub use dedup::{deduplicate, disambiguate_names, ExistingState};
pub use extract::Extractor;
pub use model::{AggregateStyle, SubscriptionEntry, Target};
pub use pipeline::{run_pipeline, run_pipeline_with, RunOptions, RunSummary, StopReason};
pub use storage::Workspace;
pub use verify::{ProbeSettings, Verifier};
