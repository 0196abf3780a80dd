//! Resolution services for the employer import workflow

pub mod candidate_finder;
pub mod decision_recorder;
pub mod fwc_client;
pub mod import_committer;
pub mod import_orchestrator;
pub mod merge_executor;
pub mod similarity;

pub use candidate_finder::CandidateFinder;
pub use decision_recorder::DecisionRecorder;
pub use fwc_client::FwcClient;
pub use import_committer::ImportCommitter;
pub use import_orchestrator::ImportOrchestrator;
pub use merge_executor::MergeExecutor;
