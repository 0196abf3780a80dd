//! Domain models for the employer import service

pub mod decision;
pub mod import_result;
pub mod matching;
pub mod pending;

pub use decision::{AliasDecision, EmployerDecision, ImportDecision};
pub use import_result::{BulkMergeReport, ImportItemError, ImportResult, MergeFailure};
pub use matching::{AliasConflict, CandidateMatch, DuplicateDetection, MatchType, MergeGroup};
pub use pending::{EmployerRole, ImportStatus, PendingEmployer, SourcePayload};
