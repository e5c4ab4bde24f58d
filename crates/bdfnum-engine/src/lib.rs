//! Include-aware ID renumbering for Nastran decks.
//!
//! A deck split across a main file and nested `INCLUDE` files is renumbered so
//! that each file's IDs land in a range chosen for that file:
//! - `discover`: include tree, per-file ID catalogs and card provenance
//! - `plan`: Simple/Advanced range requests → per-(file, namespace) ID maps
//! - `validate`: capacity, overlap, positivity and coverage before mutation;
//!   counts and references after it
//! - `rules` / `renumber`: the per-card-kind field rewrite table and its
//!   application
//! - `control`: case control set selections (`LOAD = 10`, …)
//! - `writer`: the renumbered deck written back as the same file tree
//! - `snapshot`: range plans saved as JSON for repeatable runs
//! - `run`: the pipeline end to end

pub mod control;
pub mod discover;
pub mod error;
pub mod plan;
pub mod renumber;
pub mod report;
pub mod rules;
pub mod run;
pub mod snapshot;
pub mod validate;
pub mod writer;

pub use discover::{scan, Discovery, FileId, IncludeFile};
pub use error::EngineError;
pub use plan::{plan, suggest_ranges, IdMap, IdMapSet, IdRange, RangeMode, RangeRequest};
pub use renumber::apply;
pub use report::{Finding, FindingKind, RunStatus, Severity, ValidationReport};
pub use run::{RenumberRun, RunOutcome};
pub use snapshot::RangeSnapshot;
pub use validate::{post_validate, validate, PreValidation, ValidatedPlan};
pub use writer::write;
