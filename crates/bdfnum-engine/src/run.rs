//! The whole pipeline in one run context.
//!
//! scan → plan → pre-validate → renumber bulk data and case control →
//! post-validate → write → re-read and compare.

use crate::control;
use crate::discover::{self, Discovery};
use crate::error::EngineError;
use crate::plan::{self, IdMapSet, RangeRequest};
use crate::renumber;
use crate::report::{Finding, RunStatus, ValidationReport};
use crate::snapshot::RangeSnapshot;
use crate::validate::{self, PreValidation};
use crate::writer;
use bdfnum_deck::{read_deck, Deck, ReadOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub report: ValidationReport,
    /// Written files, root first.
    pub files: Vec<PathBuf>,
    pub cards_written: usize,
    pub maps: usize,
}

/// State of one renumbering run: the discovered tree and the model read
/// from it. Runs share nothing.
#[derive(Debug, Clone)]
pub struct RenumberRun {
    options: ReadOptions,
    discovery: Discovery,
    deck: Deck,
}

impl RenumberRun {
    /// Discover the include tree and read the deck.
    pub fn open(root: &Path, options: ReadOptions) -> Result<Self, EngineError> {
        let discovery = discover::scan(root, &options)?;
        let deck = read_deck(root, &options)?;
        Ok(Self {
            options,
            discovery,
            deck,
        })
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn plan(&self, request: &RangeRequest) -> IdMapSet {
        plan::plan(&self.discovery, request)
    }

    pub fn validate(&self, plan: IdMapSet) -> PreValidation {
        validate::validate(&self.discovery, &self.deck, plan)
    }

    /// Run the pipeline with an explicit request.
    pub fn execute(self, request: &RangeRequest, output_dir: &Path) -> Result<RunOutcome, EngineError> {
        self.run(request, Vec::new(), output_dir)
    }

    /// Run the pipeline with ranges from a snapshot. Snapshot entries naming
    /// files outside this deck are reported and ignored.
    pub fn execute_snapshot(self, snapshot: &RangeSnapshot, output_dir: &Path) -> Result<RunOutcome, EngineError> {
        let (request, findings) = snapshot.to_request(&self.discovery);
        self.run(&request, findings, output_dir)
    }

    fn run(self, request: &RangeRequest, findings: Vec<Finding>, output_dir: &Path) -> Result<RunOutcome, EngineError> {
        let mut report = ValidationReport::new();
        report.extend(findings);

        let pre = self.validate(self.plan(request));
        let validated = match pre.into_validated() {
            Ok(validated) => validated,
            Err(errors) => {
                report.merge(errors);
                return Err(EngineError::PlanRejected(report));
            }
        };
        report.merge(validated.warnings().clone());

        let RenumberRun {
            options,
            discovery,
            mut deck,
        } = self;
        report.merge(renumber::apply(&mut deck, &validated));
        report.merge(control::apply_control(&mut deck, &validated));

        let post = validate::post_validate(&deck, &validated);
        report.merge(post);
        if report.has_errors() {
            return Err(EngineError::PostValidation(report));
        }

        let written = writer::write(&deck, &discovery, &validated, output_dir)?;
        report.merge(written.report);
        if let Some(main) = written.files.first() {
            report.merge(validate::verify_output(main, &options, &validated));
        }

        let status = report.status();
        tracing::info!(
            status = ?status,
            files = written.files.len(),
            cards = written.cards_written,
            "renumbering finished"
        );
        Ok(RunOutcome {
            status,
            report,
            files: written.files,
            cards_written: written.cards_written,
            maps: validated.len(),
        })
    }
}
