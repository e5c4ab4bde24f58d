//! Range validation before mutation, and consistency checks after it.
//!
//! Pre-validation produces a [`PreValidation`]; only a clean one can be turned
//! into a [`ValidatedPlan`], and the renumberer accepts nothing else.

use crate::discover::{Discovery, FileId};
use crate::plan::{IdMapSet, IdRange};
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::rules;
use bdfnum_deck::{read_deck, Deck, Namespace, ReadOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::path::Path;

// ============================================================================
// Baseline
// ============================================================================

/// What the source model looked like before renumbering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    pub counts_by_name: BTreeMap<String, usize>,
    pub counts_by_namespace: BTreeMap<Namespace, usize>,
    /// References that already pointed at nothing in the source.
    pub dangling: BTreeSet<(Namespace, u32)>,
}

impl Baseline {
    pub fn capture(deck: &Deck) -> Self {
        let defined = defined_ids(deck);
        let dangling = dangling_references(deck, &defined).into_keys().collect();
        Self {
            counts_by_name: deck.count_by_name(),
            counts_by_namespace: deck.count_by_namespace(),
            dangling,
        }
    }
}

/// Every ID defined by a typed card, per namespace.
pub fn defined_ids(deck: &Deck) -> BTreeMap<Namespace, BTreeSet<u32>> {
    let mut defined: BTreeMap<Namespace, BTreeSet<u32>> = BTreeMap::new();
    for (kind, card) in deck.typed_cards() {
        for (ns, value) in rules::definitions(kind, card) {
            if let Some(id) = u32::try_from(value).ok().filter(|v| *v > 0) {
                defined.entry(ns).or_default().insert(id);
            }
        }
    }
    defined
}

/// Unresolved references, with the number of occurrences and the first card
/// name seen for each.
fn dangling_references(
    deck: &Deck,
    defined: &BTreeMap<Namespace, BTreeSet<u32>>,
) -> BTreeMap<(Namespace, u32), (usize, &'static str)> {
    let contains = |ns: Namespace, id: u32| defined.get(&ns).is_some_and(|ids| ids.contains(&id));
    let mut dangling: BTreeMap<(Namespace, u32), (usize, &'static str)> = BTreeMap::new();
    for (kind, card) in deck.typed_cards() {
        for (ns, id) in rules::references(kind, card, contains) {
            if !contains(ns, id) {
                dangling.entry((ns, id)).or_insert((0, kind.name())).0 += 1;
            }
        }
    }
    dangling
}

// ============================================================================
// Pre-validation
// ============================================================================

/// Result of checking a plan against the discovered deck.
#[derive(Debug, Clone)]
pub struct PreValidation {
    report: ValidationReport,
    plan: IdMapSet,
    baseline: Baseline,
}

impl PreValidation {
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn plan(&self) -> &IdMapSet {
        &self.plan
    }

    pub fn is_clean(&self) -> bool {
        !self.report.has_errors()
    }

    /// The plan, if no Error was found. Otherwise the full report.
    pub fn into_validated(self) -> Result<ValidatedPlan, ValidationReport> {
        if self.report.has_errors() {
            return Err(self.report);
        }
        Ok(ValidatedPlan {
            plan: self.plan,
            baseline: self.baseline,
            warnings: self.report,
        })
    }
}

/// A plan that passed pre-validation, plus the source baseline the
/// post-checks compare against.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    plan: IdMapSet,
    baseline: Baseline,
    warnings: ValidationReport,
}

impl ValidatedPlan {
    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Warnings raised during pre-validation.
    pub fn warnings(&self) -> &ValidationReport {
        &self.warnings
    }
}

impl Deref for ValidatedPlan {
    type Target = IdMapSet;

    fn deref(&self) -> &IdMapSet {
        &self.plan
    }
}

/// Check a plan: structural findings from discovery, missing ranges,
/// positivity, capacity and cross-file overlap. All findings are collected.
pub fn validate(discovery: &Discovery, deck: &Deck, plan: IdMapSet) -> PreValidation {
    let mut report = ValidationReport::new();
    report.extend(discovery.findings().iter().cloned());

    check_missing(discovery, &plan, &mut report);
    check_ranges(discovery, &plan, &mut report);
    check_overlap(discovery, &plan, &mut report);

    let baseline = Baseline::capture(deck);
    if !baseline.dangling.is_empty() {
        tracing::warn!(count = baseline.dangling.len(), "source deck has unresolved references");
    }
    tracing::info!(
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "pre-validation finished"
    );
    PreValidation {
        report,
        plan,
        baseline,
    }
}

fn check_missing(discovery: &Discovery, plan: &IdMapSet, report: &mut ValidationReport) {
    let request = plan.request();
    for id in discovery.file_ids() {
        let Some(file) = discovery.file(id) else {
            continue;
        };
        for ns in file.namespaces() {
            if !request.renumbers(ns) || plan.get(id, ns).is_some() {
                continue;
            }
            let count = file.ids.get(&ns).map_or(0, BTreeSet::len);
            report.push(
                Finding::error(
                    FindingKind::MissingRange,
                    format!("{count} {} value(s) have no target range", ns.label()),
                )
                .in_file(&discovery.relative_path(id))
                .in_namespace(ns),
            );
        }
    }
}

fn check_ranges(discovery: &Discovery, plan: &IdMapSet, report: &mut ValidationReport) {
    for (file, ns, map) in plan.maps() {
        let range = map.range();
        let path = discovery.relative_path(file);
        if range.start < 1 {
            report.push(
                Finding::error(FindingKind::Positivity, format!("range {range} starts below 1"))
                    .in_file(&path)
                    .in_namespace(ns),
            );
        }
        if range.end < range.start {
            report.push(
                Finding::error(FindingKind::Positivity, format!("range {range} ends before it starts"))
                    .in_file(&path)
                    .in_namespace(ns),
            );
        }
        if map.len() as u64 > range.capacity() {
            let mut finding = Finding::error(
                FindingKind::Capacity,
                format!(
                    "{} {} value(s) do not fit in {range} ({} slot(s))",
                    map.len(),
                    ns.label(),
                    range.capacity()
                ),
            )
            .in_file(&path)
            .in_namespace(ns);
            // First old ID left without a slot.
            let overflow = usize::try_from(range.capacity()).ok().and_then(|n| map.iter().nth(n));
            if let Some((old, _)) = overflow {
                finding = finding.in_id(old);
            }
            report.push(finding);
        }
    }
}

fn check_overlap(discovery: &Discovery, plan: &IdMapSet, report: &mut ValidationReport) {
    let mut by_namespace: BTreeMap<Namespace, Vec<(IdRange, FileId)>> = BTreeMap::new();
    for (file, ns, map) in plan.maps() {
        by_namespace.entry(ns).or_default().push((map.range(), file));
    }
    for (ns, mut ranges) in by_namespace {
        ranges.sort();
        for (i, (a, file_a)) in ranges.iter().enumerate() {
            for (b, file_b) in &ranges[i + 1..] {
                if b.start > a.end {
                    break;
                }
                if a.overlaps(b) {
                    report.push(
                        Finding::error(
                            FindingKind::Overlap,
                            format!(
                                "{} range {a} of {} overlaps {b} of {}",
                                ns.label(),
                                discovery.display_path(*file_a),
                                discovery.display_path(*file_b)
                            ),
                        )
                        .in_namespace(ns),
                    );
                }
            }
        }
    }
}

// ============================================================================
// Post-validation
// ============================================================================

/// Check the renumbered model: record counts unchanged and every reference
/// resolved. References that dangled in the source stay Warnings.
pub fn post_validate(deck: &Deck, plan: &ValidatedPlan) -> ValidationReport {
    let mut report = ValidationReport::new();
    let baseline = plan.baseline();

    compare_counts(&baseline.counts_by_name, &deck.count_by_name(), &mut report);
    let after = deck.count_by_namespace();
    for ns in Namespace::ALL {
        let before = baseline.counts_by_namespace.get(&ns).copied().unwrap_or(0);
        let now = after.get(&ns).copied().unwrap_or(0);
        if before != now {
            report.push(
                Finding::error(
                    FindingKind::CountMismatch,
                    format!("{before} card(s) before renumbering, {now} after"),
                )
                .in_namespace(ns),
            );
        }
    }

    let defined = defined_ids(deck);
    for ((ns, id), (count, card)) in dangling_references(deck, &defined) {
        let message = format!(
            "{card} references {} {id}, which is not defined ({count} reference(s))",
            ns.label()
        );
        let finding = if baseline.dangling.contains(&(ns, id)) {
            Finding::warning(FindingKind::DanglingReference, format!("{message}; already unresolved in the source"))
        } else {
            Finding::error(FindingKind::DanglingReference, message)
        };
        report.push(finding.in_namespace(ns).in_id(id));
    }

    for (ns, id) in &baseline.dangling {
        if defined.get(ns).is_some_and(|ids| ids.contains(id)) {
            report.push(
                Finding::warning(
                    FindingKind::DanglingReference,
                    format!(
                        "{} {id} was referenced but undefined in the source and is now assigned by renumbering",
                        ns.label()
                    ),
                )
                .in_namespace(*ns)
                .in_id(*id),
            );
        }
    }

    tracing::info!(
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "post-validation finished"
    );
    report
}

fn compare_counts(
    before: &BTreeMap<String, usize>,
    after: &BTreeMap<String, usize>,
    report: &mut ValidationReport,
) {
    let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for name in names {
        let was = before.get(name).copied().unwrap_or(0);
        let now = after.get(name).copied().unwrap_or(0);
        if was != now {
            report.push(Finding::error(
                FindingKind::CountMismatch,
                format!("{name}: {was} card(s) in the source, {now} in the output"),
            ));
        }
    }
}

/// Re-read the written deck and compare per-card-name counts with the source.
/// A deck that cannot be read back is an Io Error.
pub fn verify_output(main: &Path, options: &ReadOptions, plan: &ValidatedPlan) -> ValidationReport {
    let mut report = ValidationReport::new();
    let written = match read_deck(main, options) {
        Ok(deck) => deck,
        Err(err) => {
            tracing::error!(path = %main.display(), error = %err, "cannot re-read written deck");
            report.push(
                Finding::error(FindingKind::Io, format!("written deck could not be read back: {err}"))
                    .in_file(main),
            );
            return report;
        }
    };
    compare_counts(&plan.baseline().counts_by_name, &written.count_by_name(), &mut report);
    tracing::info!(
        path = %main.display(),
        cards = written.len(),
        mismatches = report.len(),
        "re-read written deck"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::scan;
    use crate::plan::{plan, RangeRequest};
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        discovery: Discovery,
        deck: Deck,
    }

    fn fixture(main: &str, include: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.bdf");
        fs::write(&path, main).unwrap();
        fs::write(dir.path().join("inc.bdf"), include).unwrap();
        let options = ReadOptions::default();
        Fixture {
            discovery: scan(&path, &options).unwrap(),
            deck: read_deck(&path, &options).unwrap(),
            _dir: dir,
        }
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let f = fixture("GRID,1\nINCLUDE 'inc.bdf'\n", "GRID,2\n");
        let request = RangeRequest::simple()
            .with_span(0, IdRange::new(1, 100))
            .with_span(1, IdRange::new(50, 150));
        let pre = validate(&f.discovery, &f.deck, plan(&f.discovery, &request));
        assert!(!pre.is_clean());
        assert_eq!(pre.report().of_kind(FindingKind::Overlap).count(), 1);
        assert!(pre.into_validated().is_err());
    }

    #[test]
    fn capacity_and_positivity_are_reported_together() {
        let f = fixture("GRID,1\nGRID,2\nGRID,3\nINCLUDE 'inc.bdf'\n", "GRID,9\n");
        let request = RangeRequest::advanced()
            .with_range(0, Namespace::Node, IdRange::new(1, 2))
            .with_range(1, Namespace::Node, IdRange::new(0, 0));
        let pre = validate(&f.discovery, &f.deck, plan(&f.discovery, &request));
        let report = pre.report();
        let capacity: Vec<_> = report.of_kind(FindingKind::Capacity).collect();
        assert_eq!(capacity.len(), 1);
        assert_eq!(capacity[0].namespace, Some(Namespace::Node));
        assert_eq!(capacity[0].id, Some(3));
        assert_eq!(report.of_kind(FindingKind::Positivity).count(), 1);
    }

    #[test]
    fn file_without_range_is_missing() {
        let f = fixture("GRID,1\nINCLUDE 'inc.bdf'\n", "GRID,2\nCROD,4,1,2,2\n");
        let request = RangeRequest::simple().with_span(0, IdRange::new(1, 10));
        let pre = validate(&f.discovery, &f.deck, plan(&f.discovery, &request));
        assert_eq!(pre.report().of_kind(FindingKind::MissingRange).count(), 2);
    }

    #[test]
    fn skipped_set_ids_need_no_range() {
        let f = fixture("GRID,1\nFORCE,7,1\nINCLUDE 'inc.bdf'\n", "SPC1,3,123,1\n");
        let request = RangeRequest::simple()
            .with_span(0, IdRange::new(1, 10))
            .skipping_set_ids(true);
        let pre = validate(&f.discovery, &f.deck, plan(&f.discovery, &request));
        assert!(pre.is_clean(), "{}", pre.report());
    }

    #[test]
    fn clean_plan_carries_source_baseline() {
        let f = fixture("GRID,1\nCROD,5,1,1,99\nINCLUDE 'inc.bdf'\n", "GRID,2\n");
        let request = RangeRequest::simple()
            .with_span(0, IdRange::new(1, 100))
            .with_span(1, IdRange::new(101, 200));
        let validated = validate(&f.discovery, &f.deck, plan(&f.discovery, &request))
            .into_validated()
            .unwrap();
        assert_eq!(validated.baseline().counts_by_name["GRID"], 2);
        assert!(validated.baseline().dangling.contains(&(Namespace::Node, 99)));
        assert_eq!(validated.lookup(Namespace::Node, 2), Some(101));
    }

    #[test]
    fn dangling_findings_name_the_missing_id() {
        let mut f = fixture("GRID,1\nCROD,5,1,1,99\nINCLUDE 'inc.bdf'\n", "GRID,2\n");
        let request = RangeRequest::simple()
            .with_span(0, IdRange::new(1, 100))
            .with_span(1, IdRange::new(101, 200));
        let validated = validate(&f.discovery, &f.deck, plan(&f.discovery, &request))
            .into_validated()
            .unwrap();
        crate::renumber::apply(&mut f.deck, &validated);

        let report = post_validate(&f.deck, &validated);
        // property 1 has no PROD either
        let dangling: Vec<_> = report
            .of_kind(FindingKind::DanglingReference)
            .filter(|f| f.namespace == Some(Namespace::Node))
            .collect();
        assert_eq!(dangling.len(), 1);
        assert!(!dangling[0].is_error());
        assert_eq!((dangling[0].namespace, dangling[0].id), (Some(Namespace::Node), Some(99)));
    }

    #[test]
    fn unreadable_output_is_an_io_error() {
        let f = fixture("GRID,1\nINCLUDE 'inc.bdf'\n", "GRID,2\n");
        let request = RangeRequest::simple()
            .with_span(0, IdRange::new(1, 100))
            .with_span(1, IdRange::new(101, 200));
        let validated = validate(&f.discovery, &f.deck, plan(&f.discovery, &request))
            .into_validated()
            .unwrap();

        let missing = f._dir.path().join("out/main.bdf");
        let report = verify_output(&missing, &ReadOptions::default(), &validated);
        let io: Vec<_> = report.of_kind(FindingKind::Io).collect();
        assert_eq!(io.len(), 1);
        assert!(io[0].is_error());
        assert_eq!(io[0].file.as_deref(), Some(missing.as_path()));
    }
}
