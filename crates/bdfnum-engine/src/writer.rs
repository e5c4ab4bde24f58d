//! Writing a renumbered deck back out as the same tree of files.
//!
//! Every card goes back to the file it was read from. Ownership is recovered
//! from the discoverer's provenance record, keyed by card name and the
//! card's original leading field (found through the inverse ID map).

use crate::discover::{provenance_key, Discovery, FileId, ROOT};
use crate::error::EngineError;
use crate::plan::IdMapSet;
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::rules;
use bdfnum_deck::lex::{self, parse_id};
use bdfnum_deck::{Card, CardKind, Deck};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use CardKind as K;

/// Card groups in output order. Within a kind, cards are sorted by primary ID.
pub const WRITE_ORDER: &[(&str, &[CardKind])] = &[
    (
        "coordinate systems",
        &[K::Cord2r, K::Cord2c, K::Cord2s, K::Cord1r, K::Cord1c, K::Cord1s],
    ),
    ("nodes", &[K::Grid, K::Spoint]),
    (
        "elements",
        &[
            K::Cquad4,
            K::Ctria3,
            K::Cquad8,
            K::Ctria6,
            K::Cquadr,
            K::Ctriar,
            K::Cshear,
            K::Chexa,
            K::Cpenta,
            K::Ctetra,
            K::Cbar,
            K::Cbeam,
            K::Crod,
            K::Conrod,
            K::Cbush,
            K::Celas1,
            K::Celas2,
            K::Celas3,
            K::Celas4,
            K::Cdamp1,
            K::Cdamp2,
            K::Cdamp3,
            K::Cdamp4,
            K::Cgap,
            K::Cweld,
            K::Cfast,
            K::Cvisc,
            K::Plotel,
            K::Chbdyg,
            K::Chbdye,
        ],
    ),
    ("rigid elements", &[K::Rbe2, K::Rbe3, K::Rbar]),
    (
        "masses",
        &[K::Conm1, K::Conm2, K::Cmass1, K::Cmass2, K::Cmass3, K::Cmass4],
    ),
    (
        "properties",
        &[
            K::Pshell,
            K::Pcomp,
            K::Pcompg,
            K::Pcompls,
            K::Psolid,
            K::Plsolid,
            K::Pbar,
            K::Pbarl,
            K::Pbeam,
            K::Pbeaml,
            K::Prod,
            K::Pbush,
            K::Pbusht,
            K::Pelas,
            K::Pdamp,
            K::Pgap,
            K::Pshear,
            K::Pweld,
            K::Pfast,
            K::Pvisc,
        ],
    ),
    ("materials", &[K::Mat1, K::Mat2, K::Mat8, K::Mat9, K::Mat10]),
    (
        "static loads",
        &[
            K::Force,
            K::Moment,
            K::Pload,
            K::Pload2,
            K::Pload4,
            K::Grav,
            K::Rforce,
            K::Temp,
            K::Tempd,
            K::Darea,
        ],
    ),
    ("load combinations", &[K::Load, K::Dload]),
    ("dynamic loads", &[K::Rload1, K::Rload2, K::Tload1, K::Tload2]),
    (
        "constraints",
        &[K::Spc, K::Spc1, K::Spcadd, K::Mpc, K::Mpcadd, K::Suport, K::Suport1],
    ),
    (
        "contact",
        &[
            K::Bsurf,
            K::Bsurfs,
            K::Bctset,
            K::Bctadd,
            K::Bconp,
            K::Bcbody,
            K::Bctpara,
            K::Bctparm,
            K::Blseg,
            K::Bfric,
        ],
    ),
    ("sets", &[K::Set1, K::Set3]),
    ("eigenvalue methods", &[K::Eigrl, K::Eigr]),
    ("tables", &[K::Tabled1, K::Tablem1, K::Tabdmp1]),
];

const FALLBACK_HEADER: &str = "$ --- cards written as read (no renumbering rules) ---";

fn in_write_order(kind: CardKind) -> bool {
    WRITE_ORDER.iter().any(|(_, kinds)| kinds.contains(&kind))
}

#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Written files, in discovery order (root first).
    pub files: Vec<PathBuf>,
    pub cards_written: usize,
    pub report: ValidationReport,
}

#[derive(Default)]
struct FileCards<'a> {
    ordered: Vec<&'a Card>,
    fallback: Vec<&'a Card>,
}

// ============================================================================
// Paths
// ============================================================================

/// Output path of every discovered file. Layout below the root directory is
/// mirrored; files outside it land at the output root by file name.
pub fn output_paths(discovery: &Discovery, output_dir: &Path) -> Vec<PathBuf> {
    let mut used = HashSet::new();
    let mut paths = Vec::new();
    for id in discovery.file_ids() {
        let source = &discovery.files()[id].path;
        let name = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("main.bdf"));
        let rel = match source.strip_prefix(discovery.root_dir()) {
            Ok(rel) if id != ROOT => rel.to_path_buf(),
            _ => name.clone(),
        };
        let mut candidate = output_dir.join(&rel);
        let mut n = 2;
        while !used.insert(candidate.clone()) {
            candidate = output_dir.join(format!("{n}_{}", name.display()));
            n += 1;
        }
        paths.push(candidate);
    }
    paths
}

/// `target` relative to the directory `base`, `/`-separated.
pub fn relative_include(target: &Path, base: &Path) -> String {
    let t: Vec<Component> = target.components().collect();
    let b: Vec<Component> = base.components().collect();
    let common = t.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let mut parts: Vec<String> = vec!["..".to_string(); b.len() - common];
    parts.extend(t[common..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned()));
    parts.join("/")
}

// ============================================================================
// Writer
// ============================================================================

/// Key a card was recorded under at discovery time.
fn original_key(kind: CardKind, card: &Card, plan: &IdMapSet) -> String {
    let text = card.field(0);
    match (rules::field0_namespace(kind, card), parse_id(text)) {
        (Some(ns), Some(new)) => plan.original(ns, new).unwrap_or(new).to_string(),
        _ => provenance_key(text),
    }
}

/// Write the deck as one file per discovered file under `output_dir`.
pub fn write(
    deck: &Deck,
    discovery: &Discovery,
    plan: &IdMapSet,
    output_dir: &Path,
) -> Result<WriteOutcome, EngineError> {
    let output_dir = lex::absolute_path(output_dir).map_err(|e| EngineError::io(output_dir, e))?;
    if output_dir == discovery.root_dir() {
        return Err(EngineError::OutputOverlapsSource(output_dir));
    }
    fs::create_dir_all(&output_dir).map_err(|e| EngineError::io(&output_dir, e))?;

    let mut report = ValidationReport::new();
    let mut per_file: Vec<FileCards> = discovery.file_ids().map(|_| FileCards::default()).collect();
    let mut cursor = discovery.provenance().cursor();
    let file_count = per_file.len();
    let mut orphans: BTreeMap<String, usize> = BTreeMap::new();

    let mut place = |card: &Card, key: &str| -> FileId {
        match cursor.take(card.name(), key) {
            Some(file) if file < file_count => file,
            _ => {
                *orphans.entry(card.name().to_string()).or_insert(0) += 1;
                ROOT
            }
        }
    };

    for (_, kinds) in WRITE_ORDER {
        for kind in *kinds {
            let Some(table) = deck.table(*kind) else {
                continue;
            };
            for card in table.cards() {
                let file = place(card, &original_key(*kind, card, plan));
                per_file[file].ordered.push(card);
            }
        }
    }
    for (kind, table) in deck.tables() {
        if in_write_order(kind) {
            continue;
        }
        for card in table.cards() {
            let file = place(card, &original_key(kind, card, plan));
            per_file[file].fallback.push(card);
        }
    }
    for card in deck.passthrough() {
        let file = place(card, &provenance_key(card.field(0)));
        per_file[file].fallback.push(card);
    }

    for (name, count) in &orphans {
        tracing::warn!(card = %name, count, "cards without recorded source file");
        report.push(Finding::warning(
            FindingKind::Structural,
            format!("{count} {name} card(s) had no recorded source file; written to the main file"),
        ));
    }

    let paths = output_paths(discovery, &output_dir);
    let mut cards_written = 0;
    for id in discovery.file_ids() {
        let cards = &per_file[id];
        let lines = file_lines(deck, discovery, &paths, id, cards, &mut report);
        cards_written += cards.ordered.len() + cards.fallback.len();

        let path = &paths[id];
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        let mut text = lines.join("\n");
        text.push('\n');
        fs::write(path, text).map_err(|e| EngineError::io(path, e))?;
        tracing::debug!(
            path = %path.display(),
            cards = cards.ordered.len() + cards.fallback.len(),
            "wrote file"
        );
    }

    if cards_written != deck.len() {
        report.push(Finding::error(
            FindingKind::CountMismatch,
            format!("{} card(s) read but {cards_written} written", deck.len()),
        ));
    }
    tracing::info!(files = paths.len(), cards = cards_written, dir = %output_dir.display(), "wrote deck");
    Ok(WriteOutcome {
        files: paths,
        cards_written,
        report,
    })
}

fn file_lines(
    deck: &Deck,
    discovery: &Discovery,
    paths: &[PathBuf],
    id: FileId,
    cards: &FileCards<'_>,
    report: &mut ValidationReport,
) -> Vec<String> {
    let mut lines = Vec::new();
    let is_root = id == ROOT;
    let source = &discovery.files()[id];

    if is_root {
        if !deck.bulk_only {
            lines.extend(deck.executive.iter().cloned());
            lines.extend(deck.case_control.iter().cloned());
            lines.push("BEGIN BULK".to_string());
        }
    } else {
        let name = source
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        lines.push(format!("$ Renumbered from: {name}"));
    }

    let here = paths[id].parent().unwrap_or_else(|| Path::new("."));
    for child in &source.children {
        lines.push(format!("INCLUDE '{}'", relative_include(&paths[*child], here)));
    }

    for card in &cards.ordered {
        lines.extend(card.render());
    }

    if !cards.fallback.is_empty() {
        lines.push(FALLBACK_HEADER.to_string());
        let mut names: Vec<&str> = Vec::new();
        for card in &cards.fallback {
            if !names.contains(&card.name()) {
                names.push(card.name());
            }
            lines.extend(card.render());
        }
        for name in names {
            report.push(
                Finding::warning(
                    FindingKind::UnmappedType,
                    format!("{name} written unchanged in the fallback section"),
                )
                .in_file(&discovery.relative_path(id)),
            );
        }
    }

    if is_root && !deck.bulk_only {
        lines.push("ENDDATA".to_string());
    }
    lines
}
