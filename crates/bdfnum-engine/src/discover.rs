//! Include discovery: the file tree, per-file ID catalogs, and card provenance.
//!
//! Files live in an arena indexed by [`FileId`]; the root is always
//! `FileId` 0 and the arena order is discovery order (depth-first, in include
//! order), which is the same order the deck reader visits files.

use crate::error::EngineError;
use crate::report::{Finding, FindingKind};
use crate::rules;
use bdfnum_deck::deck::read_text;
use bdfnum_deck::lex::{self, BulkItem, RawCard, StartMode};
use bdfnum_deck::{Card, Namespace, ReadOptions};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

pub type FileId = usize;

pub const ROOT: FileId = 0;

/// One node of the include tree.
#[derive(Debug, Clone)]
pub struct IncludeFile {
    pub path: PathBuf,
    /// The file that first included this one.
    pub parent: Option<FileId>,
    /// Files included from this one, in include order.
    pub children: Vec<FileId>,
    /// IDs this file owns, per namespace.
    pub ids: BTreeMap<Namespace, BTreeSet<u32>>,
    pub cards: usize,
}

impl IncludeFile {
    /// Namespaces with at least one ID, in canonical order.
    pub fn namespaces(&self) -> Vec<Namespace> {
        self.ids
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(ns, _)| *ns)
            .collect()
    }

    pub fn id_count(&self) -> usize {
        self.ids.values().map(BTreeSet::len).sum()
    }
}

// ============================================================================
// Provenance
// ============================================================================

/// Normalize a card's leading field for provenance matching: integers by
/// value, anything else trimmed and upper-cased.
pub fn provenance_key(field: &str) -> String {
    match lex::parse_int(field) {
        Some(v) => v.to_string(),
        None => field.trim().to_ascii_uppercase(),
    }
}

/// The files each (card name, leading field) occurrence came from, in read
/// order.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    occurrences: HashMap<(String, String), Vec<FileId>>,
}

impl Provenance {
    fn record(&mut self, name: &str, key: String, file: FileId) {
        self.occurrences
            .entry((name.to_string(), key))
            .or_default()
            .push(file);
    }

    pub fn cursor(&self) -> ProvenanceCursor<'_> {
        ProvenanceCursor {
            provenance: self,
            taken: HashMap::new(),
        }
    }
}

/// Hands out the recorded files for each occurrence, one at a time.
pub struct ProvenanceCursor<'a> {
    provenance: &'a Provenance,
    taken: HashMap<(String, String), usize>,
}

impl ProvenanceCursor<'_> {
    pub fn take(&mut self, name: &str, key: &str) -> Option<FileId> {
        let slot = (name.to_string(), key.to_string());
        let files = self.provenance.occurrences.get(&slot)?;
        let next = self.taken.entry(slot).or_insert(0);
        let file = files.get(*next).copied()?;
        *next += 1;
        Some(file)
    }
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceSummary {
    pub namespace: Namespace,
    pub count: usize,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub cards: usize,
    pub namespaces: Vec<NamespaceSummary>,
}

// ============================================================================
// Discovery
// ============================================================================

#[derive(Debug, Clone)]
pub struct Discovery {
    root_dir: PathBuf,
    files: Vec<IncludeFile>,
    owners: HashMap<(Namespace, u32), FileId>,
    provenance: Provenance,
    findings: Vec<Finding>,
}

impl Discovery {
    pub fn root(&self) -> &IncludeFile {
        &self.files[ROOT]
    }

    /// Directory of the root file; output paths mirror the layout below it.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn files(&self) -> &[IncludeFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> Option<&IncludeFile> {
        self.files.get(id)
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> {
        0..self.files.len()
    }

    pub fn owner(&self, ns: Namespace, id: u32) -> Option<FileId> {
        self.owners.get(&(ns, id)).copied()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Structural findings gathered while scanning.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Path relative to the root directory, or the absolute path for files
    /// outside it.
    pub fn relative_path(&self, id: FileId) -> PathBuf {
        let path = &self.files[id].path;
        path.strip_prefix(&self.root_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone())
    }

    /// [`Self::relative_path`] with `/` separators, as used in snapshots.
    pub fn display_path(&self, id: FileId) -> String {
        let rel = self.relative_path(id);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
            .replace("//", "/")
    }

    /// Find a file by its snapshot key (relative path) or absolute path.
    pub fn find_file(&self, key: &str) -> Option<FileId> {
        let key = key.trim().replace('\\', "/");
        if let Some(id) = self.file_ids().find(|id| self.display_path(*id) == key) {
            return Some(id);
        }
        let wanted = lex::resolve_include(&self.root_dir, &key);
        self.file_ids().find(|id| self.files[*id].path == wanted)
    }

    /// Union of every file's catalog.
    pub fn all_ids(&self) -> BTreeMap<Namespace, BTreeSet<u32>> {
        let mut all: BTreeMap<Namespace, BTreeSet<u32>> = BTreeMap::new();
        for file in &self.files {
            for (ns, ids) in &file.ids {
                all.entry(*ns).or_default().extend(ids.iter().copied());
            }
        }
        all
    }

    pub fn summary(&self) -> Vec<FileSummary> {
        self.file_ids()
            .map(|id| {
                let file = &self.files[id];
                FileSummary {
                    path: self.display_path(id),
                    cards: file.cards,
                    namespaces: file
                        .ids
                        .iter()
                        .filter_map(|(ns, ids)| {
                            Some(NamespaceSummary {
                                namespace: *ns,
                                count: ids.len(),
                                min: *ids.first()?,
                                max: *ids.last()?,
                            })
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

/// Walk the include tree from `root` and catalog every defined ID.
///
/// Missing includes and duplicate definitions become Structural findings;
/// an unreadable root or include is an I/O error.
pub fn scan(root: &Path, options: &ReadOptions) -> Result<Discovery, EngineError> {
    let root = lex::absolute_path(root).map_err(|e| EngineError::io(root, e))?;
    let text = read_text(&root)?;
    let root_dir = root
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut scanner = Scanner {
        options,
        discovery: Discovery {
            root_dir,
            files: Vec::new(),
            owners: HashMap::new(),
            provenance: Provenance::default(),
            findings: Vec::new(),
        },
        visited: HashMap::new(),
        warned: HashSet::new(),
    };
    let id = scanner.add_file(root.clone(), None);
    let scan = lex::scan_text(&text, StartMode::Main);
    scanner.walk(id, scan.bulk)?;

    let discovery = scanner.discovery;
    tracing::info!(
        root = %root.display(),
        files = discovery.files.len(),
        ids = discovery.owners.len(),
        findings = discovery.findings.len(),
        "discovered include tree"
    );
    Ok(discovery)
}

struct Scanner<'a> {
    options: &'a ReadOptions,
    discovery: Discovery,
    visited: HashMap<PathBuf, FileId>,
    warned: HashSet<(Namespace, u32, FileId)>,
}

impl Scanner<'_> {
    fn add_file(&mut self, path: PathBuf, parent: Option<FileId>) -> FileId {
        let id = self.discovery.files.len();
        self.discovery.files.push(IncludeFile {
            path: path.clone(),
            parent,
            children: Vec::new(),
            ids: BTreeMap::new(),
            cards: 0,
        });
        if let Some(parent) = parent {
            self.discovery.files[parent].children.push(id);
        }
        self.visited.insert(path, id);
        id
    }

    fn is_ancestor(&self, candidate: FileId, of: FileId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.discovery.files[id].parent;
        }
        false
    }

    fn walk(&mut self, file: FileId, items: Vec<BulkItem>) -> Result<(), EngineError> {
        let path = self.discovery.files[file].path.clone();
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        for item in items {
            match item {
                BulkItem::Card(raw) => self.catalog(file, raw),
                BulkItem::Include { path: raw, line_no } => {
                    let target = lex::resolve_include(&dir, &raw);
                    if let Some(&seen) = self.visited.get(&target) {
                        if self.is_ancestor(seen, file) {
                            self.discovery.findings.push(
                                Finding::warning(
                                    FindingKind::Structural,
                                    format!("include cycle at line {line_no} back to '{raw}'; ignored"),
                                )
                                .in_file(&path),
                            );
                        } else if !self.discovery.files[file].children.contains(&seen) {
                            self.discovery.files[file].children.push(seen);
                        }
                        continue;
                    }
                    if !target.is_file() {
                        tracing::warn!(path = %target.display(), from = %path.display(), "include not found");
                        self.discovery.findings.push(
                            Finding::error(
                                FindingKind::Structural,
                                format!("include '{raw}' at line {line_no} not found ({})", target.display()),
                            )
                            .in_file(&path),
                        );
                        continue;
                    }
                    let text = read_text(&target)?;
                    let child = self.add_file(target, Some(file));
                    let scan = lex::scan_text(&text, StartMode::Include);
                    self.walk(child, scan.bulk)?;
                }
            }
        }
        tracing::debug!(
            path = %path.display(),
            cards = self.discovery.files[file].cards,
            ids = self.discovery.files[file].id_count(),
            "scanned file"
        );
        Ok(())
    }

    fn catalog(&mut self, file: FileId, raw: RawCard) {
        let key = provenance_key(raw.fields.first().map(String::as_str).unwrap_or(""));
        self.discovery.provenance.record(&raw.name, key, file);
        self.discovery.files[file].cards += 1;

        let Some(kind) = self.options.kind_of(&raw.name) else {
            return;
        };
        let line_no = raw.line_no;
        let card = Card::from_raw(raw);
        for (ns, value) in rules::definitions(kind, &card) {
            if value == 0 && ns == Namespace::Coord {
                let path = self.discovery.files[file].path.clone();
                self.discovery.findings.push(
                    Finding::error(
                        FindingKind::Structural,
                        format!("{kind} at line {line_no} defines reserved coordinate system 0"),
                    )
                    .in_file(&path)
                    .in_namespace(ns)
                    .in_id(0),
                );
                continue;
            }
            let Some(id) = u32::try_from(value).ok().filter(|v| *v > 0) else {
                continue;
            };
            self.define(file, ns, id, kind.name(), line_no);
        }
    }

    fn define(&mut self, file: FileId, ns: Namespace, id: u32, card: &str, line_no: usize) {
        let Some(&owner) = self.discovery.owners.get(&(ns, id)) else {
            self.discovery.owners.insert((ns, id), file);
            self.discovery.files[file].ids.entry(ns).or_default().insert(id);
            return;
        };
        if ns.is_shared() && owner == file {
            return;
        }

        let path = self.discovery.files[file].path.clone();
        let owner_path = self.discovery.files[owner].path.display().to_string();
        if ns.is_shared() {
            if self.warned.insert((ns, id, file)) {
                self.discovery.findings.push(
                    Finding::warning(
                        FindingKind::Structural,
                        format!(
                            "{} {id} is also defined in {owner_path}; it keeps that file's numbering",
                            ns.label()
                        ),
                    )
                    .in_file(&path)
                    .in_namespace(ns)
                    .in_id(id),
                );
            }
        } else {
            self.discovery.findings.push(
                Finding::error(
                    FindingKind::Structural,
                    format!(
                        "duplicate {} {id} on {card} at line {line_no} (first defined in {owner_path})",
                        ns.label()
                    ),
                )
                .in_file(&path)
                .in_namespace(ns)
                .in_id(id),
            );
        }
    }
}
