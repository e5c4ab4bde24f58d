//! Reusable range configuration, persisted as JSON.
//!
//! ```json
//! {
//!   "version": 1,
//!   "mode": "simple",
//!   "skip_set_ids": false,
//!   "disabled_cards": ["BCTPARM"],
//!   "files": {
//!     "main.bdf": { "span": [1, 999] },
//!     "inc/part.bdf": { "namespaces": { "node": [1000, 1499] } }
//!   }
//! }
//! ```
//!
//! File keys are paths relative to the root file's directory, `/`-separated.

use crate::discover::{Discovery, FileId};
use crate::error::EngineError;
use crate::plan::{IdMapSet, IdRange, RangeMode, RangeRequest};
use crate::report::{Finding, FindingKind};
use bdfnum_deck::{Namespace, ReadOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<IdRange>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespaces: BTreeMap<Namespace, IdRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSnapshot {
    pub version: u32,
    #[serde(default)]
    pub mode: RangeMode,
    #[serde(default)]
    pub skip_set_ids: bool,
    #[serde(default)]
    pub disabled_cards: BTreeSet<String>,
    #[serde(default)]
    pub files: BTreeMap<String, FileRanges>,
}

impl Default for RangeSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            mode: RangeMode::Simple,
            skip_set_ids: false,
            disabled_cards: BTreeSet::new(),
            files: BTreeMap::new(),
        }
    }
}

impl RangeSnapshot {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let snapshot: RangeSnapshot = serde_json::from_str(&text).map_err(|source| EngineError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EngineError::SnapshotVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| EngineError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        fs::write(path, json + "\n").map_err(|e| EngineError::io(path, e))
    }

    /// Record a plan: Simple spans as given plus the namespace blocks they
    /// resolved to, or the Advanced ranges as given.
    pub fn from_plan(discovery: &Discovery, plan: &IdMapSet, options: &ReadOptions) -> Self {
        let request = plan.request();
        let mut files: BTreeMap<String, FileRanges> = BTreeMap::new();
        for (file, span) in &request.spans {
            if request.mode == RangeMode::Simple {
                files.entry(discovery.display_path(*file)).or_default().span = Some(*span);
            }
        }
        for (file, ns, map) in plan.maps() {
            files
                .entry(discovery.display_path(file))
                .or_default()
                .namespaces
                .insert(ns, map.range());
        }
        Self {
            version: SNAPSHOT_VERSION,
            mode: request.mode,
            skip_set_ids: request.skip_set_ids,
            disabled_cards: options.disabled.clone(),
            files,
        }
    }

    /// Simple-mode snapshot from per-file spans.
    pub fn from_spans(discovery: &Discovery, spans: &BTreeMap<FileId, IdRange>, skip_set_ids: bool) -> Self {
        let files = spans
            .iter()
            .map(|(file, span)| {
                (
                    discovery.display_path(*file),
                    FileRanges {
                        span: Some(*span),
                        namespaces: BTreeMap::new(),
                    },
                )
            })
            .collect();
        Self {
            skip_set_ids,
            files,
            ..Self::default()
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::with_disabled(&self.disabled_cards)
    }

    /// Resolve file keys against a discovered tree. Keys that match no file
    /// are reported as Warnings and ignored.
    pub fn to_request(&self, discovery: &Discovery) -> (RangeRequest, Vec<Finding>) {
        let mut request = RangeRequest {
            mode: self.mode,
            skip_set_ids: self.skip_set_ids,
            ..RangeRequest::default()
        };
        let mut findings = Vec::new();

        for (key, ranges) in &self.files {
            let Some(file) = discovery.find_file(key) else {
                findings.push(Finding::warning(
                    FindingKind::MissingRange,
                    format!("snapshot names '{key}', which is not part of this deck; ignored"),
                ));
                continue;
            };
            match self.mode {
                RangeMode::Simple => {
                    if let Some(span) = ranges.span {
                        request.spans.insert(file, span);
                    }
                }
                RangeMode::Advanced => {
                    if !ranges.namespaces.is_empty() {
                        request.ranges.insert(file, ranges.namespaces.clone());
                    }
                }
            }
        }
        (request, findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::scan;
    use crate::plan::plan;

    #[test]
    fn saves_and_reloads_a_plan() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.bdf");
        fs::create_dir_all(dir.path().join("inc")).unwrap();
        fs::write(&main, "GRID,1\nCROD,2,1,1,1\nINCLUDE 'inc/a.bdf'\n").unwrap();
        fs::write(dir.path().join("inc/a.bdf"), "GRID,5\n").unwrap();

        let discovery = scan(&main, &ReadOptions::default()).unwrap();
        let request = RangeRequest::simple()
            .with_span(0, IdRange::new(1, 100))
            .with_span(1, IdRange::new(101, 200));
        let maps = plan(&discovery, &request);
        let snapshot = RangeSnapshot::from_plan(&discovery, &maps, &ReadOptions::with_disabled(["BCTPARM"]));
        assert_eq!(snapshot.files["main.bdf"].namespaces[&Namespace::Element], IdRange::new(51, 100));

        let path = dir.path().join("ranges.json");
        snapshot.save(&path).unwrap();
        let loaded = RangeSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert!(loaded.read_options().is_disabled("BCTPARM"));

        let (again, findings) = loaded.to_request(&discovery);
        assert!(findings.is_empty());
        assert_eq!(again, request);
    }

    #[test]
    fn unknown_file_keys_are_warned() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.bdf");
        fs::write(&main, "GRID,1\n").unwrap();
        let discovery = scan(&main, &ReadOptions::default()).unwrap();

        let mut snapshot = RangeSnapshot::default();
        snapshot.files.insert("nope.bdf".into(), FileRanges::default());
        let (_, findings) = snapshot.to_request(&discovery);
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].is_error());
    }

    #[test]
    fn rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, r#"{"version": 7, "files": {}}"#).unwrap();
        assert!(matches!(RangeSnapshot::load(&path), Err(EngineError::SnapshotVersion(7))));
    }
}
