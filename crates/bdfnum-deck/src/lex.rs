//! Line-level lexing of Nastran input files.
//!
//! Splits a file's text into executive control, case control and bulk data,
//! recognizes `INCLUDE` statements, and groups bulk lines into raw cards with
//! their continuations. Fields are flattened so that every small-field
//! physical line contributes 8 data slots and every large-field line 4.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ============================================================================
// Scan results
// ============================================================================

/// Where a file starts: the main deck begins in executive control, include
/// files begin directly in bulk data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Main,
    Include,
}

/// A card as it appears in the text, before it is typed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCard {
    /// Upper-case card name without the large-field `*`.
    pub name: String,
    pub fields: Vec<String>,
    /// Physical lines, line terminators stripped.
    pub lines: Vec<String>,
    /// `$` comment lines directly preceding the card.
    pub comments: Vec<String>,
    /// 1-based line number of the first physical line.
    pub line_no: usize,
    pub large: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkItem {
    Include { path: String, line_no: usize },
    Card(RawCard),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileScan {
    /// Executive control lines, `CEND` included.
    pub executive: Vec<String>,
    /// Case control lines between `CEND` and `BEGIN BULK`.
    pub case_control: Vec<String>,
    pub bulk: Vec<BulkItem>,
    /// True when a main file had no `CEND`/`BEGIN BULK` and was read as bulk data.
    pub bulk_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Executive,
    CaseControl,
    Bulk,
}

// ============================================================================
// Scanner
// ============================================================================

fn include_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*INCLUDE\s+['"]?(.+?)['"]?\s*$"#).expect("static include regex")
    })
}

/// Return the path named by an `INCLUDE` line, quotes removed.
pub fn include_target(line: &str) -> Option<String> {
    let caps = include_regex().captures(line)?;
    let path = caps[1].trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

fn is_cend(upper: &str) -> bool {
    upper.starts_with("CEND")
}

fn is_begin_bulk(upper: &str) -> bool {
    upper.starts_with("BEGIN") && upper.contains("BULK")
}

/// Split file text into sections and raw bulk cards.
pub fn scan_text(text: &str, mode: StartMode) -> FileScan {
    let lines: Vec<&str> = text.lines().collect();
    let mut scan = FileScan::default();

    let mut section = match mode {
        StartMode::Include => Section::Bulk,
        StartMode::Main => {
            let structured = lines.iter().any(|l| {
                let upper = l.trim().to_ascii_uppercase();
                is_cend(&upper) || is_begin_bulk(&upper)
            });
            if structured {
                Section::Executive
            } else {
                scan.bulk_only = true;
                Section::Bulk
            }
        }
    };

    let mut current: Option<RawCard> = None;
    let mut pending_comments: Vec<String> = Vec::new();

    for (idx, raw_line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim();
        let upper = trimmed.to_ascii_uppercase();

        match section {
            Section::Executive => {
                if is_begin_bulk(&upper) {
                    section = Section::Bulk;
                    continue;
                }
                scan.executive.push(line.to_string());
                if is_cend(&upper) {
                    section = Section::CaseControl;
                }
                continue;
            }
            Section::CaseControl => {
                if is_begin_bulk(&upper) {
                    section = Section::Bulk;
                } else {
                    scan.case_control.push(line.to_string());
                }
                continue;
            }
            Section::Bulk => {}
        }

        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('$') {
            pending_comments.push(line.to_string());
            continue;
        }
        if upper.starts_with("ENDDATA") {
            break;
        }
        if let Some(path) = include_target(line) {
            if let Some(card) = current.take() {
                scan.bulk.push(BulkItem::Card(finish(card)));
            }
            scan.bulk.push(BulkItem::Include { path, line_no });
            continue;
        }
        if is_begin_bulk(&upper) {
            continue;
        }

        if is_continuation(line) {
            if let Some(card) = current.as_mut() {
                append_line(card, line);
                continue;
            }
        }

        if let Some(card) = current.take() {
            scan.bulk.push(BulkItem::Card(finish(card)));
        }
        current = Some(start_card(line, line_no, std::mem::take(&mut pending_comments)));
    }

    if let Some(card) = current.take() {
        scan.bulk.push(BulkItem::Card(finish(card)));
    }
    scan
}

/// A continuation line starts with `+`, `*` or `,`, or leaves the name field blank.
pub fn is_continuation(line: &str) -> bool {
    match line.chars().next() {
        Some('+') | Some('*') | Some(',') => true,
        Some(c) if c == ' ' || c == '\t' => {
            let head: String = expand_tabs(line).chars().take(8).collect();
            head.trim().is_empty() && !line.trim().is_empty()
        }
        _ => false,
    }
}

fn start_card(line: &str, line_no: usize, comments: Vec<String>) -> RawCard {
    let (lead, data) = split_line(line);
    let lead = lead.trim().to_ascii_uppercase();
    let large = lead.ends_with('*');
    RawCard {
        name: lead.trim_end_matches('*').to_string(),
        fields: data,
        lines: vec![line.to_string()],
        comments,
        line_no,
        large,
    }
}

fn append_line(card: &mut RawCard, line: &str) {
    let (_, data) = split_line(line);
    card.fields.extend(data);
    card.lines.push(line.to_string());
}

fn finish(mut card: RawCard) -> RawCard {
    while card.fields.last().is_some_and(|f| f.is_empty()) {
        card.fields.pop();
    }
    card
}

/// Split one physical line into its leading field (name or continuation
/// marker) and its data fields, padded to the line's slot count.
pub fn split_line(line: &str) -> (String, Vec<String>) {
    if line.contains(',') {
        let mut parts = line.split(',');
        let lead = parts.next().unwrap_or_default().trim().to_string();
        let per_line = if lead.ends_with('*') { 4 } else { 8 };
        let mut data: Vec<String> = parts.take(per_line).map(|p| p.trim().to_string()).collect();
        data.resize(per_line, String::new());
        return (lead, data);
    }

    let chars: Vec<char> = expand_tabs(line).chars().collect();
    let column = |start: usize, end: usize| -> String {
        if start >= chars.len() {
            return String::new();
        }
        chars[start..end.min(chars.len())].iter().collect::<String>().trim().to_string()
    };

    let lead = column(0, 8);
    let data = if lead.ends_with('*') {
        (0..4).map(|i| column(8 + 16 * i, 24 + 16 * i)).collect()
    } else {
        (0..8).map(|i| column(8 + 8 * i, 16 + 8 * i)).collect()
    };
    (lead, data)
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 16);
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - out.chars().count() % 8;
            out.extend(std::iter::repeat(' ').take(pad));
        } else {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Field values
// ============================================================================

/// Parse an integer field. Reals (`1.`, `2.5E3`) and text return `None`.
pub fn parse_int(field: &str) -> Option<i64> {
    let s = field.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok()
}

/// Parse a positive integer field as an identifier.
pub fn parse_id(field: &str) -> Option<u32> {
    parse_int(field).filter(|v| *v > 0).and_then(|v| u32::try_from(v).ok())
}

// ============================================================================
// Paths
// ============================================================================

/// Resolve an include path against the including file's directory and
/// normalize it lexically (`.` and `..` removed, no filesystem access).
pub fn resolve_include(base_dir: &Path, raw: &str) -> PathBuf {
    let raw = raw.trim().trim_matches(|c| c == '\'' || c == '"');
    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        normalize_path(candidate)
    } else {
        normalize_path(&base_dir.join(candidate))
    }
}

/// Make a path absolute against the current directory and normalize it.
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize_path(path))
    } else {
        Ok(normalize_path(&std::env::current_dir()?.join(path)))
    }
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
