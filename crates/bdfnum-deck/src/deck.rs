//! The in-memory model: typed card dictionaries plus a passthrough bucket.

use crate::card::Card;
use crate::kind::CardKind;
use crate::lex::{self, BulkItem, StartMode};
use crate::namespace::Namespace;
use crate::DeckError;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Read options
// ============================================================================

/// Options accepted by [`read_deck`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Card names that are not parsed into typed records. Cards with these
    /// names land in the passthrough bucket and are written back unchanged.
    pub disabled: BTreeSet<String>,
}

impl ReadOptions {
    pub fn with_disabled<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            disabled: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_ascii_uppercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }

    /// Typed kind for a card name, honoring the disabled list.
    pub fn kind_of(&self, name: &str) -> Option<CardKind> {
        if self.is_disabled(name) {
            None
        } else {
            CardKind::from_name(name)
        }
    }
}

// ============================================================================
// Card tables
// ============================================================================

/// All cards of one kind. Keyed cards live under their primary ID (a list,
/// since set IDs are shared by many cards); cards without a usable primary ID
/// are kept in read order.
#[derive(Debug, Clone, Default)]
pub struct CardTable {
    by_id: BTreeMap<u32, Vec<Card>>,
    unkeyed: Vec<Card>,
}

impl CardTable {
    pub fn insert(&mut self, kind: CardKind, card: Card) {
        match (kind.namespace(), card.id()) {
            (Some(_), Some(id)) => self.by_id.entry(id).or_default().push(card),
            _ => self.unkeyed.push(card),
        }
    }

    pub fn by_id(&self) -> &BTreeMap<u32, Vec<Card>> {
        &self.by_id
    }

    pub fn get(&self, id: u32) -> &[Card] {
        self.by_id.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unkeyed(&self) -> &[Card] {
        &self.unkeyed
    }

    pub fn len(&self) -> usize {
        self.by_id.values().map(Vec::len).sum::<usize>() + self.unkeyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cards in key order, then unkeyed cards.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.by_id.values().flatten().chain(self.unkeyed.iter())
    }

    pub fn cards_mut(&mut self) -> impl Iterator<Item = &mut Card> {
        self.by_id.values_mut().flatten().chain(self.unkeyed.iter_mut())
    }

    /// Rebuild the dictionary from each card's current primary ID.
    pub fn rekey(&mut self, kind: CardKind) {
        let by_id = std::mem::take(&mut self.by_id);
        let unkeyed = std::mem::take(&mut self.unkeyed);
        for card in by_id.into_values().flatten().chain(unkeyed) {
            self.insert(kind, card);
        }
    }
}

// ============================================================================
// Deck
// ============================================================================

/// A fully read deck: every include flattened into one model.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    pub root: PathBuf,
    pub executive: Vec<String>,
    pub case_control: Vec<String>,
    /// True when the root file had no executive/case control sections.
    pub bulk_only: bool,
    tables: BTreeMap<CardKind, CardTable>,
    passthrough: Vec<Card>,
}

impl Deck {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// File a card under its kind, or into passthrough when it has none.
    pub fn insert(&mut self, kind: Option<CardKind>, card: Card) {
        match kind {
            Some(kind) => self.tables.entry(kind).or_default().insert(kind, card),
            None => self.passthrough.push(card),
        }
    }

    pub fn table(&self, kind: CardKind) -> Option<&CardTable> {
        self.tables.get(&kind)
    }

    pub fn tables(&self) -> impl Iterator<Item = (CardKind, &CardTable)> {
        self.tables.iter().map(|(k, t)| (*k, t))
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = (CardKind, &mut CardTable)> {
        self.tables.iter_mut().map(|(k, t)| (*k, t))
    }

    /// Unknown and disabled cards, in read order.
    pub fn passthrough(&self) -> &[Card] {
        &self.passthrough
    }

    /// Every typed card with its kind.
    pub fn typed_cards(&self) -> impl Iterator<Item = (CardKind, &Card)> {
        self.tables
            .iter()
            .flat_map(|(kind, table)| table.cards().map(move |c| (*kind, c)))
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(CardTable::len).sum::<usize>() + self.passthrough.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cards per card name, typed and passthrough alike.
    pub fn count_by_name(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (kind, table) in &self.tables {
            if !table.is_empty() {
                *counts.entry(kind.name().to_string()).or_insert(0) += table.len();
            }
        }
        for card in &self.passthrough {
            *counts.entry(card.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of typed cards whose primary ID lives in each namespace.
    pub fn count_by_namespace(&self) -> BTreeMap<Namespace, usize> {
        let mut counts = BTreeMap::new();
        for (kind, table) in &self.tables {
            if let Some(ns) = kind.namespace() {
                *counts.entry(ns).or_insert(0) += table.len();
            }
        }
        counts
    }

    /// Primary IDs present per namespace.
    pub fn ids_by_namespace(&self) -> BTreeMap<Namespace, BTreeSet<u32>> {
        let mut ids: BTreeMap<Namespace, BTreeSet<u32>> = BTreeMap::new();
        for (kind, table) in &self.tables {
            if let Some(ns) = kind.namespace() {
                ids.entry(ns).or_default().extend(table.by_id().keys().copied());
            }
        }
        ids
    }

    /// Write the whole deck to a single file.
    pub fn write_to(&self, path: &Path) -> Result<(), DeckError> {
        let mut out = Vec::new();
        if !self.bulk_only {
            out.extend(self.executive.iter().cloned());
            out.extend(self.case_control.iter().cloned());
            out.push("BEGIN BULK".to_string());
        }
        for (_, table) in self.tables() {
            for card in table.cards() {
                out.extend(card.render());
            }
        }
        for card in &self.passthrough {
            out.extend(card.render());
        }
        if !self.bulk_only {
            out.push("ENDDATA".to_string());
        }
        let mut text = out.join("\n");
        text.push('\n');
        fs::write(path, text).map_err(|source| DeckError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Read a deck and every file it includes into one model.
///
/// Includes are expanded depth-first at the point they appear; a file
/// included twice is read once. Missing includes are skipped with a warning;
/// the include discoverer reports them as findings.
pub fn read_deck(path: &Path, options: &ReadOptions) -> Result<Deck, DeckError> {
    let root = lex::absolute_path(path).map_err(|source| DeckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = read_text(&root)?;
    let scan = lex::scan_text(&text, StartMode::Main);

    let mut deck = Deck::new(&root);
    deck.executive = scan.executive;
    deck.case_control = scan.case_control;
    deck.bulk_only = scan.bulk_only;

    let mut visited = HashSet::new();
    visited.insert(root.clone());
    read_bulk(&mut deck, &root, scan.bulk, options, &mut visited)?;

    tracing::debug!(
        path = %root.display(),
        cards = deck.len(),
        passthrough = deck.passthrough.len(),
        "read deck"
    );
    Ok(deck)
}

fn read_bulk(
    deck: &mut Deck,
    file: &Path,
    items: Vec<BulkItem>,
    options: &ReadOptions,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), DeckError> {
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    for item in items {
        match item {
            BulkItem::Card(raw) => {
                let kind = options.kind_of(&raw.name);
                deck.insert(kind, Card::from_raw(raw));
            }
            BulkItem::Include { path, line_no } => {
                let target = lex::resolve_include(dir, &path);
                if !visited.insert(target.clone()) {
                    continue;
                }
                if !target.is_file() {
                    tracing::warn!(
                        path = %target.display(),
                        from = %file.display(),
                        line = line_no,
                        "include file not found; skipped"
                    );
                    continue;
                }
                let text = read_text(&target)?;
                let scan = lex::scan_text(&text, StartMode::Include);
                read_bulk(deck, &target, scan.bulk, options, visited)?;
            }
        }
    }
    Ok(())
}

/// Read a file as text, replacing invalid UTF-8.
pub fn read_text(path: &Path) -> Result<String, DeckError> {
    let bytes = fs::read(path).map_err(|source| DeckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_includes_once_and_buckets_unknown_cards() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.bdf"),
            "SOL 101\nCEND\nBEGIN BULK\nINCLUDE 'a.bdf'\nINCLUDE 'a.bdf'\nGRID,1\nFOOBAR,3,x\nENDDATA\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("a.bdf"), "GRID,2\nGRID,3\nCROD,1,1,2,3\n").unwrap();

        let deck = read_deck(&dir.path().join("main.bdf"), &ReadOptions::default()).unwrap();
        let grids = deck.table(CardKind::Grid).unwrap();
        assert_eq!(grids.len(), 3);
        assert_eq!(deck.passthrough().len(), 1);
        assert_eq!(deck.passthrough()[0].name(), "FOOBAR");
        assert_eq!(deck.count_by_name()["CROD"], 1);
        assert_eq!(deck.count_by_namespace()[&Namespace::Node], 3);
    }

    #[test]
    fn disabled_cards_are_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("m.bdf");
        std::fs::write(&main, "GRID,1\nBCTPARM,1,X\n").unwrap();
        let deck = read_deck(&main, &ReadOptions::with_disabled(["bctparm"])).unwrap();
        assert!(deck.bulk_only);
        assert!(deck.table(CardKind::Bctparm).is_none());
        assert_eq!(deck.passthrough().len(), 1);
    }

    #[test]
    fn shared_set_ids_keep_every_card() {
        let mut deck = Deck::new("x.bdf");
        for node in ["1", "2"] {
            let card = Card::new("FORCE", vec!["10".into(), node.into()]);
            deck.insert(Some(CardKind::Force), card);
        }
        assert_eq!(deck.table(CardKind::Force).unwrap().get(10).len(), 2);
    }

    #[test]
    fn rekey_follows_rewritten_primary_ids() {
        let mut table = CardTable::default();
        table.insert(CardKind::Grid, Card::new("GRID", vec!["5".into()]));
        for card in table.cards_mut() {
            card.set_field(0, "500");
        }
        table.rekey(CardKind::Grid);
        assert_eq!(table.by_id().keys().copied().collect::<Vec<_>>(), vec![500]);
    }

    #[test]
    fn single_file_write_round_trips_counts() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("m.bdf");
        std::fs::write(&main, "SOL 101\nCEND\nBEGIN BULK\nGRID,1\nGRID,2\nZZZ,1\nENDDATA\n").unwrap();
        let deck = read_deck(&main, &ReadOptions::default()).unwrap();
        let out = dir.path().join("out.bdf");
        deck.write_to(&out).unwrap();
        let again = read_deck(&out, &ReadOptions::default()).unwrap();
        assert_eq!(again.count_by_name(), deck.count_by_name());
        assert_eq!(again.executive, deck.executive);
    }
}
