//! Range allocation: turning per-file ID ranges into old→new ID maps.

use crate::discover::{Discovery, FileId};
use bdfnum_deck::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Ranges
// ============================================================================

/// An inclusive ID interval. Serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct IdRange {
    pub start: u32,
    pub end: u32,
}

impl IdRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of IDs the range can hold; zero when `end < start`.
    pub fn capacity(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            u64::from(self.end - self.start) + 1
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.start <= id && id <= self.end
    }

    pub fn overlaps(&self, other: &IdRange) -> bool {
        self.capacity() > 0 && other.capacity() > 0 && self.start <= other.end && other.start <= self.end
    }
}

impl From<[u32; 2]> for IdRange {
    fn from([start, end]: [u32; 2]) -> Self {
        Self { start, end }
    }
}

impl From<IdRange> for [u32; 2] {
    fn from(range: IdRange) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid range `{0}` (expected START:END with non-negative integers)")]
pub struct InvalidRange(pub String);

impl FromStr for IdRange {
    type Err = InvalidRange;

    /// Parses `START:END` (also `START-END`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(':')
            .or_else(|| s.split_once('-'))
            .ok_or_else(|| InvalidRange(s.to_string()))?;
        let start = a.trim().parse().map_err(|_| InvalidRange(s.to_string()))?;
        let end = b.trim().parse().map_err(|_| InvalidRange(s.to_string()))?;
        Ok(IdRange { start, end })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    /// One span per file, split evenly across the namespaces it uses.
    #[default]
    Simple,
    /// One range per (file, namespace).
    Advanced,
}

/// What the user asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeRequest {
    pub mode: RangeMode,
    pub spans: BTreeMap<FileId, IdRange>,
    pub ranges: BTreeMap<FileId, BTreeMap<Namespace, IdRange>>,
    /// Keep SPC, MPC and load set IDs as they are.
    pub skip_set_ids: bool,
}

impl RangeRequest {
    pub fn simple() -> Self {
        Self::default()
    }

    pub fn advanced() -> Self {
        Self {
            mode: RangeMode::Advanced,
            ..Self::default()
        }
    }

    pub fn with_span(mut self, file: FileId, range: IdRange) -> Self {
        self.spans.insert(file, range);
        self
    }

    pub fn with_range(mut self, file: FileId, ns: Namespace, range: IdRange) -> Self {
        self.ranges.entry(file).or_default().insert(ns, range);
        self
    }

    pub fn skipping_set_ids(mut self, skip: bool) -> Self {
        self.skip_set_ids = skip;
        self
    }

    pub fn renumbers(&self, ns: Namespace) -> bool {
        !(self.skip_set_ids && ns.is_set_id())
    }
}

// ============================================================================
// Maps
// ============================================================================

/// Old→new IDs for one (file, namespace): ascending old IDs take
/// `start, start + 1, …` in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMap {
    range: IdRange,
    forward: BTreeMap<u32, u32>,
}

impl IdMap {
    /// Build the full map even when the range is too small; capacity is the
    /// validator's call.
    pub fn build(range: IdRange, ids: &BTreeSet<u32>) -> Self {
        let forward = ids
            .iter()
            .enumerate()
            .map(|(i, old)| {
                let new = u64::from(range.start) + i as u64;
                (*old, u32::try_from(new).unwrap_or(u32::MAX))
            })
            .collect();
        Self { range, forward }
    }

    pub fn range(&self) -> IdRange {
        self.range
    }

    pub fn get(&self, old: u32) -> Option<u32> {
        self.forward.get(&old).copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.forward.iter().map(|(o, n)| (*o, *n))
    }

    pub fn inverse(&self) -> BTreeMap<u32, u32> {
        self.forward.iter().map(|(o, n)| (*n, *o)).collect()
    }
}

/// Every per-file map of a plan, with per-namespace union lookups.
///
/// Each old ID has exactly one owning file, so the union of the per-file maps
/// of a namespace is itself a function.
#[derive(Debug, Clone, Default)]
pub struct IdMapSet {
    maps: BTreeMap<(FileId, Namespace), IdMap>,
    forward: BTreeMap<Namespace, BTreeMap<u32, u32>>,
    inverse: HashMap<Namespace, HashMap<u32, u32>>,
    request: RangeRequest,
}

impl IdMapSet {
    fn from_maps(maps: BTreeMap<(FileId, Namespace), IdMap>, request: RangeRequest) -> Self {
        let mut forward: BTreeMap<Namespace, BTreeMap<u32, u32>> = BTreeMap::new();
        let mut inverse: HashMap<Namespace, HashMap<u32, u32>> = HashMap::new();
        for ((_, ns), map) in &maps {
            for (old, new) in map.iter() {
                forward.entry(*ns).or_default().insert(old, new);
                inverse.entry(*ns).or_default().insert(new, old);
            }
        }
        Self {
            maps,
            forward,
            inverse,
            request,
        }
    }

    pub fn get(&self, file: FileId, ns: Namespace) -> Option<&IdMap> {
        self.maps.get(&(file, ns))
    }

    pub fn maps(&self) -> impl Iterator<Item = (FileId, Namespace, &IdMap)> {
        self.maps.iter().map(|((file, ns), map)| (*file, *ns, map))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn request(&self) -> &RangeRequest {
        &self.request
    }

    /// New ID for an old one, through the union of the namespace's maps.
    pub fn lookup(&self, ns: Namespace, old: u32) -> Option<u32> {
        self.forward.get(&ns)?.get(&old).copied()
    }

    /// Old ID for a new one.
    pub fn original(&self, ns: Namespace, new: u32) -> Option<u32> {
        self.inverse.get(&ns)?.get(&new).copied()
    }

    pub fn contains_old(&self, ns: Namespace, old: u32) -> bool {
        self.lookup(ns, old).is_some()
    }

    pub fn contains_new(&self, ns: Namespace, new: u32) -> bool {
        self.original(ns, new).is_some()
    }

    /// Mapped `(old, new)` pairs of a namespace whose old ID lies on the
    /// progression `lo, lo + step, …` up to `hi`, in ascending old order.
    /// Only IDs the plan knows are visited, however wide the span.
    pub fn known_in(&self, ns: Namespace, lo: u32, hi: u32, step: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let step = step.max(1);
        self.forward
            .get(&ns)
            .filter(|_| lo <= hi)
            .into_iter()
            .flat_map(move |m| m.range(lo..=hi))
            .filter(move |(old, _)| (**old - lo) % step == 0)
            .map(|(old, new)| (*old, *new))
    }

    /// True when the plan maps at least one ID of the namespace.
    pub fn maps_namespace(&self, ns: Namespace) -> bool {
        self.forward.get(&ns).is_some_and(|m| !m.is_empty())
    }

    /// Map an integer field. Blank, non-integer, zero and negative values and
    /// IDs without a mapping give `None` (leave the field alone).
    pub fn map_field(&self, ns: Namespace, text: &str) -> Option<u32> {
        let old = bdfnum_deck::lex::parse_id(text)?;
        self.lookup(ns, old).filter(|new| *new != old)
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Split a span into equal contiguous blocks, one per namespace in the order
/// given; the last block also takes the remainder.
pub fn allocate_simple(span: IdRange, present: &[Namespace]) -> Vec<(Namespace, IdRange)> {
    if present.is_empty() {
        return Vec::new();
    }
    let total = span.capacity() as i64;
    let block = total / present.len() as i64;
    let clamp = |v: i64| v.clamp(0, i64::from(u32::MAX)) as u32;

    present
        .iter()
        .enumerate()
        .map(|(j, ns)| {
            let start = i64::from(span.start) + j as i64 * block;
            let end = if j + 1 == present.len() {
                i64::from(span.end)
            } else {
                start + block - 1
            };
            (*ns, IdRange::new(clamp(start), clamp(end)))
        })
        .collect()
}

/// Build the old→new maps for every (file, namespace) the request covers.
pub fn plan(discovery: &Discovery, request: &RangeRequest) -> IdMapSet {
    let mut maps = BTreeMap::new();

    for id in discovery.file_ids() {
        let Some(file) = discovery.file(id) else {
            continue;
        };
        let empty = BTreeSet::new();

        match request.mode {
            RangeMode::Simple => {
                let Some(span) = request.spans.get(&id) else {
                    continue;
                };
                // Skipped set namespaces still take their block of the split;
                // they just get no map.
                for (ns, block) in allocate_simple(*span, &file.namespaces()) {
                    if !request.renumbers(ns) {
                        continue;
                    }
                    let ids = file.ids.get(&ns).unwrap_or(&empty);
                    maps.insert((id, ns), IdMap::build(block, ids));
                }
            }
            RangeMode::Advanced => {
                let Some(ranges) = request.ranges.get(&id) else {
                    continue;
                };
                for (ns, range) in ranges {
                    if !request.renumbers(*ns) {
                        continue;
                    }
                    let ids = file.ids.get(ns).unwrap_or(&empty);
                    maps.insert((id, *ns), IdMap::build(*range, ids));
                }
            }
        }
    }

    tracing::info!(
        mode = ?request.mode,
        maps = maps.len(),
        skip_set_ids = request.skip_set_ids,
        "planned id maps"
    );
    IdMapSet::from_maps(maps, request.clone())
}

/// Round up to the next multiple of the value's leading decimal magnitude
/// (8 → 8, 16 → 20, 1234 → 2000).
pub fn round_up_magnitude(value: u64) -> u64 {
    if value == 0 {
        return 0;
    }
    let mut magnitude = 1u64;
    while magnitude <= value / 10 {
        magnitude *= 10;
    }
    value.div_ceil(magnitude) * magnitude
}

/// Propose a Simple-mode span per file, packed from `start` upward.
///
/// Each span holds one block per namespace the file uses, sized for the
/// largest renumbered one, so the equal split never runs short. Skipped set
/// namespaces still count as blocks but not toward the size.
pub fn suggest_ranges(discovery: &Discovery, start: u32, skip_set_ids: bool) -> BTreeMap<FileId, IdRange> {
    let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    let mut spans = BTreeMap::new();
    let mut cursor = u64::from(start.max(1));

    for id in discovery.file_ids() {
        let Some(file) = discovery.file(id) else {
            continue;
        };
        let present = file.namespaces();
        let widest = present
            .iter()
            .filter(|ns| !(skip_set_ids && ns.is_set_id()))
            .map(|ns| file.ids.get(ns).map_or(0, BTreeSet::len))
            .max()
            .unwrap_or(0) as u64;

        if widest == 0 {
            spans.insert(id, IdRange::new(clamp(cursor), clamp(cursor)));
            cursor += 1;
            continue;
        }
        let need = present.len() as u64 * widest;
        let end = round_up_magnitude(cursor + need - 1);
        spans.insert(id, IdRange::new(clamp(cursor), clamp(end)));
        cursor = end + 1;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use Namespace::*;

    #[test]
    fn equal_blocks_with_remainder_on_last() {
        let blocks = allocate_simple(IdRange::new(1, 10), &[Node, Element, Property]);
        assert_eq!(
            blocks,
            vec![
                (Node, IdRange::new(1, 3)),
                (Element, IdRange::new(4, 6)),
                (Property, IdRange::new(7, 10)),
            ]
        );
    }

    #[test]
    fn map_assigns_in_ascending_order() {
        let ids: BTreeSet<u32> = [40, 7, 12].into_iter().collect();
        let map = IdMap::build(IdRange::new(100, 199), &ids);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(7, 100), (12, 101), (40, 102)]);
        assert_eq!(map.inverse()[&102], 40);
    }

    #[test]
    fn short_range_still_maps_everything() {
        let ids: BTreeSet<u32> = (1..=5).collect();
        let map = IdMap::build(IdRange::new(10, 12), &ids);
        assert_eq!(map.len(), 5);
        assert_eq!(map.get(5), Some(14));
    }

    #[test]
    fn known_in_visits_only_mapped_ids_on_the_step() {
        let ids: BTreeSet<u32> = [2, 5, 8, 9, 40].into_iter().collect();
        let mut maps = BTreeMap::new();
        maps.insert((0, Node), IdMap::build(IdRange::new(100, 199), &ids));
        let set = IdMapSet::from_maps(maps, RangeRequest::simple());

        let all: Vec<_> = set.known_in(Node, 1, u32::MAX, 1).collect();
        assert_eq!(all, vec![(2, 100), (5, 101), (8, 102), (9, 103), (40, 104)]);
        let stepped: Vec<_> = set.known_in(Node, 2, 9, 3).collect();
        assert_eq!(stepped, vec![(2, 100), (5, 101), (8, 102)]);
        assert_eq!(set.known_in(Node, 9, 2, 1).count(), 0);
        assert_eq!(set.known_in(Element, 1, 100, 1).count(), 0);
    }

    #[test]
    fn parse_range_forms() {
        assert_eq!("1:999".parse::<IdRange>().unwrap(), IdRange::new(1, 999));
        assert_eq!("1000-1999".parse::<IdRange>().unwrap(), IdRange::new(1000, 1999));
        assert!("12".parse::<IdRange>().is_err());
        assert!("-5:10".parse::<IdRange>().is_err());
    }

    #[test]
    fn overlap_needs_shared_ids() {
        let a = IdRange::new(1, 10);
        assert!(a.overlaps(&IdRange::new(10, 20)));
        assert!(!a.overlaps(&IdRange::new(11, 20)));
        assert!(!a.overlaps(&IdRange::new(5, 4)));
    }

    #[test]
    fn magnitude_rounding() {
        assert_eq!(round_up_magnitude(8), 8);
        assert_eq!(round_up_magnitude(16), 20);
        assert_eq!(round_up_magnitude(1000), 1000);
        assert_eq!(round_up_magnitude(1234), 2000);
        assert_eq!(round_up_magnitude(99_001), 100_000);
    }

    #[test]
    fn range_serializes_as_pair() {
        let json = serde_json::to_string(&IdRange::new(3, 9)).unwrap();
        assert_eq!(json, "[3,9]");
        let back: IdRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, IdRange::new(3, 9));
    }
}
