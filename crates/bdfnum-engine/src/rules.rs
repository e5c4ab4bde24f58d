//! Field rewrite rules per card kind.
//!
//! Each rule names a slot of the flattened field list (field 0 is the first
//! data field; continuation line `k` starts at field `8 * k`), the namespace
//! the integers in that slot belong to, and whether the slot defines IDs or
//! references them. The discoverer reads definitions, the renumberer rewrites
//! both, and the post-validator resolves references.
//!
//! [`rules_for`] is an exhaustive match over [`CardKind`]: adding a kind
//! without declaring its rules does not compile.

use bdfnum_deck::lex::parse_int;
use bdfnum_deck::{Card, CardKind, Namespace};

use Guard::*;
use Namespace::*;
use Slot::*;

// ============================================================================
// Rule vocabulary
// ============================================================================

/// Where in a card's fields a rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Field(usize),
    /// Inclusive run of fields.
    Range(usize, usize),
    /// Every field from here to the end, with `a THRU b [BY n]` ranges.
    Tail(usize),
    /// The given columns of every physical line from `from_line` on.
    Columns {
        cols: &'static [usize],
        from_line: usize,
    },
    /// Repeating groups of `width` fields starting at `start`; the rule
    /// covers `offsets` within each group.
    Groups {
        start: usize,
        width: usize,
        offsets: &'static [usize],
    },
    /// RBE3 weighted grid lists: `WT C G G ...` groups, then `UM` pairs,
    /// stopping at `ALPHA`.
    WeightedGroups(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Ns(Namespace),
    /// Namespace chosen by a keyword field (SET3 `DES`, CFAST `TYPE`).
    Keyword {
        at: usize,
        choices: &'static [(&'static str, Namespace)],
    },
    /// The candidate that contains most of the slot's values; ties go to the
    /// first candidate (SET1 may list grids or elements).
    Inferred(&'static [Namespace]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    FieldIs(usize, &'static str),
    FieldIsNot(usize, &'static str),
}

impl Guard {
    pub fn holds(self, card: &Card) -> bool {
        match self {
            Always => true,
            FieldIs(idx, keyword) => card.field(idx).trim().eq_ignore_ascii_case(keyword),
            FieldIsNot(idx, keyword) => !card.field(idx).trim().eq_ignore_ascii_case(keyword),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Defines,
    References,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub role: Role,
    pub slot: Slot,
    pub target: Target,
    pub guard: Guard,
}

impl Rule {
    const fn when(self, guard: Guard) -> Rule {
        Rule {
            role: self.role,
            slot: self.slot,
            target: self.target,
            guard,
        }
    }
}

const fn def(slot: Slot, ns: Namespace) -> Rule {
    Rule {
        role: Role::Defines,
        slot,
        target: Target::Ns(ns),
        guard: Always,
    }
}

const fn id(ns: Namespace) -> Rule {
    def(Field(0), ns)
}

const fn refs(slot: Slot, ns: Namespace) -> Rule {
    refs_to(slot, Target::Ns(ns))
}

const fn refs_to(slot: Slot, target: Target) -> Rule {
    Rule {
        role: Role::References,
        slot,
        target,
        guard: Always,
    }
}

// ============================================================================
// Tail lists
// ============================================================================

/// One item of a tail list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailToken {
    /// Position of a single value.
    Value(usize),
    /// Positions of `from THRU to [BY step]`.
    Thru {
        from: usize,
        to: usize,
        by: Option<usize>,
    },
    /// Position of any other text (e.g. `EXCEPT`).
    Word(usize),
}

pub fn tail_tokens(card: &Card, start: usize) -> Vec<TailToken> {
    let fields = card.fields();
    let mut tokens = Vec::new();
    let mut i = start;
    while i < fields.len() {
        let text = fields[i].trim();
        if text.is_empty() {
            i += 1;
            continue;
        }
        if text.eq_ignore_ascii_case("THRU") {
            if let Some(TailToken::Value(from)) = tokens.last().copied() {
                tokens.pop();
                let by = (fields.get(i + 2).map(|f| f.trim().eq_ignore_ascii_case("BY")) == Some(true))
                    .then_some(i + 3);
                tokens.push(TailToken::Thru { from, to: i + 1, by });
                i += if by.is_some() { 4 } else { 2 };
                continue;
            }
            tokens.push(TailToken::Word(i));
        } else if parse_int(text).is_some() {
            tokens.push(TailToken::Value(i));
        } else {
            tokens.push(TailToken::Word(i));
        }
        i += 1;
    }
    tokens
}

pub fn has_thru(card: &Card, start: usize) -> bool {
    tail_tokens(card, start)
        .iter()
        .any(|t| matches!(t, TailToken::Thru { .. }))
}

/// Values covered by a `THRU` token, in ascending order.
pub fn thru_values(card: &Card, from: usize, to: usize, by: Option<usize>) -> Vec<i64> {
    let (Some(lo), Some(hi)) = (card.int(from), card.int(to)) else {
        return Vec::new();
    };
    let step = by.and_then(|p| card.int(p)).filter(|s| *s > 0).unwrap_or(1);
    let mut out = Vec::new();
    let mut v = lo;
    while v <= hi {
        out.push(v);
        v += step;
    }
    out
}

/// Positive span of a `THRU` token as `(first, last, step)`, where `first` is
/// the first positive value of the progression. `None` when the span holds no
/// positive value.
pub fn thru_bounds(card: &Card, from: usize, to: usize, by: Option<usize>) -> Option<(u32, u32, u32)> {
    let (lo, hi) = (i128::from(card.int(from)?), i128::from(card.int(to)?));
    let step = by
        .and_then(|p| card.int(p))
        .filter(|s| *s > 0)
        .map_or(1, |s| i128::from(s.min(i64::from(u32::MAX))));
    let first = if lo >= 1 { lo } else { lo + (1 - lo + step - 1) / step * step };
    let last = hi.min(i128::from(u32::MAX));
    if first > last {
        return None;
    }
    Some((u32::try_from(first).ok()?, u32::try_from(last).ok()?, u32::try_from(step).ok()?))
}

// ============================================================================
// Slot positions
// ============================================================================

const LINE: usize = 8;

fn is_real(text: &str) -> bool {
    let t = text.trim();
    parse_int(t).is_none() && t.contains('.')
}

impl Slot {
    /// Field positions this slot covers on a given card. For tails the
    /// endpoints of `THRU` ranges are included.
    pub fn positions(&self, card: &Card) -> Vec<usize> {
        let len = card.fields().len();
        match *self {
            Field(i) => (i < len).then_some(i).into_iter().collect(),
            Range(a, b) => (a..=b).filter(|p| *p < len).collect(),
            Tail(start) => tail_tokens(card, start)
                .into_iter()
                .flat_map(|t| match t {
                    TailToken::Value(p) => vec![p],
                    TailToken::Thru { from, to, .. } => vec![from, to],
                    TailToken::Word(_) => Vec::new(),
                })
                .collect(),
            Columns { cols, from_line } => {
                let mut out = Vec::new();
                let mut line = from_line;
                while line * LINE < len {
                    out.extend(cols.iter().map(|c| line * LINE + c).filter(|p| *p < len));
                    line += 1;
                }
                out
            }
            Groups {
                start,
                width,
                offsets,
            } => {
                let mut out = Vec::new();
                let mut base = start;
                while base < len && width > 0 {
                    out.extend(offsets.iter().map(|o| base + o).filter(|p| *p < len));
                    base += width;
                }
                out
            }
            WeightedGroups(start) => weighted_positions(card, start),
        }
    }
}

fn weighted_positions(card: &Card, start: usize) -> Vec<usize> {
    let fields = card.fields();
    let mut out = Vec::new();
    let mut in_um = false;
    let mut i = start;
    while i < fields.len() {
        let text = fields[i].trim();
        let upper = text.to_ascii_uppercase();
        if upper == "ALPHA" {
            break;
        }
        if upper == "UM" {
            in_um = true;
        } else if in_um {
            // GM/CM pairs sit in columns 1-6 of the UM lines.
            if i % LINE % 2 == 1 && parse_int(text).is_some() {
                out.push(i);
            }
        } else if is_real(text) {
            // Weight, then its component field.
            i += 2;
            continue;
        } else if parse_int(text).is_some() {
            out.push(i);
        }
        i += 1;
    }
    out
}

// ============================================================================
// Target resolution
// ============================================================================

impl Target {
    /// Namespace for this rule on this card. `contains` answers whether an ID
    /// exists in a namespace; only inference consults it.
    pub fn resolve(
        &self,
        card: &Card,
        values: &[u32],
        contains: impl Fn(Namespace, u32) -> bool,
    ) -> Option<Namespace> {
        match *self {
            Target::Ns(ns) => Some(ns),
            Target::Keyword { at, choices } => {
                let keyword = card.field(at).trim().to_ascii_uppercase();
                choices
                    .iter()
                    .find(|(name, _)| *name == keyword)
                    .map(|(_, ns)| *ns)
            }
            Target::Inferred(candidates) => {
                let mut best: Option<(Namespace, usize)> = None;
                for ns in candidates {
                    let hits = values.iter().filter(|v| contains(*ns, **v)).count();
                    if best.map_or(true, |(_, b)| hits > b) {
                        best = Some((*ns, hits));
                    }
                }
                best.map(|(ns, _)| ns)
            }
        }
    }
}

/// Positive integer values at the given positions.
pub fn ids_at(card: &Card, positions: &[usize]) -> Vec<u32> {
    positions
        .iter()
        .filter_map(|p| card.int(*p))
        .filter(|v| *v > 0)
        .filter_map(|v| u32::try_from(v).ok())
        .collect()
}

// ============================================================================
// Queries
// ============================================================================

/// Every integer in a definition slot, `THRU` ranges expanded. Non-positive
/// values are returned too so callers can flag reserved IDs.
pub fn definitions(kind: CardKind, card: &Card) -> Vec<(Namespace, i64)> {
    let mut out = Vec::new();
    for rule in rules_for(kind) {
        if rule.role != Role::Defines || !rule.guard.holds(card) {
            continue;
        }
        let Target::Ns(ns) = rule.target else {
            continue;
        };
        match rule.slot {
            Tail(start) => {
                for token in tail_tokens(card, start) {
                    match token {
                        TailToken::Value(p) => out.extend(card.int(p).map(|v| (ns, v))),
                        TailToken::Thru { from, to, by } => {
                            out.extend(thru_values(card, from, to, by).into_iter().map(|v| (ns, v)))
                        }
                        TailToken::Word(_) => {}
                    }
                }
            }
            slot => {
                for p in slot.positions(card) {
                    out.extend(card.int(p).map(|v| (ns, v)));
                }
            }
        }
    }
    out
}

/// Plain references (positive, outside `THRU` ranges) with their resolved
/// namespace.
pub fn references(
    kind: CardKind,
    card: &Card,
    contains: impl Fn(Namespace, u32) -> bool,
) -> Vec<(Namespace, u32)> {
    let mut out = Vec::new();
    for rule in rules_for(kind) {
        if rule.role != Role::References || !rule.guard.holds(card) {
            continue;
        }
        let positions: Vec<usize> = match rule.slot {
            Tail(start) => tail_tokens(card, start)
                .into_iter()
                .filter_map(|t| match t {
                    TailToken::Value(p) => Some(p),
                    _ => None,
                })
                .collect(),
            slot => slot.positions(card),
        };
        let values = ids_at(card, &positions);
        if let Some(ns) = rule.target.resolve(card, &values, &contains) {
            out.extend(values.into_iter().map(|v| (ns, v)));
        }
    }
    out
}

/// Namespace of whatever sits in field 0, used to recover a card's original
/// leading value after renumbering (SUPORT has no ID but field 0 is a grid).
pub fn field0_namespace(kind: CardKind, card: &Card) -> Option<Namespace> {
    rules_for(kind).iter().find_map(|rule| match rule.target {
        Target::Ns(ns) if rule.guard.holds(card) && rule.slot.positions(card).first() == Some(&0) => {
            Some(ns)
        }
        _ => None,
    })
}

// ============================================================================
// Rule table
// ============================================================================

const SET3_KEYWORDS: &[(&str, Namespace)] = &[
    ("GRID", Node),
    ("POINT", Node),
    ("ELEM", Element),
    ("PROP", Property),
];

const CFAST_KEYWORDS: &[(&str, Namespace)] = &[("PROP", Property), ("ELEM", Element)];
const CWELD_PATCH_KEYWORDS: &[(&str, Namespace)] = &[
    ("PARTPAT", Property),
    ("ELPAT", Element),
    ("ELEMID", Element),
];

const GRID: &[Rule] = &[id(Node), refs(Field(1), Coord), refs(Field(5), Coord)];
const SPOINT: &[Rule] = &[def(Tail(0), Node)];

const CQUAD4: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 5), Node),
    refs(Field(6), Coord),
];
const CTRIA3: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 4), Node),
    refs(Field(5), Coord),
];
const CQUAD8: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 9), Node),
    refs(Field(14), Coord),
];
const CTRIA6: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 7), Node),
    refs(Field(8), Coord),
];
const CSHEAR: &[Rule] = &[id(Element), refs(Field(1), Property), refs(Range(2, 5), Node)];
const SOLID: &[Rule] = &[id(Element), refs(Field(1), Property), refs(Tail(2), Node)];
const LINE_ELEMENT: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 3), Node),
    refs(Field(4), Node),
];
/// CBAR plus the shear relief points SA/SB on the third line.
const CBEAM: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 3), Node),
    refs(Field(4), Node),
    refs(Range(16, 17), Node),
];
const CROD: &[Rule] = &[id(Element), refs(Field(1), Property), refs(Range(2, 3), Node)];
const CONROD: &[Rule] = &[id(Element), refs(Range(1, 2), Node), refs(Field(3), Material)];
const BUSH_GAP: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 3), Node),
    refs(Field(4), Node),
    refs(Field(7), Coord),
];
/// CGAP plus the spring-damper offset system OCID (line 2, after S).
const CBUSH: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Range(2, 3), Node),
    refs(Field(4), Node),
    refs(Field(7), Coord),
    refs(Field(9), Coord),
];
const SCALAR_1: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Field(2), Node),
    refs(Field(4), Node),
];
const SCALAR_2: &[Rule] = &[id(Element), refs(Field(2), Node), refs(Field(4), Node)];
const SCALAR_3: &[Rule] = &[id(Element), refs(Field(1), Property), refs(Range(2, 3), Node)];
const SCALAR_4: &[Rule] = &[id(Element), refs(Range(2, 3), Node)];
/// CWELD `EID PID GS TYPE GA GB MCID`; the second line holds the patch IDs
/// TYPE names, or the patch grids for GRIDID.
const CWELD: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs(Field(2), Node),
    refs(Range(4, 5), Node),
    refs(Field(6), Coord),
    refs_to(
        Range(8, 9),
        Target::Keyword {
            at: 3,
            choices: CWELD_PATCH_KEYWORDS,
        },
    ),
    refs(Tail(9), Node).when(FieldIs(3, "GRIDID")),
];
/// CFAST `EID PID TYPE IDA IDB GS GA GB`; TYPE says what IDA/IDB are.
const CFAST: &[Rule] = &[
    id(Element),
    refs(Field(1), Property),
    refs_to(
        Range(3, 4),
        Target::Keyword {
            at: 2,
            choices: CFAST_KEYWORDS,
        },
    ),
    refs(Range(5, 7), Node),
];
const PLOTEL: &[Rule] = &[id(Element), refs(Range(1, 2), Node)];
const CHBDYG: &[Rule] = &[id(Element), refs(Tail(8), Node)];
const CHBDYE: &[Rule] = &[id(Element), refs(Field(1), Element)];
const RBE2: &[Rule] = &[id(Element), refs(Field(1), Node), refs(Tail(3), Node)];
const RBE3: &[Rule] = &[id(Element), refs(Field(2), Node), refs(WeightedGroups(4), Node)];
const RBAR: &[Rule] = &[id(Element), refs(Range(1, 2), Node)];
const CONM: &[Rule] = &[id(Element), refs(Field(1), Node), refs(Field(2), Coord)];

const PSHELL: &[Rule] = &[
    id(Property),
    refs(Field(1), Material),
    refs(Field(3), Material),
    refs(Field(5), Material),
    refs(Field(10), Material),
];
const PCOMP: &[Rule] = &[
    id(Property),
    refs(
        Groups {
            start: 8,
            width: 4,
            offsets: &[0],
        },
        Material,
    ),
];
const PCOMPG: &[Rule] = &[
    id(Property),
    refs(
        Columns {
            cols: &[1],
            from_line: 1,
        },
        Material,
    ),
];
const PCOMPLS: &[Rule] = &[id(Property), refs(Field(2), Coord)];
const PSOLID: &[Rule] = &[id(Property), refs(Field(1), Material), refs(Field(2), Coord)];
const PROPERTY_MID: &[Rule] = &[id(Property), refs(Field(1), Material)];
const PFAST: &[Rule] = &[id(Property), refs(Field(2), Coord)];
const PROPERTY_ONLY: &[Rule] = &[id(Property)];
const PELAS: &[Rule] = &[id(Property), def(Field(4), Property)];
const PDAMP: &[Rule] = &[def(
    Groups {
        start: 0,
        width: 2,
        offsets: &[0],
    },
    Property,
)];
const PVISC: &[Rule] = &[id(Property), def(Field(3), Property)];
const MATERIAL: &[Rule] = &[id(Material)];

const CORD2: &[Rule] = &[id(Coord), refs(Field(1), Coord)];
const CORD1: &[Rule] = &[
    id(Coord),
    refs(Range(1, 3), Node),
    def(Field(4), Coord),
    refs(Range(5, 7), Node),
];

const SPC: &[Rule] = &[id(SpcSet), refs(Field(1), Node), refs(Field(4), Node)];
const SPC1: &[Rule] = &[id(SpcSet), refs(Tail(2), Node)];
const SPCADD: &[Rule] = &[id(SpcSet), refs(Tail(1), SpcSet)];
const MPC: &[Rule] = &[
    id(MpcSet),
    refs(
        Columns {
            cols: &[1, 4],
            from_line: 0,
        },
        Node,
    ),
];
const MPCADD: &[Rule] = &[id(MpcSet), refs(Tail(1), MpcSet)];

const POINT_LOAD: &[Rule] = &[id(LoadSet), refs(Field(1), Node), refs(Field(2), Coord)];
const PLOAD: &[Rule] = &[id(LoadSet), refs(Range(2, 5), Node)];
const PLOAD2: &[Rule] = &[id(LoadSet), refs(Tail(2), Element)];
const PLOAD4: &[Rule] = &[
    id(LoadSet),
    refs(Field(1), Element),
    refs(Field(6), Node).when(FieldIsNot(6, "THRU")),
    refs(Field(7), Node).when(FieldIsNot(6, "THRU")),
    refs(Field(7), Element).when(FieldIs(6, "THRU")),
    refs(Field(8), Coord),
];
const GRAV: &[Rule] = &[id(LoadSet), refs(Field(1), Coord)];
const TEMP: &[Rule] = &[
    id(LoadSet),
    refs(Field(1), Node),
    refs(Field(3), Node),
    refs(Field(5), Node),
];
const TEMPD: &[Rule] = &[def(
    Groups {
        start: 0,
        width: 2,
        offsets: &[0],
    },
    LoadSet,
)];
const DAREA: &[Rule] = &[id(LoadSet), refs(Field(1), Node), refs(Field(4), Node)];
const LOAD_COMBINATION: &[Rule] = &[
    id(LoadSet),
    refs(
        Groups {
            start: 2,
            width: 2,
            offsets: &[1],
        },
        LoadSet,
    ),
];
const RLOAD: &[Rule] = &[
    id(LoadSet),
    refs(Field(1), LoadSet),
    refs(Field(4), Table),
    refs(Field(5), Table),
];
const TLOAD1: &[Rule] = &[id(LoadSet), refs(Field(1), LoadSet), refs(Field(4), Table)];
const TLOAD2: &[Rule] = &[id(LoadSet), refs(Field(1), LoadSet)];

const BSURF: &[Rule] = &[id(Contact), refs(Tail(1), Element)];
const BSURFS: &[Rule] = &[
    id(Contact),
    refs(
        Groups {
            start: 4,
            width: 4,
            offsets: &[0],
        },
        Element,
    ),
    refs(
        Groups {
            start: 4,
            width: 4,
            offsets: &[1, 2, 3],
        },
        Node,
    ),
];
const BCTSET: &[Rule] = &[
    id(Contact),
    refs(Range(1, 2), Contact),
    refs(
        Columns {
            cols: &[0, 1],
            from_line: 1,
        },
        Contact,
    ),
];
const BCTADD: &[Rule] = &[id(Contact), refs(Tail(1), Contact)];
const BCONP: &[Rule] = &[
    id(Contact),
    refs(Range(1, 2), Contact),
    refs(Field(5), Contact),
    refs(Field(7), Coord),
];
const BCBODY: &[Rule] = &[id(Contact), refs(Field(3), Contact)];
const BLSEG: &[Rule] = &[id(Contact), refs(Tail(1), Node)];
const CONTACT_ONLY: &[Rule] = &[id(Contact)];

const SET1: &[Rule] = &[id(OutputSet), refs_to(Tail(1), Target::Inferred(&[Node, Element]))];
const SET3: &[Rule] = &[
    id(OutputSet),
    refs_to(
        Tail(2),
        Target::Keyword {
            at: 1,
            choices: SET3_KEYWORDS,
        },
    ),
];
const METHOD: &[Rule] = &[id(Method)];
const TABLE: &[Rule] = &[id(Table)];

const SUPORT: &[Rule] = &[refs(
    Groups {
        start: 0,
        width: 2,
        offsets: &[0],
    },
    Node,
)];
const SUPORT1: &[Rule] = &[refs(
    Groups {
        start: 1,
        width: 2,
        offsets: &[0],
    },
    Node,
)];

/// Rewrite rules for a card kind.
pub fn rules_for(kind: CardKind) -> &'static [Rule] {
    use CardKind as K;
    match kind {
        K::Grid => GRID,
        K::Spoint => SPOINT,

        K::Cquad4 | K::Cquadr => CQUAD4,
        K::Ctria3 | K::Ctriar => CTRIA3,
        K::Cquad8 => CQUAD8,
        K::Ctria6 => CTRIA6,
        K::Cshear => CSHEAR,
        K::Chexa | K::Cpenta | K::Ctetra => SOLID,
        K::Cbar => LINE_ELEMENT,
        K::Cbeam => CBEAM,
        K::Crod | K::Cvisc => CROD,
        K::Conrod => CONROD,
        K::Cgap => BUSH_GAP,
        K::Cbush => CBUSH,
        K::Celas1 | K::Cdamp1 | K::Cmass1 => SCALAR_1,
        K::Celas2 | K::Cdamp2 | K::Cmass2 => SCALAR_2,
        K::Celas3 | K::Cdamp3 | K::Cmass3 => SCALAR_3,
        K::Celas4 | K::Cdamp4 | K::Cmass4 => SCALAR_4,
        K::Cweld => CWELD,
        K::Cfast => CFAST,
        K::Plotel => PLOTEL,
        K::Chbdyg => CHBDYG,
        K::Chbdye => CHBDYE,
        K::Rbe2 => RBE2,
        K::Rbe3 => RBE3,
        K::Rbar => RBAR,
        K::Conm1 | K::Conm2 => CONM,

        K::Pshell => PSHELL,
        K::Pcomp => PCOMP,
        K::Pcompg => PCOMPG,
        K::Pcompls => PCOMPLS,
        K::Psolid => PSOLID,
        K::Plsolid
        | K::Pbar
        | K::Pbarl
        | K::Pbeam
        | K::Pbeaml
        | K::Prod
        | K::Pshear
        | K::Pweld => PROPERTY_MID,
        K::Pfast => PFAST,
        K::Pbush | K::Pbusht | K::Pgap => PROPERTY_ONLY,
        K::Pelas => PELAS,
        K::Pdamp => PDAMP,
        K::Pvisc => PVISC,
        K::Mat1 | K::Mat2 | K::Mat8 | K::Mat9 | K::Mat10 => MATERIAL,

        K::Cord2r | K::Cord2c | K::Cord2s => CORD2,
        K::Cord1r | K::Cord1c | K::Cord1s => CORD1,

        K::Spc => SPC,
        K::Spc1 => SPC1,
        K::Spcadd => SPCADD,
        K::Mpc => MPC,
        K::Mpcadd => MPCADD,

        K::Force | K::Moment | K::Rforce => POINT_LOAD,
        K::Pload => PLOAD,
        K::Pload2 => PLOAD2,
        K::Pload4 => PLOAD4,
        K::Grav => GRAV,
        K::Temp => TEMP,
        K::Tempd => TEMPD,
        K::Darea => DAREA,
        K::Load | K::Dload => LOAD_COMBINATION,
        K::Rload1 | K::Rload2 => RLOAD,
        K::Tload1 => TLOAD1,
        K::Tload2 => TLOAD2,

        K::Bsurf => BSURF,
        K::Bsurfs => BSURFS,
        K::Bctset => BCTSET,
        K::Bctadd => BCTADD,
        K::Bconp => BCONP,
        K::Bcbody => BCBODY,
        K::Blseg => BLSEG,
        K::Bctpara | K::Bctparm | K::Bfric => CONTACT_ONLY,

        K::Set1 => SET1,
        K::Set3 => SET3,
        K::Eigrl | K::Eigr => METHOD,
        K::Tabled1 | K::Tablem1 | K::Tabdmp1 => TABLE,

        K::Suport => SUPORT,
        K::Suport1 => SUPORT1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str, fields: &[&str]) -> Card {
        Card::new(name, fields.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn every_keyed_kind_defines_its_primary_id() {
        for kind in CardKind::ALL {
            let Some(ns) = kind.namespace() else {
                continue;
            };
            let c = card(kind.name(), &["7"]);
            assert!(
                definitions(*kind, &c).contains(&(ns, 7)),
                "{kind} does not define its primary ID"
            );
        }
    }

    #[test]
    fn thru_ranges_expand_with_step() {
        let c = card("SPC1", &["1", "123", "10", "THRU", "16", "BY", "3", "40"]);
        assert_eq!(
            tail_tokens(&c, 2),
            vec![
                TailToken::Thru {
                    from: 2,
                    to: 4,
                    by: Some(6)
                },
                TailToken::Value(7)
            ]
        );
        assert_eq!(thru_values(&c, 2, 4, Some(6)), vec![10, 13, 16]);
        assert_eq!(thru_bounds(&c, 2, 4, Some(6)), Some((10, 16, 3)));
    }

    #[test]
    fn thru_bounds_start_at_the_first_positive_value() {
        let c = card("SPC1", &["1", "123", "-5", "THRU", "20", "BY", "4"]);
        assert_eq!(thru_bounds(&c, 2, 4, Some(6)), Some((3, 20, 4)));

        let c = card("SPC1", &["1", "123", "1", "THRU", "99999999999"]);
        assert_eq!(thru_bounds(&c, 2, 4, None), Some((1, u32::MAX, 1)));

        let c = card("SPC1", &["1", "123", "9", "THRU", "4"]);
        assert_eq!(thru_bounds(&c, 2, 4, None), None);
    }

    #[test]
    fn spoint_thru_defines_every_point() {
        let c = card("SPOINT", &["5", "THRU", "8"]);
        let defs: Vec<i64> = definitions(CardKind::Spoint, &c).into_iter().map(|(_, v)| v).collect();
        assert_eq!(defs, vec![5, 6, 7, 8]);
    }

    #[test]
    fn pload4_thru_form_references_an_element() {
        let c = card("PLOAD4", &["3", "10", "1.", "", "", "", "THRU", "12"]);
        let refs = references(CardKind::Pload4, &c, |_, _| true);
        assert_eq!(refs, vec![(Element, 10), (Element, 12)]);

        let c = card("PLOAD4", &["3", "10", "1.", "", "", "", "5", "7"]);
        let refs = references(CardKind::Pload4, &c, |_, _| true);
        assert_eq!(refs, vec![(Element, 10), (Node, 5), (Node, 7)]);
    }

    #[test]
    fn rbe3_skips_weights_and_components() {
        let c = card(
            "RBE3",
            &[
                "1", "", "100", "123456", "1.0", "123", "5", "6", // line 0
                "7", "0.5", "12", "8", "", "", "", "", // line 1
                "UM", "5", "3", "6", "2", "", "", "", // line 2
                "ALPHA", "1.e-5",
            ],
        );
        let positions = WeightedGroups(4).positions(&c);
        let values = ids_at(&c, &positions);
        assert_eq!(values, vec![5, 6, 7, 8, 5, 6]);
    }

    #[test]
    fn set1_target_is_inferred_from_existing_ids() {
        let c = card("SET1", &["9", "1", "2", "3"]);
        let elements = [2u32, 3];
        let refs = references(CardKind::Set1, &c, |ns, v| ns == Element && elements.contains(&v));
        assert!(refs.iter().all(|(ns, _)| *ns == Element));

        let refs = references(CardKind::Set1, &c, |_, _| false);
        assert!(refs.iter().all(|(ns, _)| *ns == Node));
    }

    #[test]
    fn set3_target_follows_keyword() {
        let c = card("SET3", &["1", "PROP", "20", "21"]);
        let refs = references(CardKind::Set3, &c, |_, _| true);
        assert_eq!(refs, vec![(Property, 20), (Property, 21)]);
    }

    #[test]
    fn cfast_type_decides_what_ida_and_idb_are() {
        let c = card("CFAST", &["10", "1", "PROP", "2", "3", "4", "5", "6"]);
        let refs = references(CardKind::Cfast, &c, |_, _| true);
        assert_eq!(
            refs,
            vec![(Property, 1), (Property, 2), (Property, 3), (Node, 4), (Node, 5), (Node, 6)]
        );

        let c = card("CFAST", &["10", "1", "elem", "20", "21"]);
        let refs = references(CardKind::Cfast, &c, |_, _| true);
        assert_eq!(refs, vec![(Property, 1), (Element, 20), (Element, 21)]);
    }

    #[test]
    fn cweld_gridid_patch_lists_are_nodes() {
        let c = card(
            "CWELD",
            &["1", "2", "3", "GRIDID", "", "", "", "", "Q4", "11", "12", "13", "14"],
        );
        let refs = references(CardKind::Cweld, &c, |_, _| true);
        assert_eq!(
            refs,
            vec![(Property, 2), (Node, 3), (Node, 11), (Node, 12), (Node, 13), (Node, 14)]
        );
    }

    #[test]
    fn pcomp_plies_reference_materials() {
        let c = card(
            "PCOMP",
            &[
                "5", "", "", "", "", "", "", "", // header
                "11", ".1", "0.", "YES", "12", ".1", "45.", "YES",
            ],
        );
        let refs = references(CardKind::Pcomp, &c, |_, _| true);
        assert_eq!(refs, vec![(Material, 11), (Material, 12)]);
    }

    #[test]
    fn suport_leading_field_is_a_node() {
        let c = card("SUPORT", &["12", "123456"]);
        assert_eq!(field0_namespace(CardKind::Suport, &c), Some(Node));
        assert!(definitions(CardKind::Suport, &c).is_empty());
    }

    #[test]
    fn cord1_defines_two_systems() {
        let c = card("CORD1R", &["3", "1", "2", "4", "5", "6", "7", "8"]);
        let defs = definitions(CardKind::Cord1r, &c);
        assert_eq!(defs, vec![(Coord, 3), (Coord, 5)]);
    }
}
