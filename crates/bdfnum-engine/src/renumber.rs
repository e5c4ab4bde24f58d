//! Applying a validated plan to every typed card of a deck.

use crate::plan::IdMapSet;
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::rules::{self, Rule, Slot, TailToken, Target};
use crate::validate::ValidatedPlan;
use bdfnum_deck::{Card, CardKind, Deck, Namespace};
use std::collections::{BTreeMap, BTreeSet};

/// Rewrite every definition and reference slot through the plan, then
/// rebuild each dictionary under the new primary IDs.
///
/// Passthrough cards are left untouched; each passthrough card name yields
/// one UnmappedType Warning.
pub fn apply(deck: &mut Deck, plan: &ValidatedPlan) -> ValidationReport {
    let maps: &IdMapSet = plan;
    let mut rewritten = 0usize;

    for (kind, table) in deck.tables_mut() {
        for card in table.cards_mut() {
            if rewrite_card(kind, card, maps) {
                rewritten += 1;
            }
        }
        table.rekey(kind);
    }

    let mut passthrough: BTreeMap<&str, usize> = BTreeMap::new();
    for card in deck.passthrough() {
        *passthrough.entry(card.name()).or_insert(0) += 1;
    }
    let mut report = ValidationReport::new();
    for (name, count) in passthrough {
        let why = if CardKind::from_name(name).is_some() {
            "disabled"
        } else {
            "not a recognized card type"
        };
        tracing::warn!(card = name, count, "card type passed through without renumbering");
        report.push(Finding::warning(
            FindingKind::UnmappedType,
            format!("{name} ({count} card(s)) is {why}; its IDs were not renumbered"),
        ));
    }

    tracing::info!(cards = deck.len(), rewritten, "renumbered deck");
    report
}

/// Apply every rule of `kind` to one card. Returns true if any field changed.
pub fn rewrite_card(kind: CardKind, card: &mut Card, maps: &IdMapSet) -> bool {
    let mut changed = false;
    for rule in rules::rules_for(kind) {
        if rule.guard.holds(card) {
            changed |= rewrite_slot(rule, card, maps);
        }
    }
    changed
}

fn rewrite_slot(rule: &Rule, card: &mut Card, maps: &IdMapSet) -> bool {
    if let Slot::Tail(start) = rule.slot {
        if rules::has_thru(card, start) {
            return rewrite_thru_tail(rule, start, card, maps);
        }
    }

    let positions = rule.slot.positions(card);
    let values = rules::ids_at(card, &positions);
    let Some(ns) = rule.target.resolve(card, &values, |ns, id| maps.contains_old(ns, id)) else {
        return false;
    };
    let mut changed = false;
    for p in positions {
        if let Some(new) = maps.map_field(ns, card.field(p)) {
            card.set_field(p, new.to_string());
            changed = true;
        }
    }
    changed
}

/// Tails with `a THRU b` ranges: each range is replaced by the mapped values
/// of the IDs it covers that the plan knows about. A range covering no known
/// ID is kept as written.
fn rewrite_thru_tail(rule: &Rule, start: usize, card: &mut Card, maps: &IdMapSet) -> bool {
    let tokens = rules::tail_tokens(card, start);

    // Inference only needs the IDs a candidate namespace actually maps.
    let inferred: &[Namespace] = match rule.target {
        Target::Inferred(candidates) => candidates,
        _ => &[],
    };
    let mut candidates = BTreeSet::new();
    for token in &tokens {
        match *token {
            TailToken::Value(p) => candidates.extend(rules::ids_at(card, &[p])),
            TailToken::Thru { from, to, by } => {
                if let Some((lo, hi, step)) = rules::thru_bounds(card, from, to, by) {
                    for ns in inferred {
                        candidates.extend(maps.known_in(*ns, lo, hi, step).map(|(old, _)| old));
                    }
                }
            }
            TailToken::Word(_) => {}
        }
    }
    let candidates: Vec<u32> = candidates.into_iter().collect();
    let Some(ns) = rule.target.resolve(card, &candidates, |ns, id| maps.contains_old(ns, id)) else {
        return false;
    };
    if !maps.maps_namespace(ns) {
        return false;
    }

    let mut out = Vec::new();
    for token in tokens {
        match token {
            TailToken::Value(p) | TailToken::Word(p) => {
                let text = card.field(p);
                match maps.map_field(ns, text) {
                    Some(new) => out.push(new.to_string()),
                    None => out.push(text.to_string()),
                }
            }
            TailToken::Thru { from, to, by } => {
                let known: Vec<u32> = rules::thru_bounds(card, from, to, by)
                    .map(|(lo, hi, step)| maps.known_in(ns, lo, hi, step).map(|(_, new)| new).collect())
                    .unwrap_or_default();
                if known.is_empty() {
                    out.push(card.field(from).to_string());
                    out.push("THRU".to_string());
                    out.push(card.field(to).to_string());
                    if let Some(step) = by {
                        out.push("BY".to_string());
                        out.push(card.field(step).to_string());
                    }
                } else {
                    out.extend(known.into_iter().map(|v| v.to_string()));
                }
            }
        }
    }
    if card.fields().get(start..) == Some(&out[..]) {
        return false;
    }
    card.replace_tail(start, out);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::scan;
    use crate::plan::{plan, IdRange, RangeRequest};
    use crate::validate::validate;
    use bdfnum_deck::{read_deck, Namespace, ReadOptions};
    use std::fs;

    fn card(name: &str, fields: &[&str]) -> Card {
        Card::new(name, fields.iter().map(|f| f.to_string()).collect())
    }

    /// A plan over an on-disk deck; returns the deck too.
    fn planned(text: &str, request: RangeRequest) -> (Deck, ValidatedPlan) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.bdf");
        fs::write(&path, text).unwrap();
        let options = ReadOptions::default();
        let discovery = scan(&path, &options).unwrap();
        let deck = read_deck(&path, &options).unwrap();
        let validated = validate(&discovery, &deck, plan(&discovery, &request))
            .into_validated()
            .unwrap();
        (deck, validated)
    }

    #[test]
    fn rewrites_definitions_and_references() {
        let (mut deck, plan) = planned(
            "GRID,10\nGRID,20\nCROD,7,3,10,20\nPROD,3,1\nMAT1,1\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(100, 199))
                .with_range(0, Namespace::Element, IdRange::new(500, 599))
                .with_range(0, Namespace::Property, IdRange::new(30, 39))
                .with_range(0, Namespace::Material, IdRange::new(40, 49)),
        );
        let report = apply(&mut deck, &plan);
        assert!(report.is_empty());

        let rods = deck.table(CardKind::Crod).unwrap();
        let rod = &rods.get(500)[0];
        assert_eq!(rod.fields(), &["500", "30", "100", "101"]);
        let grids: Vec<u32> = deck.table(CardKind::Grid).unwrap().by_id().keys().copied().collect();
        assert_eq!(grids, vec![100, 101]);
        assert_eq!(deck.table(CardKind::Prod).unwrap().get(30)[0].field(1), "40");
    }

    #[test]
    fn zero_blank_and_unknown_values_are_left_alone() {
        let (mut deck, plan) = planned(
            "GRID,5,0,1.,2.,3.,\nCBAR,1,9,5,77,,,\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(10, 19))
                .with_range(0, Namespace::Element, IdRange::new(20, 29)),
        );
        apply(&mut deck, &plan);
        let grid = &deck.table(CardKind::Grid).unwrap().get(10)[0];
        assert_eq!(grid.field(1), "0");
        let bar = &deck.table(CardKind::Cbar).unwrap().get(20)[0];
        assert_eq!(bar.field(1), "9");
        assert_eq!(bar.field(2), "10");
        assert_eq!(bar.field(3), "77");
    }

    #[test]
    fn thru_lists_expand_over_known_ids() {
        let (mut deck, plan) = planned(
            "GRID,1\nGRID,2\nGRID,4\nSPC1,3,123,1,THRU,4\nSPC1,3,123,50,THRU,60\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(101, 110))
                .with_range(0, Namespace::SpcSet, IdRange::new(3, 3)),
        );
        apply(&mut deck, &plan);
        let spcs = deck.table(CardKind::Spc1).unwrap().get(3);
        assert_eq!(spcs[0].fields(), &["3", "123", "101", "102", "103"]);
        assert_eq!(spcs[1].fields(), &["3", "123", "50", "THRU", "60"]);
        assert!(!spcs[1].is_modified());
    }

    #[test]
    fn wide_thru_spans_only_visit_mapped_ids() {
        let (mut deck, plan) = planned(
            "GRID,1\nGRID,2\nPLOTEL,20,1,2\nPLOTEL,21,2,1\n\
             SPC1,3,123,1,THRU,99999999\nSET1,9,20,THRU,99999999\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(101, 110))
                .with_range(0, Namespace::Element, IdRange::new(500, 509))
                .with_range(0, Namespace::SpcSet, IdRange::new(3, 3))
                .with_range(0, Namespace::OutputSet, IdRange::new(9, 9)),
        );
        apply(&mut deck, &plan);
        let spc = &deck.table(CardKind::Spc1).unwrap().get(3)[0];
        assert_eq!(spc.fields(), &["3", "123", "101", "102"]);
        let set = &deck.table(CardKind::Set1).unwrap().get(9)[0];
        assert_eq!(set.fields(), &["9", "500", "501"]);
    }

    #[test]
    fn cfast_patch_ids_take_the_namespace_its_type_names() {
        let (mut deck, plan) = planned(
            "GRID,1\nGRID,2\nGRID,3\nPFAST,1\nPSHELL,2\nPSHELL,3\nPLOTEL,20,1,2\nPLOTEL,21,2,3\n\
             CFAST,10,1,PROP,2,3,1,2,3\nCFAST,11,1,ELEM,20,21,1,2,3\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(100, 109))
                .with_range(0, Namespace::Element, IdRange::new(500, 509))
                .with_range(0, Namespace::Property, IdRange::new(150, 159)),
        );
        apply(&mut deck, &plan);
        let fasts = deck.table(CardKind::Cfast).unwrap();
        assert_eq!(
            fasts.get(500)[0].fields(),
            &["500", "150", "PROP", "151", "152", "100", "101", "102"]
        );
        assert_eq!(
            fasts.get(501)[0].fields(),
            &["501", "150", "ELEM", "502", "503", "100", "101", "102"]
        );
    }

    #[test]
    fn cweld_grids_and_patches_follow_the_connection_type() {
        let (mut deck, plan) = planned(
            "GRID,1\nGRID,2\nGRID,3\nPWELD,1\nPSHELL,2\nPSHELL,3\nPLOTEL,20,1,2\nPLOTEL,21,2,3\n\
             CWELD,30,1,1,PARTPAT,2,3\n+,2,3\n\
             CWELD,31,1,1,ELEMID\n+,20,21\n\
             CWELD,32,1,1,GRIDID\n+,QQ,1,2,3\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(100, 109))
                .with_range(0, Namespace::Element, IdRange::new(500, 509))
                .with_range(0, Namespace::Property, IdRange::new(150, 159)),
        );
        apply(&mut deck, &plan);
        let welds = deck.table(CardKind::Cweld).unwrap();
        assert_eq!(
            welds.get(502)[0].fields(),
            &["502", "150", "100", "PARTPAT", "101", "102", "", "", "151", "152"]
        );
        assert_eq!(
            welds.get(503)[0].fields(),
            &["503", "150", "100", "ELEMID", "", "", "", "", "500", "501"]
        );
        assert_eq!(
            welds.get(504)[0].fields(),
            &["504", "150", "100", "GRIDID", "", "", "", "", "QQ", "100", "101", "102"]
        );
    }

    #[test]
    fn cbeam_shear_relief_points_are_nodes() {
        let (mut deck, plan) = planned(
            "GRID,1\nGRID,2\nGRID,3\nGRID,4\nPBEAM,1\n\
             CBEAM,7,1,1,2,0.,1.,0.\n+,,,,,,,,\n+,3,4\nCBAR,8,1,1,2,0.,1.,0.\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(100, 109))
                .with_range(0, Namespace::Element, IdRange::new(70, 79))
                .with_range(0, Namespace::Property, IdRange::new(10, 19)),
        );
        apply(&mut deck, &plan);
        let beam = &deck.table(CardKind::Cbeam).unwrap().get(70)[0];
        assert_eq!(&beam.fields()[..5], &["70", "10", "100", "101", "0."]);
        assert_eq!(&beam.fields()[16..], &["102", "103"]);
        let bar = &deck.table(CardKind::Cbar).unwrap().get(71)[0];
        assert_eq!(&bar.fields()[..4], &["71", "10", "100", "101"]);
    }

    #[test]
    fn cbush_offset_system_is_a_coordinate_reference() {
        let (mut deck, plan) = planned(
            "CORD2R,3,,0.,0.,0.,0.,0.,1.\n+,1.,0.,0.\nGRID,1\nGRID,2\nPBUSH,1\n\
             CBUSH,5,1,1,2,,,,3\n+,0.5,3\nCBUSH,6,1,1,2\n+,0.5,-1\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::Node, IdRange::new(100, 109))
                .with_range(0, Namespace::Element, IdRange::new(50, 59))
                .with_range(0, Namespace::Property, IdRange::new(10, 19))
                .with_range(0, Namespace::Coord, IdRange::new(30, 39)),
        );
        apply(&mut deck, &plan);
        let bushes = deck.table(CardKind::Cbush).unwrap();
        assert_eq!(
            bushes.get(50)[0].fields(),
            &["50", "10", "100", "101", "", "", "", "30", "0.5", "30"]
        );
        assert_eq!(bushes.get(51)[0].field(9), "-1");
    }

    #[test]
    fn passthrough_cards_warn_once_per_name() {
        let (mut deck, plan) = planned(
            "GRID,1\nBCPROPS,1,2\nBCPROPS,3,4\nFOO,1\n",
            RangeRequest::simple().with_span(0, IdRange::new(1, 10)),
        );
        let report = apply(&mut deck, &plan);
        assert_eq!(report.of_kind(FindingKind::UnmappedType).count(), 2);
        assert_eq!(deck.passthrough()[0].render(), vec!["BCPROPS,1,2".to_string()]);
    }

    #[test]
    fn untouched_card_stays_clean() {
        let maps = IdMapSet::default();
        let mut c = card("GRID", &["1", "", "0.", "0.", "0."]);
        assert!(!rewrite_card(CardKind::Grid, &mut c, &maps));
        assert_eq!(c.field(0), "1");
    }
}
