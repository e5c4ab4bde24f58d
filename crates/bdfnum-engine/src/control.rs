//! Case control renumbering.
//!
//! Case control entries look like `NAME[(qualifiers)] = value`. Entries that
//! select a bulk data set by ID (`LOAD = 10`, `SPC = 2`, `METHOD = 1`, …) are
//! rewritten through the union map of their namespace; everything else is
//! left as written.

use crate::plan::IdMapSet;
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::validate::ValidatedPlan;
use bdfnum_deck::{Deck, Namespace};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{opt, recognize},
    sequence::pair,
    IResult,
};

// ============================================================================
// Entry parsing
// ============================================================================

/// A parsed `NAME[(qualifiers)] = value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEntry<'a> {
    pub name: &'a str,
    pub qualifiers: Option<&'a str>,
    /// Integer value text, if the value is a lone integer.
    pub integer: Option<&'a str>,
    /// Byte offset of the value in the line.
    pub value_at: usize,
}

fn parse_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn parse_qualifiers(input: &str) -> IResult<&str, &str> {
    let (input, _) = char('(')(input)?;
    let (input, inner) = take_until(")")(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, inner))
}

fn parse_integer(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(alt((char('+'), char('-')))), digit1))(input)
}

/// Parse one case control entry. Lines without `=` are not entries.
pub fn parse_entry(line: &str) -> Option<ControlEntry<'_>> {
    fn entry(input: &str) -> IResult<&str, (&str, Option<&str>)> {
        let (input, _) = space0(input)?;
        let (input, name) = parse_name(input)?;
        let (input, _) = space0(input)?;
        let (input, qualifiers) = opt(parse_qualifiers)(input)?;
        let (input, _) = space0(input)?;
        let (input, _) = char('=')(input)?;
        let (input, _) = space0(input)?;
        Ok((input, (name, qualifiers)))
    }

    let (rest, (name, qualifiers)) = entry(line).ok()?;
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let value_at = line.len() - rest.len();
    let integer = parse_integer(rest).ok().and_then(|(after, digits)| {
        let after = after.trim_start();
        (after.is_empty() || after.starts_with('$')).then_some(digits)
    });
    Some(ControlEntry {
        name,
        qualifiers,
        integer,
        value_at,
    })
}

/// `SUBCASE n` header.
fn parse_subcase(line: &str) -> Option<&str> {
    fn subcase(input: &str) -> IResult<&str, &str> {
        let (input, _) = space0(input)?;
        let (input, _) = tag_no_case("SUBCASE")(input)?;
        let (input, _) = space1(input)?;
        digit1(input)
    }
    subcase(line).ok().map(|(_, id)| id)
}

/// `SET n = ...` list definition.
fn parse_set(line: &str) -> Option<&str> {
    fn set(input: &str) -> IResult<&str, &str> {
        let (input, _) = space0(input)?;
        let (input, _) = tag_no_case("SET")(input)?;
        let (input, _) = space1(input)?;
        let (input, id) = digit1(input)?;
        let (input, _) = space0(input)?;
        let (input, _) = char('=')(input)?;
        Ok((input, id))
    }
    set(line).ok().map(|(_, id)| id)
}

// ============================================================================
// Keywords
// ============================================================================

/// Case control commands may be abbreviated to their first four letters.
fn keyword_matches(name: &str, keyword: &str) -> bool {
    name == keyword || (name.len() >= 4 && keyword.starts_with(name))
}

const DECLARED: &[(&str, Namespace)] = &[
    ("LOAD", Namespace::LoadSet),
    ("DLOAD", Namespace::LoadSet),
    ("DEFORM", Namespace::LoadSet),
    ("SPC", Namespace::SpcSet),
    ("MPC", Namespace::MpcSet),
    ("METHOD", Namespace::Method),
    ("CMETHOD", Namespace::Method),
    ("SDAMPING", Namespace::Table),
    ("BCSET", Namespace::Contact),
    ("BCONTACT", Namespace::Contact),
];

const TEMPERATURE_SETS: &[&str] = &["LOAD", "INITIAL", "MATERIAL", "BOTH"];

/// Entries that take an integer but do not point into a renumbered namespace.
const NON_REFERENCES: &[&str] = &[
    "TITLE", "SUBTITLE", "LABEL", "ECHO", "ANALYSIS", "SUBCASE", "SUBCOM", "SUBSEQ", "SYMCOM",
    "SYMSEQ", "LINE", "MAXLINES", "PARAM", "OUTPUT", "DISPLACEMENT", "VELOCITY", "ACCELERATION",
    "STRESS", "STRAIN", "FORCE", "ELFORCE", "SPCFORCES", "MPCFORCES", "OLOAD", "GPFORCE", "ESE",
    "EKE", "EDE", "GPSTRESS", "GPKE", "STRFIELD", "SDISPLACEMENT", "SVECTOR", "SVELOCITY",
    "SACCELERATION", "THERMAL", "FLUX", "NLSTRESS", "NLPARM", "BOUTPUT", "SUPORT1", "VECTOR",
    "PRESSURE", "MODALKE", "MODALSE", "ELSUM", "FREQUENCY", "TSTEP", "TSTEPNL", "RANDOM",
    "RESVEC", "K2GG", "M2GG", "B2GG", "P2G", "SEALL", "SUPER", "XYPLOT", "NSM", "MODES",
];

/// Namespace a case control entry selects, if it is a declared reference.
pub fn entry_namespace(name: &str, qualifiers: Option<&str>) -> Option<Namespace> {
    let name = name.to_ascii_uppercase();
    if keyword_matches(&name, "TEMPERATURE") {
        let set = qualifiers.map(|q| q.trim().to_ascii_uppercase());
        return match set.as_deref() {
            None | Some("") => Some(Namespace::LoadSet),
            Some(q) if TEMPERATURE_SETS.iter().any(|t| keyword_matches(q, t)) => Some(Namespace::LoadSet),
            Some(_) => None,
        };
    }
    DECLARED
        .iter()
        .find(|(keyword, _)| keyword_matches(&name, keyword))
        .map(|(_, ns)| *ns)
}

fn is_non_reference(name: &str) -> bool {
    let name = name.to_ascii_uppercase();
    NON_REFERENCES.iter().any(|k| keyword_matches(&name, k))
}

// ============================================================================
// Renumbering
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ControlOutcome {
    pub lines: Vec<String>,
    pub findings: Vec<Finding>,
    pub rewritten: usize,
}

/// Rewrite the case control lines through the plan's union maps.
pub fn renumber_control(lines: &[String], maps: &IdMapSet) -> ControlOutcome {
    let mut outcome = ControlOutcome::default();
    let mut subcase: Option<String> = None;
    let mut in_set = false;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        let continues = trimmed.ends_with(',');

        if in_set || trimmed.is_empty() || trimmed.starts_with('$') {
            in_set = in_set && continues;
            outcome.lines.push(line.clone());
            continue;
        }
        if let Some(id) = parse_subcase(line) {
            subcase = Some(id.to_string());
            outcome.lines.push(line.clone());
            continue;
        }
        let scope = match &subcase {
            Some(id) => format!("subcase {id}"),
            None => "global".to_string(),
        };
        if let Some(id) = parse_set(line) {
            in_set = continues;
            outcome.findings.push(Finding::warning(
                FindingKind::ControlEntry,
                format!("case control SET {id} (line {line_no}, {scope}) is not renumbered; check its contents"),
            ));
            outcome.lines.push(line.clone());
            continue;
        }

        let Some(entry) = parse_entry(line) else {
            outcome.lines.push(line.clone());
            continue;
        };
        let Some(digits) = entry.integer else {
            outcome.lines.push(line.clone());
            continue;
        };

        match entry_namespace(entry.name, entry.qualifiers) {
            Some(ns) => {
                let old = digits.parse::<i64>().ok().filter(|v| *v > 0);
                let Some(old) = old.and_then(|v| u32::try_from(v).ok()) else {
                    outcome.lines.push(line.clone());
                    continue;
                };
                if !maps.request().renumbers(ns) {
                    outcome.lines.push(line.clone());
                    continue;
                }
                match maps.lookup(ns, old) {
                    Some(new) => {
                        let end = entry.value_at + digits.len();
                        outcome
                            .lines
                            .push(format!("{}{}{}", &line[..entry.value_at], new, &line[end..]));
                        if new != old {
                            outcome.rewritten += 1;
                        }
                    }
                    None => {
                        outcome.findings.push(Finding::warning(
                            FindingKind::ControlEntry,
                            format!(
                                "{} = {old} (line {line_no}, {scope}) names no defined {}; left unchanged",
                                entry.name.to_ascii_uppercase(),
                                ns.label()
                            ),
                        ));
                        outcome.lines.push(line.clone());
                    }
                }
            }
            None => {
                if !is_non_reference(entry.name) {
                    outcome.findings.push(Finding::warning(
                        FindingKind::ControlEntry,
                        format!(
                            "{} = {digits} (line {line_no}, {scope}) is not a known set selection; left unchanged",
                            entry.name.to_ascii_uppercase()
                        ),
                    ));
                }
                outcome.lines.push(line.clone());
            }
        }
    }
    outcome
}

/// Renumber the deck's case control in place.
pub fn apply_control(deck: &mut Deck, plan: &ValidatedPlan) -> ValidationReport {
    let outcome = renumber_control(&deck.case_control, plan);
    deck.case_control = outcome.lines;
    tracing::info!(
        rewritten = outcome.rewritten,
        warnings = outcome.findings.len(),
        "renumbered case control"
    );
    let mut report = ValidationReport::new();
    report.extend(outcome.findings);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::scan;
    use crate::plan::{plan, IdRange, RangeRequest};
    use bdfnum_deck::ReadOptions;
    use std::fs;

    fn maps_for(bulk: &str, request: RangeRequest) -> IdMapSet {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.bdf");
        fs::write(&path, bulk).unwrap();
        let discovery = scan(&path, &ReadOptions::default()).unwrap();
        plan(&discovery, &request)
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn parses_entries_with_qualifiers() {
        let entry = parse_entry("  TEMPERATURE(INITIAL) = 7 $ init").unwrap();
        assert_eq!(entry.name, "TEMPERATURE");
        assert_eq!(entry.qualifiers, Some("INITIAL"));
        assert_eq!(entry.integer, Some("7"));
        assert_eq!(entry_namespace(entry.name, entry.qualifiers), Some(Namespace::LoadSet));

        let entry = parse_entry("DISP(PLOT) = ALL").unwrap();
        assert_eq!(entry.integer, None);
        assert!(parse_entry("SUBCASE 1").is_none());
    }

    #[test]
    fn abbreviations_resolve() {
        assert_eq!(entry_namespace("meth", None), Some(Namespace::Method));
        assert_eq!(entry_namespace("SDAMP", None), Some(Namespace::Table));
        assert_eq!(entry_namespace("TEMP", Some("LOAD")), Some(Namespace::LoadSet));
        assert_eq!(entry_namespace("LOADSET", None), None);
        assert_eq!(entry_namespace("SP", None), None);
    }

    #[test]
    fn rewrites_declared_entries_per_subcase() {
        let maps = maps_for(
            "FORCE,10,1\nFORCE,20,1\nSPC1,3,123,1\nEIGRL,5\nGRID,1\n",
            RangeRequest::advanced()
                .with_range(0, Namespace::LoadSet, IdRange::new(100, 199))
                .with_range(0, Namespace::SpcSet, IdRange::new(300, 399))
                .with_range(0, Namespace::Method, IdRange::new(500, 599))
                .with_range(0, Namespace::Node, IdRange::new(1, 9)),
        );
        let input = lines(
            "TITLE = demo\nSPC = 3\nSUBCASE 1\n  LOAD = 10\nSUBCASE 2\n  LOAD=20 $ second\n  METHOD = 5\n  DISP = ALL\n",
        );
        let out = renumber_control(&input, &maps);
        assert_eq!(
            out.lines,
            lines("TITLE = demo\nSPC = 300\nSUBCASE 1\n  LOAD = 100\nSUBCASE 2\n  LOAD=101 $ second\n  METHOD = 500\n  DISP = ALL\n")
        );
        assert_eq!(out.rewritten, 4);
        assert!(out.findings.is_empty());
    }

    #[test]
    fn unknown_entries_and_sets_warn_without_change() {
        let maps = maps_for("GRID,1\n", RangeRequest::simple().with_span(0, IdRange::new(1, 9)));
        let input = lines("SET 1 = 1,2,\n  3,4\nFOOBAR = 12\nSTRESS = 1\nLOAD = 99\n");
        let out = renumber_control(&input, &maps);
        assert_eq!(out.lines, input);
        let kinds: Vec<FindingKind> = out.findings.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FindingKind::ControlEntry; 3]);
        assert!(out.findings[1].message.contains("FOOBAR"));
        assert!(out.findings[2].message.contains("LOAD = 99"));
    }
}
