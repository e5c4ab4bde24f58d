//! bdfnum CLI
//!
//! Renumber the IDs of a Nastran deck split across `INCLUDE` files so that
//! each file's IDs fall in a range chosen for that file:
//! - `scan`: show the include tree and the IDs each file defines
//! - `suggest`: propose non-overlapping per-file spans
//! - `plan` / `validate`: build and check a range plan, saved as a snapshot
//! - `apply`: renumber and write the deck to a new directory

use anyhow::{anyhow, bail, Context, Result};
use bdfnum_deck::{Namespace, ReadOptions};
use bdfnum_engine::snapshot::RangeSnapshot;
use bdfnum_engine::{suggest_ranges, IdRange, RangeRequest, RenumberRun, RunStatus};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

mod output;

#[derive(Parser)]
#[command(name = "bdfnum")]
#[command(author, version, about = "Include-aware ID renumbering for Nastran decks")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DeckArgs {
    /// Main deck file; `INCLUDE` paths resolve from its directory
    root: PathBuf,

    /// Card names to leave unparsed and write back unchanged (repeatable)
    #[arg(long = "disable", value_name = "CARD")]
    disable: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the include tree with per-file ID counts and bounds
    Scan {
        #[command(flatten)]
        deck: DeckArgs,
        /// Print JSON instead of the tree
        #[arg(long)]
        json: bool,
    },

    /// Propose one span per file, packed upward from `--start`
    Suggest {
        #[command(flatten)]
        deck: DeckArgs,
        #[arg(long, default_value_t = 1)]
        start: u32,
        /// Keep SPC, MPC and load set IDs as they are
        #[arg(long)]
        skip_set_ids: bool,
        /// Save the suggestion as a range snapshot
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Build a range plan from per-file ranges and check it
    Plan {
        #[command(flatten)]
        deck: DeckArgs,
        /// Simple mode span, split evenly across the file's namespaces
        #[arg(long = "range", value_name = "FILE=START:END")]
        ranges: Vec<String>,
        /// Advanced mode range for one namespace of a file
        #[arg(long = "ns-range", value_name = "FILE:NS=START:END")]
        ns_ranges: Vec<String>,
        /// Start from a saved snapshot instead
        #[arg(long, conflicts_with_all = ["ranges", "ns_ranges"])]
        snapshot: Option<PathBuf>,
        #[arg(long)]
        skip_set_ids: bool,
        /// Save the resolved plan as a snapshot (only when it validates)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Check a saved snapshot against the deck without writing anything
    Validate {
        #[command(flatten)]
        deck: DeckArgs,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Renumber the deck and write it under `--out`
    Apply {
        #[command(flatten)]
        deck: DeckArgs,
        #[arg(long)]
        snapshot: PathBuf,
        /// Output directory (must differ from the deck's directory)
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        skip_set_ids: bool,
        /// Fail when the run finishes with warnings
        #[arg(long)]
        deny_warnings: bool,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan { deck, json } => cmd_scan(&deck, json),
        Commands::Suggest {
            deck,
            start,
            skip_set_ids,
            out,
        } => cmd_suggest(&deck, start, skip_set_ids, out.as_deref()),
        Commands::Plan {
            deck,
            ranges,
            ns_ranges,
            snapshot,
            skip_set_ids,
            out,
        } => cmd_plan(&deck, &ranges, &ns_ranges, snapshot.as_deref(), skip_set_ids, out.as_deref()),
        Commands::Validate { deck, snapshot, json } => cmd_validate(&deck, &snapshot, json),
        Commands::Apply {
            deck,
            snapshot,
            out,
            skip_set_ids,
            deny_warnings,
            json,
        } => cmd_apply(&deck, &snapshot, &out, skip_set_ids, deny_warnings, json),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ============================================================================
// Argument parsing
// ============================================================================

/// `FILE=START:END`
fn parse_span_arg(arg: &str) -> Result<(String, IdRange)> {
    let (file, range) = arg
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("expected FILE=START:END, got `{arg}`"))?;
    Ok((file.trim().to_string(), range.parse()?))
}

/// `FILE:NS=START:END`
fn parse_ns_range_arg(arg: &str) -> Result<(String, Namespace, IdRange)> {
    let (lhs, range) = arg
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("expected FILE:NS=START:END, got `{arg}`"))?;
    let (file, ns) = lhs
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected FILE:NS=START:END, got `{arg}`"))?;
    Ok((file.trim().to_string(), ns.parse()?, range.parse()?))
}

fn read_options(deck: &DeckArgs, snapshot: Option<&RangeSnapshot>) -> ReadOptions {
    let from_snapshot = snapshot.into_iter().flat_map(|s| s.disabled_cards.iter().cloned());
    ReadOptions::with_disabled(from_snapshot.chain(deck.disable.iter().cloned()))
}

fn open(deck: &DeckArgs, options: ReadOptions) -> Result<RenumberRun> {
    RenumberRun::open(&deck.root, options).with_context(|| format!("failed to read deck {}", deck.root.display()))
}

fn load_snapshot(path: &Path) -> Result<RangeSnapshot> {
    RangeSnapshot::load(path).with_context(|| format!("failed to load snapshot {}", path.display()))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_scan(deck: &DeckArgs, json: bool) -> Result<()> {
    let run = open(deck, read_options(deck, None))?;
    let discovery = run.discovery();
    let summary = discovery.summary();

    if json {
        let value = serde_json::json!({
            "files": summary,
            "findings": discovery.findings(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        output::print_tree(discovery, &summary);
        for finding in discovery.findings() {
            output::print_finding(finding);
        }
    }
    if discovery.findings().iter().any(|f| f.is_error()) {
        bail!("deck has structural errors");
    }
    Ok(())
}

fn cmd_suggest(deck: &DeckArgs, start: u32, skip_set_ids: bool, out: Option<&Path>) -> Result<()> {
    let run = open(deck, read_options(deck, None))?;
    let discovery = run.discovery();
    let spans = suggest_ranges(discovery, start, skip_set_ids);

    for (file, span) in &spans {
        println!("{}={}:{}", discovery.display_path(*file), span.start, span.end);
    }
    if let Some(out) = out {
        let mut snapshot = RangeSnapshot::from_spans(discovery, &spans, skip_set_ids);
        snapshot.disabled_cards = run.options().disabled.clone();
        snapshot.save(out)?;
        eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    }
    Ok(())
}

fn cmd_plan(
    deck: &DeckArgs,
    ranges: &[String],
    ns_ranges: &[String],
    snapshot: Option<&Path>,
    skip_set_ids: bool,
    out: Option<&Path>,
) -> Result<()> {
    let loaded = snapshot.map(load_snapshot).transpose()?;
    let run = open(deck, read_options(deck, loaded.as_ref()))?;
    let discovery = run.discovery();

    let mut request = match &loaded {
        Some(snapshot) => {
            let (request, findings) = snapshot.to_request(discovery);
            findings.iter().for_each(output::print_finding);
            request
        }
        None if !ranges.is_empty() && !ns_ranges.is_empty() => {
            bail!("use either --range (simple mode) or --ns-range (advanced mode), not both")
        }
        None if !ns_ranges.is_empty() => {
            let mut request = RangeRequest::advanced();
            for arg in ns_ranges {
                let (file, ns, range) = parse_ns_range_arg(arg)?;
                let id = discovery
                    .find_file(&file)
                    .ok_or_else(|| anyhow!("`{file}` is not part of the deck"))?;
                request = request.with_range(id, ns, range);
            }
            request
        }
        None => {
            let mut request = RangeRequest::simple();
            for arg in ranges {
                let (file, range) = parse_span_arg(arg)?;
                let id = discovery
                    .find_file(&file)
                    .ok_or_else(|| anyhow!("`{file}` is not part of the deck"))?;
                request = request.with_span(id, range);
            }
            request
        }
    };
    request.skip_set_ids |= skip_set_ids;

    let pre = run.validate(run.plan(&request));
    output::print_plan(discovery, pre.plan());
    output::print_report(pre.report());
    if !pre.is_clean() {
        bail!("range plan rejected");
    }
    if let Some(out) = out {
        RangeSnapshot::from_plan(discovery, pre.plan(), run.options()).save(out)?;
        eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    }
    Ok(())
}

fn cmd_validate(deck: &DeckArgs, snapshot: &Path, json: bool) -> Result<()> {
    let snapshot = load_snapshot(snapshot)?;
    let run = open(deck, read_options(deck, Some(&snapshot)))?;
    let (request, findings) = snapshot.to_request(run.discovery());

    let pre = run.validate(run.plan(&request));
    let mut report = pre.report().clone();
    report.extend(findings);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
    }
    if report.has_errors() {
        bail!("range plan rejected");
    }
    Ok(())
}

fn cmd_apply(
    deck: &DeckArgs,
    snapshot: &Path,
    out: &Path,
    skip_set_ids: bool,
    deny_warnings: bool,
    json: bool,
) -> Result<()> {
    let mut snapshot = load_snapshot(snapshot)?;
    snapshot.skip_set_ids |= skip_set_ids;
    let options = read_options(deck, Some(&snapshot));
    snapshot.disabled_cards = options.disabled.clone();

    let run = open(deck, options)?;
    let outcome = match run.execute_snapshot(&snapshot, out) {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Some(report) = err.report() {
                if json {
                    println!("{}", serde_json::to_string_pretty(report)?);
                } else {
                    output::print_report(report);
                }
            }
            return Err(err).with_context(|| format!("nothing usable was written to {}", out.display()));
        }
    };

    if json {
        let files: Vec<String> = outcome.files.iter().map(|p| p.display().to_string()).collect();
        let value = serde_json::json!({
            "status": outcome.status,
            "files": files,
            "cards_written": outcome.cards_written,
            "maps": outcome.maps,
            "findings": outcome.report.findings(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        output::print_report(&outcome.report);
        for file in &outcome.files {
            eprintln!("{} {}", "wrote".green().bold(), file.display().to_string().bold());
        }
    }

    match outcome.status {
        RunStatus::Failure => bail!("renumbering failed"),
        RunStatus::SuccessWithWarnings if deny_warnings => {
            bail!("{} warning(s) with --deny-warnings", outcome.report.warnings().count())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_args_split_on_the_last_equals() {
        let (file, range) = parse_span_arg("inc/a=b.bdf=1000:1999").unwrap();
        assert_eq!(file, "inc/a=b.bdf");
        assert_eq!(range, IdRange::new(1000, 1999));
        assert!(parse_span_arg("main.bdf").is_err());
    }

    #[test]
    fn ns_range_args_name_a_namespace() {
        let (file, ns, range) = parse_ns_range_arg("inc/part.bdf:node=1:99").unwrap();
        assert_eq!(file, "inc/part.bdf");
        assert_eq!(ns, Namespace::Node);
        assert_eq!(range, IdRange::new(1, 99));
        assert!(parse_ns_range_arg("inc/part.bdf:nodes?=1:99").is_err());
    }

    #[test]
    fn disabled_cards_merge_snapshot_and_flags() {
        let snapshot = RangeSnapshot {
            disabled_cards: ["BCTPARM".to_string()].into_iter().collect(),
            ..RangeSnapshot::default()
        };
        let deck = DeckArgs {
            root: PathBuf::from("main.bdf"),
            disable: vec!["pload4".to_string()],
        };
        let options = read_options(&deck, Some(&snapshot));
        assert!(options.is_disabled("BCTPARM"));
        assert!(options.is_disabled("PLOAD4"));
    }

    #[test]
    fn suggested_snapshot_feeds_apply() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("model/main.bdf");
        std::fs::create_dir_all(dir.path().join("model/inc")).unwrap();
        std::fs::write(&root, "BEGIN BULK\nGRID,1\nGRID,2\nINCLUDE 'inc/part.bdf'\nENDDATA\n").unwrap();
        std::fs::write(dir.path().join("model/inc/part.bdf"), "GRID,10\n").unwrap();
        let deck = DeckArgs {
            root,
            disable: Vec::new(),
        };

        let snapshot = dir.path().join("ranges.json");
        cmd_suggest(&deck, 1, false, Some(&snapshot)).unwrap();
        let loaded = load_snapshot(&snapshot).unwrap();
        assert_eq!(loaded.files["main.bdf"].span, Some(IdRange::new(1, 2)));
        assert_eq!(loaded.files["inc/part.bdf"].span, Some(IdRange::new(3, 3)));

        let out = dir.path().join("out");
        cmd_apply(&deck, &snapshot, &out, false, false, false).unwrap();
        let written = bdfnum_deck::read_deck(&out.join("main.bdf"), &ReadOptions::default()).unwrap();
        let nodes: Vec<u32> = written
            .table(bdfnum_deck::CardKind::Grid)
            .unwrap()
            .by_id()
            .keys()
            .copied()
            .collect();
        assert_eq!(nodes, vec![1, 2, 3]);
    }
}
