//! Terminal rendering of reports, trees and range plans.

use bdfnum_engine::discover::FileSummary;
use bdfnum_engine::{Discovery, Finding, IdMapSet, RunStatus, Severity, ValidationReport};
use colored::Colorize;

pub fn print_finding(finding: &Finding) {
    let tag = match finding.severity {
        Severity::Error => format!("error[{}]", finding.kind).red().bold(),
        Severity::Warning => format!("warning[{}]", finding.kind).yellow().bold(),
    };
    let mut place = String::new();
    if let Some(file) = &finding.file {
        place.push(' ');
        place.push_str(&file.display().to_string());
    }
    match (finding.namespace, finding.id) {
        (Some(ns), Some(id)) => place.push_str(&format!(" ({ns} {id})")),
        (Some(ns), None) => place.push_str(&format!(" ({ns})")),
        (None, Some(id)) => place.push_str(&format!(" (id {id})")),
        (None, None) => {}
    }
    eprintln!("{tag}{}: {}", place.cyan(), finding.message);
}

pub fn print_report(report: &ValidationReport) {
    for finding in report.findings() {
        print_finding(finding);
    }
    let errors = report.errors().count();
    let warnings = report.warnings().count();
    let status = match report.status() {
        RunStatus::Success => "ok".green().bold(),
        RunStatus::SuccessWithWarnings => "ok".yellow().bold(),
        RunStatus::Failure => "failed".red().bold(),
    };
    eprintln!("{status} {errors} error(s), {warnings} warning(s)");
}

/// Include tree, indented by depth, with per-namespace counts and bounds.
pub fn print_tree(discovery: &Discovery, summary: &[FileSummary]) {
    fn walk(discovery: &Discovery, summary: &[FileSummary], id: usize, depth: usize, seen: &mut Vec<usize>) {
        let Some(file) = discovery.file(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let info = &summary[id];
        println!("{indent}{} ({} card(s))", info.path.bold(), info.cards);
        for ns in &info.namespaces {
            println!(
                "{indent}  {} {:>8}  {}..{}",
                format!("{:<10}", ns.namespace.key()).cyan(),
                ns.count,
                ns.min,
                ns.max
            );
        }
        if seen.contains(&id) {
            return;
        }
        seen.push(id);
        for child in &file.children {
            walk(discovery, summary, *child, depth + 1, seen);
        }
    }
    let mut seen = Vec::new();
    walk(discovery, summary, 0, 0, &mut seen);
}

pub fn print_plan(discovery: &Discovery, plan: &IdMapSet) {
    for (file, ns, map) in plan.maps() {
        println!(
            "{} {} {} → {} ({} id(s))",
            "→".cyan(),
            discovery.display_path(file).bold(),
            ns.key(),
            map.range(),
            map.len()
        );
    }
}
