use std::time::SystemTime;

use comfy_table::Cell;
use tsvault_core::commands::{self, report::Report};
use tsvault_core::config::TsvaultConfig;
use tsvault_core::joblog::Outcome;

use crate::format::{format_age, format_bytes, format_time};
use crate::table::{add_kv_row, CliTableTheme};

/// Print the summary. Never fails the process: a read error is shown in
/// place of the report.
pub(crate) fn run_report(config: &TsvaultConfig, lines: usize) {
    match commands::report::run(config, lines) {
        Ok(report) => print_report(&report, SystemTime::now()),
        Err(e) => eprintln!("Error: cannot read backup tree: {e}"),
    }
}

/// Shown when no usable configuration exists.
pub(crate) fn print_unconfigured(reason: &str) {
    println!("unconfigured: {reason}");
}

fn print_report(report: &Report, now: SystemTime) {
    let theme = CliTableTheme::detect();

    let mut summary = theme.new_kv_table();
    add_kv_row(&mut summary, theme, "Backup root", report.root.display());
    let disk = match &report.disk {
        Some(d) => format!(
            "{}% used ({} free of {})",
            d.used_percent(),
            format_bytes(d.available_bytes),
            format_bytes(d.total_bytes)
        ),
        None => "unavailable".to_string(),
    };
    add_kv_row(&mut summary, theme, "Disk", disk);
    add_kv_row(&mut summary, theme, "Archives", report.total_archives());
    println!("{summary}");
    println!();

    let mut tiers = theme.new_data_table(&["Tier", "Archives", "Size", "Newest", "Age", "Partial"]);
    for tier in &report.tiers {
        let (newest, age) = match &tier.newest {
            Some(entry) => (
                format!("{} ({})", entry.file_name(), format_time(entry.modified)),
                format_age(entry.modified, now),
            ),
            None => ("no backups found".to_string(), "-".to_string()),
        };
        tiers.add_row(vec![
            Cell::new(tier.tier),
            Cell::new(tier.count),
            Cell::new(format_bytes(tier.total_bytes)),
            Cell::new(newest),
            Cell::new(age),
            Cell::new(tier.partials),
        ]);
    }
    println!("{tiers}");
    println!();

    let Some(last) = &report.last_run else {
        println!("Last backup run: no backup log found");
        return;
    };
    match &last.outcome {
        Some((outcome, line)) => {
            let label = match outcome {
                Outcome::Success => "succeeded",
                Outcome::Failure => "FAILED",
            };
            println!("Last backup run: {label}");
            println!("  {line}");
        }
        None => println!("Last backup run: no outcome recorded (still running or interrupted)"),
    }
    if !last.tail.is_empty() {
        println!();
        println!("--- {} (last {} lines) ---", last.log.display(), last.tail.len());
        for line in &last.tail {
            println!("{line}");
        }
    }
}
