use tsvault_core::commands::{self, backup::BackupReport, backup::UploadStatus};
use tsvault_core::config::TsvaultConfig;
use tsvault_core::engine::pg::PgTools;
use tsvault_core::hooks::{self, HookContext};
use tsvault_core::joblog::{Component, Outcome};
use tsvault_core::storage;
use tsvault_core::tier::Tier;

use crate::dispatch::record_outcome;
use crate::format::format_bytes;
use crate::signal::SHUTDOWN;
use crate::table::{add_kv_row, CliTableTheme};

pub(crate) fn run_backup(config: &TsvaultConfig, tier: Tier) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = HookContext::new("backup", &config.database.name);
    ctx.tier = Some(tier.to_string());

    let result = hooks::run_with_hooks(&config.hooks, &mut ctx, |ctx| {
        let engine = PgTools::from_config(config)?;
        let uploader = storage::uploader_from_config(&config.upload)?;
        let report =
            commands::backup::run(config, &engine, uploader.as_deref(), tier, Some(&SHUTDOWN))?;
        ctx.archive = Some(report.archive.display().to_string());
        Ok(report)
    });

    match &result {
        Ok(report) => record_outcome(
            config,
            Component::Backup,
            Outcome::Success,
            &format!(
                "{tier} backup {} ({})",
                report.archive.display(),
                format_bytes(report.metadata.archive_size_bytes)
            ),
        ),
        Err(e) => record_outcome(
            config,
            Component::Backup,
            Outcome::Failure,
            &format!("{tier} backup: {e}"),
        ),
    }

    print_report(&result?);
    Ok(())
}

fn print_report(report: &BackupReport) {
    let theme = CliTableTheme::detect();
    let meta = &report.metadata;
    let mut table = theme.new_kv_table();

    add_kv_row(&mut table, theme, "Archive", report.archive.display());
    add_kv_row(&mut table, theme, "Tier", report.tier);
    add_kv_row(&mut table, theme, "Size", format_bytes(meta.archive_size_bytes));
    add_kv_row(&mut table, theme, "Duration", format!("{:.1}s", meta.duration_secs));
    add_kv_row(&mut table, theme, "Verification", meta.verification.as_str());
    add_kv_row(
        &mut table,
        theme,
        "Tables",
        format!(
            "{} ({} hypertables)",
            count_or_dash(meta.stats.table_count),
            count_or_dash(meta.stats.hypertable_count)
        ),
    );
    if let Some(version) = &meta.stats.timescaledb_version {
        add_kv_row(&mut table, theme, "TimescaleDB", version);
    }

    let prune = &report.prune;
    let mut pruned = format!(
        "{} deleted, {} kept, {} freed",
        prune.deleted.len(),
        prune.kept,
        format_bytes(prune.bytes_freed)
    );
    if prune.failures > 0 {
        pruned.push_str(&format!(", {} failed", prune.failures));
    }
    add_kv_row(&mut table, theme, "Pruned", pruned);

    let upload = match &report.upload {
        UploadStatus::NotConfigured => "not configured".to_string(),
        UploadStatus::Uploaded(dest) => format!("uploaded to {dest}"),
        UploadStatus::Failed(reason) => format!("FAILED: {reason}"),
    };
    add_kv_row(&mut table, theme, "Upload", upload);

    println!("{table}");
}

fn count_or_dash(n: Option<u64>) -> String {
    n.map_or_else(|| "-".to_string(), |n| n.to_string())
}
