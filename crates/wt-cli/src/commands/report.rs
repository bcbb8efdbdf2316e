//! Report command for fetching the weekly summary from the collector.

use std::io::Write;

use anyhow::{Context, Result};

use wt_core::Identity;
use wt_sync::{HttpCollector, WeeklyReport};

use super::util::{format_time, write_buckets};

pub async fn run<W: Write>(
    writer: &mut W,
    collector: &HttpCollector,
    identity: &Identity,
    json: bool,
) -> Result<()> {
    let report = collector
        .weekly_report(identity)
        .await
        .context("failed to fetch weekly report")?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
        return Ok(());
    }
    format_report(writer, identity, &report)?;
    Ok(())
}

fn format_report<W: Write>(
    writer: &mut W,
    identity: &Identity,
    report: &WeeklyReport,
) -> std::io::Result<()> {
    writeln!(writer, "Weekly report for {identity}")?;
    writeln!(writer, "Total time tracked: {}", format_time(report.total_time))?;
    writeln!(writer, "Productive time: {}", format_time(report.productive_time))?;
    writeln!(writer, "Unproductive time: {}", format_time(report.unproductive_time))?;
    writeln!(writer, "Neutral time: {}", format_time(report.neutral_time))?;

    if report.website_breakdown.is_empty() {
        writeln!(writer, "No website data for this week.")?;
        return Ok(());
    }
    writeln!(writer, "By website:")?;
    write_buckets(writer, &report.website_breakdown, "  ")
}
