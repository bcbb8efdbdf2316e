//! Shared utilities for CLI commands.

use std::io::Write;

use wt_core::Buckets;

/// Formats milliseconds as `Xh Ym Zs`, truncating to whole seconds.
pub fn format_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

/// Writes one line per domain, largest total first.
pub fn write_buckets<W: Write>(
    writer: &mut W,
    buckets: &Buckets,
    indent: &str,
) -> std::io::Result<()> {
    for (domain, bucket) in buckets.by_total_desc() {
        writeln!(
            writer,
            "{indent}{domain}: Total {} | Prod: {} | Unprod: {}",
            format_time(bucket.total),
            format_time(bucket.productive),
            format_time(bucket.unproductive),
        )?;
    }
    Ok(())
}
