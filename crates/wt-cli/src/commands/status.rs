//! Status command for showing stored settings and undelivered time.
//!
//! Live accumulator state belongs to the running daemon; send it a `query`
//! host event to see it. This command only reads the local store.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use wt_core::{BufferKey, Buckets, Identity};
use wt_db::Database;

use super::util::write_buckets;

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    database: &'a Path,
    identity: Option<Identity>,
    productive_rules: usize,
    unproductive_rules: usize,
    buffered: Vec<BufferedOutput>,
}

#[derive(Debug, Serialize)]
struct BufferedOutput {
    /// Identity token, or `None` for data accrued before any identity.
    owner: Option<String>,
    updated_at: String,
    buckets: Buckets,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    database_path: &Path,
    json: bool,
) -> Result<()> {
    let rules = db.rules()?;
    let status = StatusOutput {
        database: database_path,
        identity: db.identity()?,
        productive_rules: rules.productive().len(),
        unproductive_rules: rules.unproductive().len(),
        buffered: db
            .buffered_entries()?
            .into_iter()
            .map(|entry| BufferedOutput {
                owner: match entry.key {
                    BufferKey::Unkeyed => None,
                    BufferKey::Identity(identity) => Some(identity.to_string()),
                },
                updated_at: entry.updated_at,
                buckets: entry.buckets,
            })
            .collect(),
    };

    if json {
        serde_json::to_writer_pretty(&mut *writer, &status)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "Web time tracker status")?;
    writeln!(writer, "Database: {}", status.database.display())?;
    match &status.identity {
        Some(identity) => writeln!(writer, "Identity: {identity}")?,
        None => writeln!(writer, "Identity: (not set, time is buffered locally)")?,
    }
    writeln!(
        writer,
        "Rules: {} productive, {} unproductive",
        status.productive_rules, status.unproductive_rules
    )?;

    if status.buffered.is_empty() {
        writeln!(writer, "No undelivered time.")?;
        return Ok(());
    }

    writeln!(writer, "Undelivered time:")?;
    for entry in &status.buffered {
        let owner = entry.owner.as_deref().unwrap_or("(no identity)");
        writeln!(writer, "- {owner} (last buffered {})", entry.updated_at)?;
        write_buckets(writer, &entry.buckets, "    ")?;
    }

    Ok(())
}
