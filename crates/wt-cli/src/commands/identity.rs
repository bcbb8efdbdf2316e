//! Identity management.

use std::io::Write;

use anyhow::{Context, Result};

use wt_core::Identity;
use wt_db::Database;

pub fn show<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    match db.identity()? {
        Some(identity) => writeln!(writer, "{identity}")?,
        None => writeln!(writer, "(not set)")?,
    }
    Ok(())
}

pub fn set<W: Write>(writer: &mut W, db: &Database, raw: &str) -> Result<()> {
    let identity = Identity::new(raw).context("invalid identity")?;
    db.set_identity(&identity)?;
    tracing::info!(%identity, "identity saved");
    writeln!(writer, "Identity set to {identity}.")?;
    Ok(())
}
