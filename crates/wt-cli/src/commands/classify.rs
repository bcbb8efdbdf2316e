//! Show how a URL would be accounted.

use std::io::Write;

use anyhow::Result;

use wt_core::{RuleSet, domain_from_url};

pub fn run<W: Write>(writer: &mut W, rules: &RuleSet, url: &str) -> Result<()> {
    match domain_from_url(url) {
        Some(domain) => writeln!(writer, "{domain}: {}", rules.classify(&domain))?,
        None => writeln!(writer, "{url}: not tracked (no web domain)")?,
    }
    Ok(())
}
