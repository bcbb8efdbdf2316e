//! Classification rule management.

use std::io::Write;

use anyhow::Result;

use wt_core::RuleSet;
use wt_db::Database;

pub fn show<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let rules = db.rules()?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &rules)?;
        writeln!(writer)?;
        return Ok(());
    }
    write_rules(writer, &rules)?;
    Ok(())
}

/// Replaces both lists. A running daemon applies them on its next poll.
pub fn set<W: Write>(
    writer: &mut W,
    db: &Database,
    productive: &[String],
    unproductive: &[String],
) -> Result<()> {
    let rules = RuleSet::new(productive, unproductive);
    db.set_rules(&rules)?;
    tracing::info!(
        productive = rules.productive().len(),
        unproductive = rules.unproductive().len(),
        "rules saved"
    );
    writeln!(writer, "Rules saved.")?;
    write_rules(writer, &rules)?;
    Ok(())
}

fn write_rules<W: Write>(writer: &mut W, rules: &RuleSet) -> std::io::Result<()> {
    for (label, list) in [
        ("Productive", rules.productive()),
        ("Unproductive", rules.unproductive()),
    ] {
        if list.is_empty() {
            writeln!(writer, "{label}: (none)")?;
        } else {
            let joined: Vec<&str> = list.iter().map(String::as_str).collect();
            writeln!(writer, "{label}: {}", joined.join(", "))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    #[test]
    fn show_starter_rules() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        show(&mut output, &db, false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Productive: developer.mozilla.org, github.com, leetcode.com, stackoverflow.com
        Unproductive: facebook.com, instagram.com, netflix.com, twitter.com, youtube.com
        ");
    }

    #[test]
    fn set_normalizes_and_persists() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        set(
            &mut output,
            &db,
            &[" Docs.RS ".to_string(), String::new()],
            &[],
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Rules saved.
        Productive: docs.rs
        Unproductive: (none)
        ");
        assert_eq!(db.rules().unwrap(), RuleSet::new(["docs.rs"], Vec::<String>::new()));
    }

    #[test]
    fn show_json_round_trips_through_rule_set() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        show(&mut output, &db, true).unwrap();

        let parsed: RuleSet = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed, RuleSet::starter());
    }
}
