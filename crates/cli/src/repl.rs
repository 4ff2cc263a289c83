//! Line-oriented command shell over an opened store.

use anyhow::Result;
use engine::{handle_lookup, Store};
use std::io::{BufRead, Write};

const USAGE: &str = "Commands: GET key [min_score] | KEYS [prefix] | VERIFY | STATS | EXIT";

/// Reads commands from `input` until EOF or `EXIT`, writing replies to `out`.
pub fn run<R: BufRead, W: Write>(store: &Store, input: R, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "RecoStore ready (build={}, keys={}, records={})",
        store.build_id(),
        store.len(),
        store.records()
    )?;
    writeln!(out, "{}", USAGE)?;
    write!(out, "> ")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "GET" => match parts.next() {
                    Some(key) => match handle_lookup(store, key, parts.next()) {
                        Ok(matches) if matches.is_empty() => writeln!(out, "(empty)")?,
                        Ok(matches) => {
                            for m in &matches {
                                writeln!(out, "{} {}", m.target, m.score)?;
                            }
                        }
                        Err(e) => writeln!(out, "ERR query failed: {}", e)?,
                    },
                    None => writeln!(out, "ERR usage: GET key [min_score]")?,
                },
                "KEYS" => {
                    let keys: Vec<&str> = match parts.next() {
                        Some(prefix) => store.keys_with_prefix(prefix).collect(),
                        None => store.keys().collect(),
                    };
                    if keys.is_empty() {
                        writeln!(out, "(empty)")?;
                    } else {
                        for k in &keys {
                            writeln!(out, "{}", k)?;
                        }
                        writeln!(out, "({} keys)", keys.len())?;
                    }
                }
                "VERIFY" => match store.verify() {
                    Ok(report) if report.is_ok() => writeln!(
                        out,
                        "OK ({} keys, {} records, crc32 {:08x})",
                        report.keys, report.records, report.crc32
                    )?,
                    Ok(report) => {
                        for p in &report.problems {
                            writeln!(out, "ERR {}", p)?;
                        }
                    }
                    Err(e) => writeln!(out, "ERR verify failed: {}", e)?,
                },
                "STATS" => writeln!(out, "{:?}", store)?,
                "EXIT" | "QUIT" => {
                    writeln!(out, "bye")?;
                    break;
                }
                other => writeln!(out, "unknown command: {}", other)?,
            }
        }

        write!(out, "> ")?;
        out.flush()?;
    }

    Ok(())
}
