//! Environment resolution for generation jobs.
//!
//! Merges key=value overrides from an external dotenv-style source over the
//! ambient process environment. Resolution never fails: a missing or
//! unreadable source, or a malformed line inside it, degrades to the base
//! environment for that entry.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Resolved environment handed to a job launcher.
pub type JobEnv = HashMap<String, String>;

/// Merge overrides from `source` (a dotenv-style file) over `base`.
///
/// Overrides win. Surrounding quotes are stripped from values, lines without a
/// `key=value` shape are skipped, and an absent source returns `base` as is.
pub fn resolve(base: JobEnv, source: Option<&Path>) -> JobEnv {
    let Some(path) = source else {
        return base;
    };

    match File::open(path) {
        Ok(file) => merge_overrides(base, file),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No job env overrides");
            base
        }
    }
}

/// Resolve against the current process environment.
pub fn resolve_from_process(source: Option<&Path>) -> JobEnv {
    resolve(std::env::vars().collect(), source)
}

/// Merge overrides read from `reader` over `base`.
///
/// Values are taken literally: no `$VAR` expansion, no escape processing and
/// no inline comments. Only one matching pair of surrounding quotes is removed.
pub fn merge_overrides<R: Read>(mut base: JobEnv, reader: R) -> JobEnv {
    for line in BufReader::new(reader).split(b'\n') {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading job env overrides");
                break;
            }
        };

        match parse_line(&String::from_utf8_lossy(&line)) {
            Some((key, value)) => {
                base.insert(key.to_string(), value.to_string());
            }
            None => tracing::trace!("Skipping env line without key=value"),
        }
    }
    base
}

/// `KEY=VALUE`, optionally prefixed with `export`. Blank and `#` lines yield `None`.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    Some((key, strip_quotes(value.trim())))
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
