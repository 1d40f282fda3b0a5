//! Verb commands as typed on the command line or in a script.
//!
//! ```text
//! read <path>
//! write <path> <json>
//! create <path> <json>
//! delete <path>
//! invoke <path> [json...]
//! sleep <ms>
//! ```

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::time::Duration;

/// One verb with its target and payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Read at a path
    Read(String),
    /// Write a value at a path
    Write(String, Value),
    /// Create an element at a path
    Create(String, Value),
    /// Delete at a path
    Delete(String),
    /// Invoke an operation with positional arguments
    Invoke(String, Vec<Value>),
    /// Pause a script
    Sleep(Duration),
}

impl Command {
    /// Parse one script line. Blank lines and `#` comments yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let (verb, rest) = split_word(line);
        let (target, payload) = split_word(rest);
        Self::build(verb, target, payload).map(Some)
    }

    /// Parse a command from command-line words.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let Some((verb, rest)) = args.split_first() else {
            bail!("Missing command");
        };
        let target = rest.first().map(String::as_str).unwrap_or_default();
        let payload = rest.get(1..).unwrap_or_default().join(" ");
        Self::build(verb, target, &payload)
    }

    fn build(verb: &str, target: &str, payload: &str) -> Result<Self> {
        let target = target.to_string();
        let command = match verb {
            "read" => Command::Read(target),
            "write" => Command::Write(target, single_json(payload)?),
            "create" => Command::Create(target, single_json(payload)?),
            "delete" => Command::Delete(target),
            "invoke" => Command::Invoke(target, json_values(payload)?),
            "sleep" => {
                let ms: u64 = target
                    .parse()
                    .with_context(|| format!("Invalid sleep duration '{target}'"))?;
                Command::Sleep(Duration::from_millis(ms))
            }
            other => bail!("Unknown verb: {other}"),
        };
        Ok(command)
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

/// Any number of whitespace-separated JSON values.
fn json_values(payload: &str) -> Result<Vec<Value>> {
    serde_json::Deserializer::from_str(payload)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .with_context(|| format!("Invalid JSON arguments: {payload}"))
}

fn single_json(payload: &str) -> Result<Value> {
    let mut values = json_values(payload)?;
    if values.len() != 1 {
        bail!("Expected exactly one JSON value, got {}", values.len());
    }
    Ok(values.remove(0))
}
