use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

/// One producer event from an `apply` stream.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Event {
    pub op: Op,
    pub group: String,
    pub object: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Write,
    Delete,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

/// Open `path` for reading, or stdin when it is absent or `-`.
pub fn open(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match path {
        None => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(p) if p == Path::new("-") => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(p) => {
            let file = File::open(p).with_context(|| format!("failed to open {}", p.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Read a single YAML or JSON document.
pub fn read_document(mut reader: impl Read) -> anyhow::Result<Value> {
    let mut raw = String::new();
    reader
        .read_to_string(&mut raw)
        .context("failed to read document")?;
    serde_yaml::from_str(&raw).context("failed to parse document")
}

/// Parse one line of an event stream. Blank lines yield `None`.
pub fn parse_event(line: &str) -> anyhow::Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str(line).context("malformed event")?;
    Ok(Some(event))
}
