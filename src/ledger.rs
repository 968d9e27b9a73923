//! Append-only JSONL ledger that doubles as the resumption checkpoint.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::util::ensure_parent_directory;

pub const GENERATION_IDENTITY_FIELD: &str = "video_id";
pub const EVALUATION_IDENTITY_FIELD: &str = "question";

pub trait Identified {
    fn identity(&self) -> &str;
}

/// Collects the identity of every parseable ledger line.
///
/// Lines that are not JSON objects, or that lack the identity field, are
/// ignored so that a torn trailing line never blocks resumption.
pub fn load_completed_ids(path: &Path, identity_field: &str) -> Result<HashSet<String>> {
    let mut completed = HashSet::new();
    if !path.exists() {
        return Ok(completed);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read ledger: {}", path.display()))?;

    for line in raw.lines() {
        let Ok(Value::Object(record)) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if let Some(identity) = record.get(identity_field).and_then(identity_string) {
            completed.insert(identity);
        }
    }

    Ok(completed)
}

pub fn filter_pending<'a, T, I>(
    units: I,
    completed: &'a HashSet<String>,
) -> impl Iterator<Item = T> + 'a
where
    T: Identified,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
{
    units
        .into_iter()
        .filter(move |unit| !completed.contains(unit.identity()))
}

pub fn identity_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct LedgerScan {
    pub records: Vec<Map<String, Value>>,
    pub malformed_lines: usize,
}

/// Reads every JSON-object line of a ledger, counting the ones that are not.
pub fn read_records(path: &Path) -> Result<LedgerScan> {
    let mut scan = LedgerScan::default();
    if !path.exists() {
        return Ok(scan);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read ledger: {}", path.display()))?;

    for line in raw.lines().filter(|line| !line.trim().is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => scan.records.push(record),
            _ => scan.malformed_lines += 1,
        }
    }

    Ok(scan)
}

pub struct LedgerWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LedgerWriter {
    pub fn open_append(path: &Path) -> Result<Self> {
        ensure_parent_directory(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open ledger for append: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Opens the ledger after discarding any previous content.
    pub fn open_truncate(path: &Path) -> Result<Self> {
        ensure_parent_directory(path)?;
        File::create(path)
            .with_context(|| format!("failed to truncate ledger: {}", path.display()))?;
        Self::open_append(path)
    }

    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<()> {
        self.append_batch(std::slice::from_ref(record))
    }

    /// Writes all records as one buffer and flushes, so a unit's records land together.
    pub fn append_batch<T: Serialize>(&mut self, records: &[T]) -> Result<()> {
        let mut buffer = String::new();
        for record in records {
            let line = serde_json::to_string(record).with_context(|| {
                format!("failed to serialize ledger record: {}", self.path.display())
            })?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        self.writer
            .write_all(buffer.as_bytes())
            .with_context(|| format!("failed to append to ledger: {}", self.path.display()))?;
        self.writer
            .flush()
            .with_context(|| format!("failed to flush ledger: {}", self.path.display()))?;

        Ok(())
    }
}
