//! JSON Lines input: one `{"id", "vector", "metadata"}` object per line.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use newsvec_core::IngestRecord;

pub struct JsonlReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonlReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(JsonlReader {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// Next record, skipping blank lines.
    pub fn next_record(&mut self) -> Result<Option<IngestRecord>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("reading {}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).with_context(|| {
                format!("{}:{}: malformed record", self.path.display(), self.line_no)
            })?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    /// Up to `size` records; empty at end of input.
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<IngestRecord>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next_record()? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// Vectors of the first `limit` records, for codec training.
pub fn read_sample(path: &Path, limit: usize) -> Result<Vec<Vec<f32>>> {
    let mut reader = JsonlReader::open(path)?;
    let mut sample = Vec::new();
    while sample.len() < limit {
        match reader.next_record()? {
            Some(record) => sample.push(record.vector),
            None => break,
        }
    }
    Ok(sample)
}

/// Parse `0.1,0.2,...` into a vector.
pub fn parse_csv_vector(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(|component| {
            component
                .trim()
                .parse::<f32>()
                .with_context(|| format!("invalid vector component '{}'", component.trim()))
        })
        .collect()
}
