//! # Row Streaming
//!
//! Reads a JSONL dataset through ranged reads of `chunk_size` bytes, so memory
//! stays proportional to one chunk plus the longest line regardless of dataset
//! size. Blank lines are not rows.

use crate::error::{TriageError, TriageResult};
use crate::models::Record;
use crate::storage::ObjectStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Upper bound on rows reserved up front; larger ranges grow on demand
const MAX_PREALLOCATED_ROWS: u64 = 4096;

pub struct RowStream {
    store: Arc<dyn ObjectStore>,
    path: String,
    chunk_size: u64,
    size: u64,
    offset: u64,
    buffer: Vec<u8>,
    cursor: usize,
    rows_read: u64,
}

impl RowStream {
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        path: &str,
        chunk_size: u64,
    ) -> TriageResult<Self> {
        if chunk_size == 0 {
            return Err(TriageError::validation("chunk_size must be greater than 0"));
        }
        let size = match store.size(path).await {
            Ok(size) => size,
            Err(e) if e.is_not_found() => {
                return Err(TriageError::not_found(format!("dataset object '{path}'")))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            store,
            path: path.to_string(),
            chunk_size,
            size,
            offset: 0,
            buffer: Vec::new(),
            cursor: 0,
            rows_read: 0,
        })
    }

    /// Index the next call to [`RowStream::next_row`] will return
    pub fn position(&self) -> u64 {
        self.rows_read
    }

    async fn next_line(&mut self) -> TriageResult<Option<Vec<u8>>> {
        loop {
            if let Some(newline) = self.buffer[self.cursor..].iter().position(|b| *b == b'\n') {
                let end = self.cursor + newline;
                let line = self.buffer[self.cursor..end].to_vec();
                self.cursor = end + 1;
                return Ok(Some(line));
            }

            if self.offset >= self.size {
                if self.cursor < self.buffer.len() {
                    let line = self.buffer[self.cursor..].to_vec();
                    self.cursor = self.buffer.len();
                    return Ok(Some(line));
                }
                return Ok(None);
            }

            self.buffer.drain(..self.cursor);
            self.cursor = 0;
            let end = (self.offset + self.chunk_size).min(self.size);
            let chunk = self.store.get_range(&self.path, self.offset, end).await?;
            if chunk.is_empty() {
                // Object shrank underneath us
                self.size = self.offset;
                continue;
            }
            self.offset += chunk.len() as u64;
            self.buffer.extend_from_slice(&chunk);
        }
    }

    /// Raw bytes of the next non-blank row
    pub async fn next_row(&mut self) -> TriageResult<Option<Vec<u8>>> {
        while let Some(mut line) = self.next_line().await? {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            self.rows_read += 1;
            return Ok(Some(line));
        }
        Ok(None)
    }

    /// Parsed records for rows `[start_row, end_row)`; rows before `start_row` are skipped unparsed
    pub async fn read_rows(&mut self, start_row: u64, end_row: u64) -> TriageResult<Vec<Record>> {
        let expected = end_row.saturating_sub(start_row).min(MAX_PREALLOCATED_ROWS);
        let mut records = Vec::with_capacity(expected as usize);
        while self.position() < end_row {
            let index = self.position();
            let Some(line) = self.next_row().await? else {
                break;
            };
            if index < start_row {
                continue;
            }
            let record = Record::parse_line(&line).map_err(|e| {
                TriageError::validation(format!("{} row {index}: {e}", self.path))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Row count and field-name union of a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetProfile {
    pub num_rows: u64,
    pub features: Vec<String>,
}

/// Stream a whole dataset once, validating every row
pub async fn profile_dataset(
    store: Arc<dyn ObjectStore>,
    path: &str,
    chunk_size: u64,
) -> TriageResult<DatasetProfile> {
    let mut stream = RowStream::open(store, path, chunk_size).await?;
    let mut features = BTreeSet::new();
    while let Some(line) = stream.next_row().await? {
        let record = Record::parse_line(&line).map_err(|e| {
            TriageError::validation(format!("{path} row {}: {e}", stream.position() - 1))
        })?;
        features.extend(record.field_names().map(str::to_string));
    }
    Ok(DatasetProfile {
        num_rows: stream.position(),
        features: features.into_iter().collect(),
    })
}
