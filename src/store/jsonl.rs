//! JSON-lines sample store
//!
//! One `PairedRecord` per line. Opening the file scans it once and builds a
//! `label -> byte offsets` index; queries then seek straight to the matching
//! lines and decode them lazily. Appends are written and flushed one record
//! at a time so an interrupted collection keeps every completed record.

use super::{RecordIter, SampleStore};
use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::PairedRecord,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Just enough of a record to index it
#[derive(Deserialize)]
struct LabelOnly {
    test_label: String,
}

/// Append-only JSON-lines file with an in-memory label index
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    file: File,
    index: HashMap<String, Vec<u64>>,
    end_offset: u64,
    read_only: bool,
}

impl JsonLinesStore {
    /// Open an existing store or create an empty one.
    ///
    /// A trailing partial line left by a killed writer is cut off so the
    /// next append starts on a clean line; any other undecodable line is an
    /// error.
    pub fn open_or_create(path: impl AsRef<Path>, logger: &Logger) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let logger = logger.named("STORE");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| AppError::storage(format!("Failed to create store directory '{}': {}", parent.display(), e)))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .map_err(|e| AppError::storage(format!("Failed to open store '{}': {}", path.display(), e)))?;

        let (index, end_offset) = Self::build_index(&path, &file, true, &logger)?;

        logger.debug("Opened sample store")
            .field("path", path.display().to_string())
            .field("labels", index.len())
            .field("bytes", end_offset)
            .log();

        Ok(Self {
            path,
            file,
            index,
            end_offset,
            read_only: false,
        })
    }

    /// Open an existing store for reading only.
    ///
    /// Nothing on disk is created or modified: a missing file is a
    /// `Storage` error and a partial trailing line is skipped, not cut off.
    /// `append` on the returned store fails.
    pub fn open_existing(path: impl AsRef<Path>, logger: &Logger) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let logger = logger.named("STORE");

        if !path.is_file() {
            return Err(AppError::storage(format!("No sample store at '{}'", path.display())));
        }

        let file = File::open(&path)
            .map_err(|e| AppError::storage(format!("Failed to open store '{}': {}", path.display(), e)))?;
        let (index, end_offset) = Self::build_index(&path, &file, false, &logger)?;

        logger.debug("Opened sample store read-only")
            .field("path", path.display().to_string())
            .field("labels", index.len())
            .log();

        Ok(Self {
            path,
            file,
            index,
            end_offset,
            read_only: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn build_index(path: &Path, file: &File, repair: bool, logger: &Logger) -> Result<(HashMap<String, Vec<u64>>, u64)> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut index: HashMap<String, Vec<u64>> = HashMap::new();
        let mut offset = 0u64;
        let mut line = String::new();
        let mut line_number = 0usize;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)
                .map_err(|e| AppError::storage(format!("Failed to read store '{}': {}", path.display(), e)))?;
            if read == 0 {
                break;
            }
            line_number += 1;

            let complete = line.ends_with('\n');
            let trimmed = line.trim();
            if trimmed.is_empty() {
                offset += read as u64;
                continue;
            }

            // Only the last line can lack its newline
            if !complete {
                if repair {
                    logger.warn("Dropping partial trailing record")
                        .field("path", path.display().to_string())
                        .field("line", line_number)
                        .log();
                    file.set_len(offset)
                        .map_err(|e| AppError::storage(format!("Failed to truncate store '{}': {}", path.display(), e)))?;
                } else {
                    logger.warn("Ignoring partial trailing record")
                        .field("path", path.display().to_string())
                        .field("line", line_number)
                        .log();
                }
                return Ok((index, offset));
            }

            let entry: LabelOnly = serde_json::from_str(trimmed).map_err(|e| {
                AppError::storage(format!("Corrupt record at {}:{}: {}", path.display(), line_number, e))
            })?;
            index.entry(entry.test_label).or_default().push(offset);

            offset += read as u64;
        }

        Ok((index, offset))
    }
}

impl SampleStore for JsonLinesStore {
    fn append(&mut self, record: &PairedRecord) -> Result<()> {
        if self.read_only {
            return Err(AppError::storage(format!("Store '{}' is open read-only", self.path.display())));
        }

        let mut line = serde_json::to_string(record)
            .map_err(|e| AppError::storage(format!("Failed to encode record: {}", e)))?;
        line.push('\n');

        self.file.write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| AppError::storage(format!("Failed to append to '{}': {}", self.path.display(), e)))?;

        self.index.entry(record.test_label.clone()).or_default().push(self.end_offset);
        self.end_offset += line.len() as u64;
        Ok(())
    }

    fn query_by_label(&self, label: &str) -> Result<RecordIter<'_>> {
        let offsets = match self.index.get(label) {
            Some(offsets) => offsets.as_slice(),
            None => return Ok(Box::new(std::iter::empty())),
        };

        let file = File::open(&self.path)
            .map_err(|e| AppError::storage(format!("Failed to open store '{}': {}", self.path.display(), e)))?;

        Ok(Box::new(LabelCursor {
            path: &self.path,
            reader: BufReader::new(file),
            offsets: offsets.iter(),
            position: 0,
            line: String::new(),
        }))
    }

    fn labels(&self) -> BTreeMap<String, usize> {
        self.index
            .iter()
            .map(|(label, offsets)| (label.clone(), offsets.len()))
            .collect()
    }

    fn count(&self, label: &str) -> usize {
        self.index.get(label).map_or(0, Vec::len)
    }
}

/// Reads the indexed lines of one label, in file order
struct LabelCursor<'a> {
    path: &'a Path,
    reader: BufReader<File>,
    offsets: std::slice::Iter<'a, u64>,
    position: u64,
    line: String,
}

impl LabelCursor<'_> {
    fn read_at(&mut self, offset: u64) -> Result<PairedRecord> {
        if offset != self.position {
            self.reader.seek(SeekFrom::Start(offset))?;
        }

        self.line.clear();
        let read = self.reader.read_line(&mut self.line)
            .map_err(|e| AppError::storage(format!("Failed to read '{}': {}", self.path.display(), e)))?;
        self.position = offset + read as u64;

        serde_json::from_str(self.line.trim_end())
            .map_err(|e| AppError::storage(format!("Corrupt record at byte {} of '{}': {}", offset, self.path.display(), e)))
    }
}

impl Iterator for LabelCursor<'_> {
    type Item = Result<PairedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = *self.offsets.next()?;
        Some(self.read_at(offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.offsets.size_hint()
    }
}
