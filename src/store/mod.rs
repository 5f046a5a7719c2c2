//! Persistence of labeled timing records
//!
//! Records are written once and never modified. Collection and analysis run
//! as separate invocations, so a store is either being appended to by one
//! writer or read, never both at once for the same label.

pub mod jsonl;

pub use jsonl::JsonLinesStore;

use crate::{
    error::Result,
    models::PairedRecord,
};
use std::collections::BTreeMap;

/// Lazy, finite sequence of records for one label
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<PairedRecord>> + 'a>;

/// Append-only, label-queryable record storage
pub trait SampleStore {
    /// Persist one complete record
    fn append(&mut self, record: &PairedRecord) -> Result<()>;

    /// Every record whose label equals `label` exactly, in insertion order
    fn query_by_label(&self, label: &str) -> Result<RecordIter<'_>>;

    /// Known labels with their record counts
    fn labels(&self) -> BTreeMap<String, usize>;

    /// Number of records stored under `label`
    fn count(&self, label: &str) -> usize {
        self.labels().get(label).copied().unwrap_or(0)
    }
}

/// In-process store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: Vec<PairedRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, all labels
    pub fn records(&self) -> &[PairedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SampleStore for MemoryStore {
    fn append(&mut self, record: &PairedRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn query_by_label(&self, label: &str) -> Result<RecordIter<'_>> {
        let label = label.to_string();
        Ok(Box::new(
            self.records
                .iter()
                .filter(move |r| r.test_label == label)
                .cloned()
                .map(Ok),
        ))
    }

    fn labels(&self) -> BTreeMap<String, usize> {
        let mut labels = BTreeMap::new();
        for record in &self.records {
            *labels.entry(record.test_label.clone()).or_insert(0) += 1;
        }
        labels
    }
}

/// Forwarding impl so a borrowed store can be handed to the sampler
impl<S: SampleStore + ?Sized> SampleStore for &mut S {
    fn append(&mut self, record: &PairedRecord) -> Result<()> {
        (**self).append(record)
    }

    fn query_by_label(&self, label: &str) -> Result<RecordIter<'_>> {
        (**self).query_by_label(label)
    }

    fn labels(&self) -> BTreeMap<String, usize> {
        (**self).labels()
    }
}
