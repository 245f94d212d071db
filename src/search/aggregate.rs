//! Merging of per-spec result batches into one ordered collection.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{paper_from_record, MalformedRecordError, Paper, RawRecord, SortOrder};

/// Merges record batches keyed by source ID.
///
/// A record whose ID was already seen replaces the earlier one but keeps its
/// first-seen position.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<RawRecord>,
    positions: HashMap<String, usize>,
    received: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one spec's whole batch
    pub fn insert_batch(&mut self, batch: impl IntoIterator<Item = RawRecord>) {
        for record in batch {
            self.received += 1;
            match self.positions.get(record.id()) {
                Some(&position) => self.records[position] = record,
                None => {
                    self.positions
                        .insert(record.id().to_string(), self.records.len());
                    self.records.push(record);
                }
            }
        }
    }

    /// Distinct records merged so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records received across all batches, duplicates included
    pub fn received(&self) -> usize {
        self.received
    }

    /// Close the merge.
    ///
    /// Remote order is kept for a single spec. With more than one spec the
    /// whole set is re-sorted by `order`, descending, records missing the
    /// sort field last. The sort is stable.
    pub fn finish(self, order: SortOrder, spec_count: usize) -> AggregatedResults {
        let mut records = self.records;

        if spec_count > 1 {
            records = match order {
                SortOrder::None => records,
                SortOrder::MostRecentFirst => {
                    sort_descending(records, RawRecord::date, |a, b| a.cmp(b))
                }
                SortOrder::MostCitedFirst => {
                    sort_descending(records, RawRecord::citation_count, f64::total_cmp)
                }
            };
            tracing::debug!(
                records = records.len(),
                field = order.sort_field(),
                "re-sorted merged results"
            );
        }

        AggregatedResults { records }
    }
}

fn sort_descending<K>(
    records: Vec<RawRecord>,
    key: impl Fn(&RawRecord) -> Option<K>,
    cmp: impl Fn(&K, &K) -> Ordering,
) -> Vec<RawRecord> {
    let mut keyed: Vec<(Option<K>, RawRecord)> =
        records.into_iter().map(|r| (key(&r), r)).collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => cmp(b, a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed.into_iter().map(|(_, r)| r).collect()
}

/// Merged search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResults {
    records: Vec<RawRecord>,
}

impl AggregatedResults {
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(RawRecord::id).collect()
    }

    /// Map every record onto the entity model; malformed records are
    /// reported individually
    pub fn papers(&self) -> Vec<Result<Paper, MalformedRecordError>> {
        self.records.iter().map(paper_from_record).collect()
    }
}
