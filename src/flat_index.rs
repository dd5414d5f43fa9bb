//! Brute-force flat index: O(n * d) top-k cosine search

use crate::collection::{Collection, SearchMatch, VectorRecord};
use crate::similarity::cosine_similarity;
use crate::vector::Vector;
use std::cmp::Ordering;
use tracing::warn;

/// A borrowed view over the records a query will be scored against.
#[derive(Debug)]
pub struct FlatIndex<'a> {
    records: Vec<&'a VectorRecord>,
}

impl<'a> FlatIndex<'a> {
    /// Index every record of a collection, in storage order.
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            records: collection.vectors.iter().collect(),
        }
    }

    /// Index only the records whose `prescription_id` equals the given one.
    /// `None` (or an empty id) keeps every record.
    pub fn filtered(collection: &'a Collection, prescription_id: Option<&str>) -> Self {
        match prescription_id.filter(|p| !p.is_empty()) {
            Some(pid) => Self {
                records: collection
                    .vectors
                    .iter()
                    .filter(|r| r.belongs_to(pid))
                    .collect(),
            },
            None => Self::new(collection),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Score every record against `query` and return the `k` best.
    ///
    /// Results are sorted by descending score. The sort is stable, so equal
    /// scores keep their storage order. Records whose dimension differs from
    /// the query, or whose score is not finite, are skipped.
    pub fn search(&self, query: &Vector, k: usize) -> Vec<SearchMatch> {
        if k == 0 {
            return vec![];
        }

        let mut results: Vec<SearchMatch> = self
            .records
            .iter()
            .filter_map(|record| match cosine_similarity(query, &record.embedding) {
                Ok(score) if score.is_finite() => Some(SearchMatch {
                    id: record.id.clone(),
                    score,
                    metadata: record.metadata.clone(),
                }),
                Ok(score) => {
                    warn!(id = %record.id, score, "skipping record with non-finite score");
                    None
                }
                Err(e) => {
                    warn!(id = %record.id, error = %e, "skipping record");
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(k);
        results
    }
}
