//! Merged-interval bookkeeping for validated ledger ranges
//!
//! The node advertises which spans of ledger history it holds as a
//! comma-separated range string (e.g. `"32570-6595042,6595045"`). The client
//! keeps those spans in a [`RangeSet`]: an ordered sequence of disjoint,
//! non-adjacent closed intervals, merged eagerly so that containment checks
//! are a single scan.
//!
//! Invariant: intervals are sorted ascending, pairwise disjoint, and never
//! within distance 1 of each other (two intervals separated by at most one
//! integer are merged into one).

use crate::error::{Error, Result};

/// A set of closed integer intervals over ledger indices, kept maximally
/// merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    /// Sorted, disjoint, non-touching `[start, end]` pairs.
    ranges: Vec<(u32, u32)>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the closed interval `[start, end]`, merging it with every
    /// existing interval it overlaps or touches (gap of at most 1).
    ///
    /// # Panics
    ///
    /// Panics if `start > end`; that is a programmer error, not a data error.
    pub fn add(&mut self, start: u32, end: u32) {
        assert!(start <= end, "invalid range [{start}, {end}]");

        let mut merged_start = start;
        let mut merged_end = end;
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;

        for &(s, e) in &self.ranges {
            if touches(s, e, merged_start, merged_end) {
                merged_start = merged_start.min(s);
                merged_end = merged_end.max(e);
            } else if e < merged_start {
                out.push((s, e));
            } else {
                if !placed {
                    out.push((merged_start, merged_end));
                    placed = true;
                }
                out.push((s, e));
            }
        }
        if !placed {
            out.push((merged_start, merged_end));
        }
        self.ranges = out;
    }

    /// Insert the single index `value`.
    pub fn add_value(&mut self, value: u32) {
        self.add(value, value);
    }

    /// Parse a comma-separated list of `a` or `a-b` tokens (the node's
    /// `validated_ledgers` format) and add each as an interval.
    pub fn parse_ranges(&mut self, text: &str) -> Result<()> {
        for token in text.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (start, end) = match token.split_once('-') {
                Some((a, b)) => (parse_index(a)?, parse_index(b)?),
                None => {
                    let v = parse_index(token)?;
                    (v, v)
                }
            };
            if start > end {
                return Err(Error::response_format(format!(
                    "descending ledger range: {token}"
                )));
            }
            self.add(start, end);
        }
        Ok(())
    }

    /// True iff a single stored interval covers `[start, end]` entirely.
    /// Partial coverage by multiple intervals does not count: a gap anywhere
    /// inside the span means history is missing.
    pub fn contains_range(&self, start: u32, end: u32) -> bool {
        self.ranges.iter().any(|&(s, e)| s <= start && end <= e)
    }

    /// True iff `value` lies inside some stored interval.
    pub fn contains_value(&self, value: u32) -> bool {
        self.contains_range(value, value)
    }

    /// Drop every interval.
    pub fn reset(&mut self) {
        self.ranges.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The stored intervals, sorted ascending.
    pub fn intervals(&self) -> &[(u32, u32)] {
        &self.ranges
    }
}

/// Whether `[s, e]` and `[start, end]` overlap or are separated by at most
/// one integer.
fn touches(s: u32, e: u32, start: u32, end: u32) -> bool {
    // saturating arithmetic keeps index 0 and u32::MAX edges safe
    s <= end.saturating_add(1) && start <= e.saturating_add(1)
}

fn parse_index(token: &str) -> Result<u32> {
    token
        .trim()
        .parse()
        .map_err(|_| Error::response_format(format!("invalid ledger index: {token:?}")))
}
