use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::types::{IndexError, Result};

use super::partition::{Partition, TermCursor, TermEntry};

#[derive(Debug, Eq, PartialEq, Ord, PartialOrd)]
struct Head {
    term: Vec<u8>,
    cursor: usize,
    doc_freq: u64,
}

/// Term enumeration over the logical union of several partitions.
///
/// Each distinct term is yielded once with its document frequency summed across
/// every partition that carries it. Terms present in a single partition are
/// yielded like any other.
pub struct MergedTerms<'a> {
    cursors: Vec<Box<dyn TermCursor + 'a>>,
    heads: BinaryHeap<Reverse<Head>>,
}

impl<'a> MergedTerms<'a> {
    /// Opens one cursor per partition for `field`.
    pub fn open<P: Partition>(partitions: &'a [P], field: &str) -> Result<Self> {
        let mut merged = Self {
            cursors: Vec::with_capacity(partitions.len()),
            heads: BinaryHeap::with_capacity(partitions.len()),
        };
        for partition in partitions {
            merged.cursors.push(partition.terms(field)?);
        }
        for cursor in 0..merged.cursors.len() {
            merged.advance(cursor, None)?;
        }
        Ok(merged)
    }

    /// Returns the next term in ascending byte order.
    pub fn next_term(&mut self) -> Result<Option<TermEntry>> {
        let Some(Reverse(first)) = self.heads.pop() else {
            return Ok(None);
        };
        let mut doc_freq = first.doc_freq;
        self.advance(first.cursor, Some(first.term.as_slice()))?;
        while self
            .heads
            .peek()
            .is_some_and(|Reverse(head)| head.term == first.term)
        {
            if let Some(Reverse(same)) = self.heads.pop() {
                doc_freq = doc_freq.saturating_add(same.doc_freq);
                self.advance(same.cursor, Some(same.term.as_slice()))?;
            }
        }
        Ok(Some(TermEntry {
            term: first.term,
            doc_freq,
        }))
    }

    fn advance(&mut self, cursor: usize, previous: Option<&[u8]>) -> Result<()> {
        if let Some(entry) = self.cursors[cursor].next_term()? {
            if previous.is_some_and(|prev| entry.term.as_slice() <= prev) {
                return Err(IndexError::Corruption("partition terms out of order"));
            }
            self.heads.push(Reverse(Head {
                term: entry.term,
                cursor,
                doc_freq: entry.doc_freq,
            }));
        }
        Ok(())
    }
}

impl TermCursor for MergedTerms<'_> {
    fn next_term(&mut self) -> Result<Option<TermEntry>> {
        MergedTerms::next_term(self)
    }
}
