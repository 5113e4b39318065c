//! Assembly span representation and adjacency merging.
//!
//! One range is often covered by many variant records (scattered SNPs inside
//! reference blocks); after clipping, their assembly spans are positionally
//! consecutive. Merging them keeps the stored metadata minimal: one span pair
//! instead of dozens.

use crate::position::Position;
use crate::variant::Strand;
use serde::{Deserialize, Serialize};

/// A contiguous assembly-coordinate region contributing to one haplotype.
/// `start <= end` always holds; orientation is carried explicitly in `strand`
/// rather than encoded in coordinate order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblySpan {
    pub contig: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
}

impl AssemblySpan {
    pub fn new(contig: impl Into<String>, start: i64, end: i64, strand: Strand) -> Self {
        debug_assert!(start <= end);
        AssemblySpan {
            contig: contig.into(),
            start,
            end,
            strand,
        }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// First base visited in haplotype order; reverse spans are walked
    /// high-to-low.
    pub fn first_position(&self) -> Position {
        match self.strand {
            Strand::Forward => Position::new(self.contig.clone(), self.start),
            Strand::Reverse => Position::new(self.contig.clone(), self.end),
        }
    }

    /// Last base visited in haplotype order.
    pub fn last_position(&self) -> Position {
        match self.strand {
            Strand::Forward => Position::new(self.contig.clone(), self.end),
            Strand::Reverse => Position::new(self.contig.clone(), self.start),
        }
    }
}

impl std::fmt::Display for AssemblySpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}{}",
            self.contig,
            self.start,
            self.end,
            self.strand.to_char()
        )
    }
}

/// Merge positionally consecutive spans into a minimal ordered list.
///
/// Spans arrive in haplotype order: forward runs grow upward in assembly
/// coordinates (next.start == cur.end + 1), reverse runs grow downward
/// (next.end == cur.start - 1). A length-1 span is direction-ambiguous and
/// may join a run on whichever side it touches; the run keeps the strand of
/// its longer member. Non-adjacent spans start a new entry. Idempotent.
pub fn merge_spans(spans: Vec<AssemblySpan>) -> Vec<AssemblySpan> {
    let mut merged: Vec<AssemblySpan> = Vec::with_capacity(spans.len());

    for span in spans {
        if let Some(cur) = merged.last_mut() {
            if cur.contig == span.contig {
                let forward_adjacent = span.start == cur.end + 1;
                let reverse_adjacent = span.end == cur.start - 1;
                let ambiguous = span.len() == 1 || cur.len() == 1;
                let same_strand = span.strand == cur.strand;

                if forward_adjacent && (same_strand || ambiguous) && strand_allows(cur, &span, Strand::Forward) {
                    cur.end = span.end;
                    if cur.len() > 1 && span.len() > 1 {
                        cur.strand = Strand::Forward;
                    } else if span.len() > 1 {
                        cur.strand = span.strand;
                    }
                    continue;
                }
                if reverse_adjacent && (same_strand || ambiguous) && strand_allows(cur, &span, Strand::Reverse) {
                    cur.start = span.start;
                    if span.len() > 1 {
                        cur.strand = span.strand;
                    }
                    continue;
                }
            }
        }
        merged.push(span);
    }

    merged
}

/// A merge in `direction` is allowed when neither participant is a
/// multi-base span of the opposite orientation.
fn strand_allows(cur: &AssemblySpan, span: &AssemblySpan, direction: Strand) -> bool {
    let fixed = |s: &AssemblySpan| s.len() > 1 && s.strand != direction;
    !fixed(cur) && !fixed(span)
}
