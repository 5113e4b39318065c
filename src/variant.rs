//! Typed per-sample variant records derived from whole-genome alignment.
//!
//! Each record maps a reference stretch to the coordinates of the sample's
//! own assembly. Assembly coordinates follow alignment orientation: on the
//! reverse strand `asm_start >= asm_end`, because `asm_start` is pinned to
//! the reference-side start of the aligned block.

use serde::{Deserialize, Serialize};

/// Strand orientation of the assembly-side alignment.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Forward),
            '-' => Some(Strand::Reverse),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// Call class of a variant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// Reference-matching block (gVCF non-variant region with an END key).
    RefBlock,
    Snp,
    Insertion,
    Deletion,
    /// Symbolic ALT other than the non-ref placeholder.
    Symbolic,
}

impl VariantKind {
    /// Block-like kinds have reference extent beyond their start coordinate.
    pub fn has_extent(self) -> bool {
        matches!(self, VariantKind::RefBlock | VariantKind::Symbolic)
    }
}

/// One alignment-derived call for a single sample, with assembly-side
/// coordinates resolved at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub contig: String,
    pub start: i64,
    pub end: i64,
    pub ref_allele: String,
    pub alt_allele: String,
    pub kind: VariantKind,
    pub asm_contig: String,
    pub asm_start: i64,
    pub asm_end: i64,
    pub strand: Strand,
}

impl VariantRecord {
    /// Reference end used for overlap classification: block-like kinds span
    /// `[start, end]`, point calls have no extent beyond their start.
    pub fn overlap_end(&self) -> i64 {
        if self.kind.has_extent() {
            self.end
        } else {
            self.start
        }
    }

    /// Orientation sanity: forward records run low-to-high on the assembly,
    /// reverse records high-to-low. Equal endpoints are fine either way.
    pub fn coordinates_consistent(&self) -> bool {
        match self.strand {
            Strand::Forward => self.asm_start <= self.asm_end,
            Strand::Reverse => self.asm_start >= self.asm_end,
        }
    }
}
