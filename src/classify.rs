//! Overlap classification between reference ranges and variant records.
//!
//! A single two-pointer sweep walks the sorted range list and the sorted
//! per-sample variant stream together, accumulating the records that overlap
//! each range into one bucket per range. Each variant is visited only while
//! it can still overlap forward, so the sweep is linear in ranges + variants.

use crate::position::{compare_contigs, ReferenceRange};
use crate::variant::VariantRecord;
use std::cmp::Ordering;

/// Relationship between one reference range and one variant record.
/// The five overlap states are mutually exclusive; `Before` covers records
/// already behind the range (skipped without accumulating).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOverlap {
    /// The variant spans the whole range.
    RegionContained,
    /// The variant lies entirely within the range.
    VariantContained,
    /// The variant starts inside the range and runs past its end.
    PartialAtStart,
    /// The variant starts before the range and ends inside it.
    PartialAtEnd,
    /// The variant starts past the range end.
    After,
    /// The variant lies entirely before the range.
    Before,
}

/// Classify one variant against one range. Contigs are compared in natural
/// order so the sweep also handles multi-contig streams.
pub fn classify(range: &ReferenceRange, variant: &VariantRecord) -> RegionOverlap {
    match compare_contigs(&variant.contig, &range.contig) {
        Ordering::Less => return RegionOverlap::Before,
        Ordering::Greater => return RegionOverlap::After,
        Ordering::Equal => {}
    }

    let v_start = variant.start;
    let v_end = variant.overlap_end();

    if v_start <= range.start && v_end >= range.end {
        RegionOverlap::RegionContained
    } else if v_start >= range.start && v_end <= range.end {
        RegionOverlap::VariantContained
    } else if v_start >= range.start && v_start <= range.end && v_end > range.end {
        RegionOverlap::PartialAtStart
    } else if v_end <= range.end && v_end >= range.start && v_start < range.start {
        RegionOverlap::PartialAtEnd
    } else if v_start > range.end {
        RegionOverlap::After
    } else {
        RegionOverlap::Before
    }
}

/// The variants overlapping one reference range, in stream order.
#[derive(Debug)]
pub struct RangeBucket<'a> {
    /// Index into the range list this bucket belongs to.
    pub range_index: usize,
    pub variants: Vec<&'a VariantRecord>,
}

/// Sweep a sorted variant stream against the sorted range list, producing one
/// bucket per range that has assembly coverage. Ranges with no overlapping
/// variant yield no bucket (distinct from "haplotype equals reference").
pub fn sweep_variants<'a>(
    ranges: &[ReferenceRange],
    variants: &'a [VariantRecord],
) -> Vec<RangeBucket<'a>> {
    let mut buckets = Vec::new();
    let mut cursor = 0usize;
    let mut temp: Vec<&VariantRecord> = Vec::new();

    for (range_index, range) in ranges.iter().enumerate() {
        temp.clear();
        loop {
            let Some(variant) = variants.get(cursor) else {
                // Stream exhausted: flush any remainder for this range
                if !temp.is_empty() {
                    buckets.push(RangeBucket {
                        range_index,
                        variants: std::mem::take(&mut temp),
                    });
                }
                break;
            };

            match classify(range, variant) {
                RegionOverlap::RegionContained => {
                    // One record covers the whole range; it may still cover
                    // the next range, so the cursor stays put
                    temp.clear();
                    buckets.push(RangeBucket {
                        range_index,
                        variants: vec![variant],
                    });
                    break;
                }
                RegionOverlap::VariantContained => {
                    temp.push(variant);
                    cursor += 1;
                }
                RegionOverlap::PartialAtStart => {
                    // Runs past the range end: this range is complete, and
                    // the record must be re-evaluated against the next range
                    temp.push(variant);
                    buckets.push(RangeBucket {
                        range_index,
                        variants: std::mem::take(&mut temp),
                    });
                    break;
                }
                RegionOverlap::PartialAtEnd => {
                    temp.push(variant);
                    cursor += 1;
                }
                RegionOverlap::After => {
                    if !temp.is_empty() {
                        buckets.push(RangeBucket {
                            range_index,
                            variants: std::mem::take(&mut temp),
                        });
                    }
                    break;
                }
                RegionOverlap::Before => {
                    cursor += 1;
                }
            }
        }
    }

    buckets
}
