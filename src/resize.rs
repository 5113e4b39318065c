//! Clipping of bucket boundary records to reference range edges.
//!
//! The first and last records of a bucket usually run past the range
//! boundaries; their assembly coordinates are resized so the haplotype
//! sequence matches the range exactly. Only reference blocks and
//! equal-length substitutions can be resized; indel records with unequal
//! allele lengths keep their recorded assembly coordinates as the best
//! available approximation.

use crate::merge::{merge_spans, AssemblySpan};
use crate::position::ReferenceRange;
use crate::variant::{Strand, VariantRecord};
use log::debug;
use std::io;

/// A record is resizable when its reference allele is a single base (block
/// records) or its alleles have equal length (SNP-like substitutions).
pub fn is_resizable(variant: &VariantRecord) -> bool {
    variant.ref_allele.len() == 1 || variant.ref_allele.len() == variant.alt_allele.len()
}

/// Clip a resizable record to reference position `target`, returning the
/// matching `(reference, assembly)` coordinate pair. Targets outside the
/// record clamp to its own endpoints.
pub fn resize_to(variant: &VariantRecord, target: i64) -> (i64, i64) {
    if target < variant.start {
        return (variant.start, variant.asm_start);
    }
    if target > variant.end {
        return (variant.end, variant.asm_end);
    }
    let offset = target - variant.start;
    let asm = match variant.strand {
        Strand::Forward => variant.asm_start + offset,
        Strand::Reverse => variant.asm_start - offset,
    };
    (target, asm)
}

/// Assembly coordinate for the range-start clip of a bucket's first record.
fn clip_start(variant: &VariantRecord, range: &ReferenceRange) -> i64 {
    if is_resizable(variant) {
        resize_to(variant, range.start).1
    } else {
        debug!(
            "Record at {}:{} is not resizable; using recorded assembly start {} as approximation",
            variant.contig, variant.start, variant.asm_start
        );
        variant.asm_start
    }
}

/// Assembly coordinate for the range-end clip of a bucket's last record.
fn clip_end(variant: &VariantRecord, range: &ReferenceRange) -> i64 {
    if is_resizable(variant) {
        resize_to(variant, range.end).1
    } else {
        debug!(
            "Record at {}:{} is not resizable; using recorded assembly end {} as approximation",
            variant.contig, variant.start, variant.asm_end
        );
        variant.asm_end
    }
}

/// Build a normalized span from raw assembly endpoints in alignment order.
fn span_from_raw(contig: &str, a: i64, b: i64, strand: Strand) -> AssemblySpan {
    AssemblySpan::new(contig, a.min(b), a.max(b), strand)
}

/// Turn a flushed bucket into the merged list of assembly spans for one
/// reference range. The first record is clipped to the range start, the last
/// to the range end; interior records are fully contained and pass through.
/// Disagreeing strands between the boundary records indicate inconsistent
/// aligner output and fail the bucket.
pub fn bucket_to_spans(
    range: &ReferenceRange,
    bucket: &[&VariantRecord],
) -> io::Result<Vec<AssemblySpan>> {
    let (first, last) = match (bucket.first(), bucket.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return Ok(Vec::new()),
    };

    if first.strand != last.strand {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Strand mismatch within range {}: first record {}:{} is '{}', last record {}:{} is '{}'",
                range.id(),
                first.contig,
                first.start,
                first.strand.to_char(),
                last.contig,
                last.start,
                last.strand.to_char()
            ),
        ));
    }

    let mut spans = Vec::with_capacity(bucket.len());

    if bucket.len() == 1 {
        // Both boundaries resolve against the same record
        let a = clip_start(first, range);
        let b = clip_end(first, range);
        spans.push(span_from_raw(&first.asm_contig, a, b, first.strand));
    } else {
        let a = clip_start(first, range);
        spans.push(span_from_raw(&first.asm_contig, a, first.asm_end, first.strand));

        for variant in &bucket[1..bucket.len() - 1] {
            spans.push(span_from_raw(
                &variant.asm_contig,
                variant.asm_start,
                variant.asm_end,
                variant.strand,
            ));
        }

        let b = clip_end(last, range);
        spans.push(span_from_raw(&last.asm_contig, last.asm_start, b, last.strand));
    }

    Ok(merge_spans(spans))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantKind;

    fn block(
        start: i64,
        end: i64,
        asm_start: i64,
        asm_end: i64,
        strand: Strand,
    ) -> VariantRecord {
        VariantRecord {
            contig: "chr1".to_string(),
            start,
            end,
            ref_allele: "A".to_string(),
            alt_allele: "<NON_REF>".to_string(),
            kind: VariantKind::RefBlock,
            asm_contig: "asm1".to_string(),
            asm_start,
            asm_end,
            strand,
        }
    }

    fn range(start: i64, end: i64) -> ReferenceRange {
        ReferenceRange::new("chr1", start, end)
    }

    #[test]
    fn test_resize_inside_forward() {
        let v = block(50, 250, 1000, 1200, Strand::Forward);
        assert_eq!(resize_to(&v, 100), (100, 1050));
        assert_eq!(resize_to(&v, 200), (200, 1150));
    }

    #[test]
    fn test_resize_inside_reverse() {
        let v = block(50, 250, 1200, 1000, Strand::Reverse);
        assert_eq!(resize_to(&v, 100), (100, 1150));
        assert_eq!(resize_to(&v, 200), (200, 1050));
    }

    #[test]
    fn test_resize_clamps_outside() {
        let v = block(100, 200, 1000, 1100, Strand::Forward);
        assert_eq!(resize_to(&v, 50), (100, 1000));
        assert_eq!(resize_to(&v, 300), (200, 1100));
    }

    #[test]
    fn test_indel_not_resizable() {
        let mut v = block(100, 102, 1000, 1000, Strand::Forward);
        v.kind = VariantKind::Deletion;
        v.ref_allele = "ACG".to_string();
        v.alt_allele = "A".to_string();
        assert!(!is_resizable(&v));

        let mut s = v.clone();
        s.ref_allele = "AC".to_string();
        s.alt_allele = "GT".to_string();
        assert!(is_resizable(&s));
    }

    #[test]
    fn test_boundary_scenario() {
        // Single block spanning the whole range, forward strand
        let r = range(100, 200);
        let v = block(50, 250, 1000, 1200, Strand::Forward);
        let spans = bucket_to_spans(&r, &[&v]).unwrap();
        assert_eq!(
            spans,
            vec![AssemblySpan::new("asm1", 1050, 1150, Strand::Forward)]
        );
    }

    #[test]
    fn test_boundary_scenario_reverse() {
        let r = range(100, 200);
        let v = block(50, 250, 1200, 1000, Strand::Reverse);
        let spans = bucket_to_spans(&r, &[&v]).unwrap();
        assert_eq!(
            spans,
            vec![AssemblySpan::new("asm1", 1050, 1150, Strand::Reverse)]
        );
    }

    #[test]
    fn test_split_scenario_merges_after_clipping() {
        // Two blocks overlapping either range end clip to 100/200 and merge
        let r = range(100, 200);
        let v1 = block(90, 150, 500, 560, Strand::Forward);
        let v2 = block(151, 250, 561, 660, Strand::Forward);
        let spans = bucket_to_spans(&r, &[&v1, &v2]).unwrap();
        assert_eq!(
            spans,
            vec![AssemblySpan::new("asm1", 510, 610, Strand::Forward)]
        );
    }

    #[test]
    fn test_split_scenario_reverse() {
        // Reverse-strand records walk the assembly high-to-low
        let r = range(100, 200);
        let v1 = block(90, 150, 660, 600, Strand::Reverse);
        let v2 = block(151, 250, 599, 500, Strand::Reverse);
        let spans = bucket_to_spans(&r, &[&v1, &v2]).unwrap();
        // clip at 100: 660 - 10 = 650; clip at 200: 599 - 49 = 550
        assert_eq!(
            spans,
            vec![AssemblySpan::new("asm1", 550, 650, Strand::Reverse)]
        );
    }

    #[test]
    fn test_interior_records_pass_through() {
        let r = range(100, 200);
        let v1 = block(90, 140, 500, 550, Strand::Forward);
        let mut snp = block(141, 141, 551, 551, Strand::Forward);
        snp.kind = VariantKind::Snp;
        snp.alt_allele = "G".to_string();
        let v3 = block(142, 250, 560, 668, Strand::Forward);
        let spans = bucket_to_spans(&r, &[&v1, &snp, &v3]).unwrap();
        // First two merge (550|551), the third starts at 560 with a gap
        assert_eq!(
            spans,
            vec![
                AssemblySpan::new("asm1", 510, 551, Strand::Forward),
                AssemblySpan::new("asm1", 560, 618, Strand::Forward),
            ]
        );
    }

    #[test]
    fn test_non_resizable_edge_falls_back() {
        let r = range(100, 200);
        let mut v1 = block(95, 97, 500, 500, Strand::Forward);
        v1.kind = VariantKind::Deletion;
        v1.ref_allele = "ACGT".to_string();
        v1.alt_allele = "A".to_string();
        assert!(!is_resizable(&v1));
        let v2 = block(98, 250, 501, 653, Strand::Forward);
        let spans = bucket_to_spans(&r, &[&v1, &v2]).unwrap();
        // v1 keeps its recorded assembly start; v2 clips at 200
        assert_eq!(spans[0].start, 500);
        assert_eq!(spans.last().unwrap().end, 501 + (200 - 98));
    }

    #[test]
    fn test_strand_mismatch_is_fatal() {
        let r = range(100, 200);
        let v1 = block(90, 150, 500, 560, Strand::Forward);
        let v2 = block(151, 250, 660, 561, Strand::Reverse);
        assert!(bucket_to_spans(&r, &[&v1, &v2]).is_err());
    }

    #[test]
    fn test_empty_bucket() {
        let r = range(100, 200);
        assert!(bucket_to_spans(&r, &[]).unwrap().is_empty());
    }
}
