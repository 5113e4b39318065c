//! Genomic coordinate primitives: 1-based positions and reference ranges.
//!
//! Contig names are compared with natural ordering (`chr2` < `chr10`), with a
//! lexicographic tie-break so `Ord` stays consistent with `Eq`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

/// Compare two contig names: natural order first, plain string order as tie-break.
pub fn compare_contigs(a: &str, b: &str) -> Ordering {
    natord::compare(a, b).then_with(|| a.cmp(b))
}

/// A single 1-based genomic coordinate on a named contig.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub contig: String,
    pub pos: i64,
}

impl Position {
    pub fn new(contig: impl Into<String>, pos: i64) -> Self {
        Position {
            contig: contig.into(),
            pos,
        }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_contigs(&self.contig, &other.contig).then(self.pos.cmp(&other.pos))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.contig, self.pos)
    }
}

/// A fixed reference window (1-based, inclusive ends). One node slot of the
/// haplotype graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub contig: String,
    pub start: i64,
    pub end: i64,
}

impl ReferenceRange {
    pub fn new(contig: impl Into<String>, start: i64, end: i64) -> Self {
        ReferenceRange {
            contig: contig.into(),
            start,
            end,
        }
    }

    /// Stable textual identifier, `contig:start-end`.
    pub fn id(&self) -> String {
        format!("{}:{}-{}", self.contig, self.start, self.end)
    }

    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl Ord for ReferenceRange {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_contigs(&self.contig, &other.contig)
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
    }
}

impl PartialOrd for ReferenceRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ReferenceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Parse a BED file of reference ranges. BED coordinates are 0-based
/// half-open; they are converted to 1-based inclusive here. The result is
/// sorted by contig (natural order) then start.
pub fn parse_ranges_bed(bed_file: &str) -> io::Result<Vec<ReferenceRange>> {
    let file = File::open(bed_file)
        .map_err(|e| io::Error::other(format!("Failed to open BED file '{bed_file}': {e}")))?;
    let reader = BufReader::new(file);

    let mut ranges = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "BED line {} in '{}' has fewer than 3 fields",
                    line_num + 1,
                    bed_file
                ),
            ));
        }
        let start: i64 = fields[1].parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid BED start on line {}: {}", line_num + 1, e),
            )
        })?;
        let end: i64 = fields[2].parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid BED end on line {}: {}", line_num + 1, e),
            )
        })?;
        if end <= start {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "BED line {}: end {} is not greater than start {}",
                    line_num + 1,
                    end,
                    start
                ),
            ));
        }
        ranges.push(ReferenceRange::new(fields[0], start + 1, end));
    }

    ranges.sort();
    Ok(ranges)
}

/// Reject overlapping ranges. The input must already be sorted; overlap is a
/// configuration error that aborts the whole run before any sample work starts.
pub fn validate_ranges(ranges: &[ReferenceRange]) -> io::Result<()> {
    for pair in ranges.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.contig == next.contig && next.start <= prev.end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Reference ranges overlap: {} and {}",
                    prev.id(),
                    next.id()
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_natural_order() {
        let a = Position::new("chr2", 100);
        let b = Position::new("chr10", 1);
        assert!(a < b);

        let c = Position::new("chr2", 100);
        let d = Position::new("chr2", 101);
        assert!(c < d);
    }

    #[test]
    fn test_position_lexicographic_fallback() {
        let a = Position::new("ctgA", 5);
        let b = Position::new("ctgB", 5);
        assert!(a < b);
    }

    #[test]
    fn test_range_id() {
        let r = ReferenceRange::new("chr1", 100, 200);
        assert_eq!(r.id(), "chr1:100-200");
        assert_eq!(r.len(), 101);
    }

    #[test]
    fn test_validate_ranges_overlap() {
        let ranges = vec![
            ReferenceRange::new("chr1", 100, 200),
            ReferenceRange::new("chr1", 150, 300),
        ];
        assert!(validate_ranges(&ranges).is_err());
    }

    #[test]
    fn test_validate_ranges_ok() {
        let ranges = vec![
            ReferenceRange::new("chr1", 100, 200),
            ReferenceRange::new("chr1", 201, 300),
            ReferenceRange::new("chr2", 1, 50),
        ];
        assert!(validate_ranges(&ranges).is_ok());
    }
}
