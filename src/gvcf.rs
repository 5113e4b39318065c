//! gVCF parsing for per-sample assembly variant streams.
//!
//! Reads the alignment-derived calls for one sample: each data line carries
//! the reference coordinates in the usual VCF columns and the assembly-side
//! coordinates in the `ASM_Chr`/`ASM_Start`/`ASM_End`/`ASM_Strand` INFO keys.
//! Supports plain and BGZF-compressed files.

use crate::position::compare_contigs;
use crate::variant::{Strand, VariantKind, VariantRecord};
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::num::ParseIntError;

#[derive(Debug)]
pub enum ParseErr {
    NotEnoughFields,
    IoError(io::Error),
    InvalidField(ParseIntError),
    InvalidStrand,
    MissingAttribute(String),
    UnsortedInput(String),
    InvalidFormat(String),
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::NotEnoughFields => write!(f, "Not enough fields in gVCF record"),
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
            ParseErr::InvalidField(e) => write!(f, "Invalid field: {}", e),
            ParseErr::InvalidStrand => write!(f, "Invalid strand"),
            ParseErr::MissingAttribute(key) => {
                write!(f, "Missing required INFO attribute '{}'", key)
            }
            ParseErr::UnsortedInput(msg) => write!(f, "Input not sorted: {}", msg),
            ParseErr::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseErr {}

const BGZF_HEADER_SIZE: usize = 18;

/// Check whether a file starts with a valid BGZF header.
/// Returns `Ok(false)` for regular gzip, too-small files, or plain text.
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => {
            Ok(header[0..2] == [0x1f, 0x8b]      // gzip magic
                && header[2] == 0x08              // DEFLATE
                && header[3] == 0x04              // FEXTRA
                && header[10..12] == [0x06, 0x00] // XLEN=6
                && header[12..14] == [b'B', b'C'] // BC subfield
                && header[14..16] == [0x02, 0x00]) // SLEN=2
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// Look up a `key=value` entry in a VCF INFO column.
fn info_value<'a>(info: &'a str, key: &str) -> Option<&'a str> {
    info.split(';').find_map(|entry| {
        let (k, v) = entry.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Classify a call from its alleles and reference extent.
fn classify_alleles(ref_allele: &str, alt_allele: &str, has_end_key: bool) -> VariantKind {
    if alt_allele == "<NON_REF>" || alt_allele == "." || (alt_allele.is_empty() && has_end_key) {
        VariantKind::RefBlock
    } else if alt_allele.starts_with('<') {
        VariantKind::Symbolic
    } else if ref_allele.len() == alt_allele.len() {
        VariantKind::Snp
    } else if ref_allele.len() < alt_allele.len() {
        VariantKind::Insertion
    } else {
        VariantKind::Deletion
    }
}

/// Parse a single gVCF data line into a VariantRecord.
///
/// Assembly chrom/start/end are required; a record without them makes the
/// whole stream unusable. Strand defaults to `+` when `ASM_Strand` is absent.
fn parse_gvcf_line(line: &str) -> Result<VariantRecord, ParseErr> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 8 {
        return Err(ParseErr::NotEnoughFields);
    }

    let contig = fields[0].to_string();
    let start = fields[1].parse::<i64>().map_err(ParseErr::InvalidField)?;
    let ref_allele = fields[3].to_string();
    // First ALT only; trailing non-ref placeholders carry no coordinates
    let alt_allele = fields[4].split(',').next().unwrap_or("").to_string();
    let info = fields[7];

    let end = match info_value(info, "END") {
        Some(v) => v.parse::<i64>().map_err(ParseErr::InvalidField)?,
        None => start + ref_allele.len() as i64 - 1,
    };

    let asm_contig = info_value(info, "ASM_Chr")
        .ok_or_else(|| ParseErr::MissingAttribute("ASM_Chr".to_string()))?
        .to_string();
    let asm_start = info_value(info, "ASM_Start")
        .ok_or_else(|| ParseErr::MissingAttribute("ASM_Start".to_string()))?
        .parse::<i64>()
        .map_err(ParseErr::InvalidField)?;
    let asm_end = info_value(info, "ASM_End")
        .ok_or_else(|| ParseErr::MissingAttribute("ASM_End".to_string()))?
        .parse::<i64>()
        .map_err(ParseErr::InvalidField)?;

    // Default substitution happens here, not at lookup time
    let strand = match info_value(info, "ASM_Strand") {
        Some(v) => {
            let c = v.chars().next().ok_or(ParseErr::InvalidStrand)?;
            Strand::from_char(c).ok_or(ParseErr::InvalidStrand)?
        }
        None => Strand::Forward,
    };

    let kind = classify_alleles(&ref_allele, &alt_allele, info_value(info, "END").is_some());

    let record = VariantRecord {
        contig,
        start,
        end,
        ref_allele,
        alt_allele,
        kind,
        asm_contig,
        asm_start,
        asm_end,
        strand,
    };

    if !record.coordinates_consistent() {
        return Err(ParseErr::InvalidFormat(format!(
            "Assembly coordinates {}:{}-{} disagree with strand '{}' at {}:{}",
            record.asm_contig,
            record.asm_start,
            record.asm_end,
            record.strand.to_char(),
            record.contig,
            record.start
        )));
    }

    Ok(record)
}

/// Parse a gVCF stream, skipping header lines. Records must be sorted by
/// contig (natural order) then reference start; unsorted input is rejected.
pub fn parse_gvcf<R: BufRead>(reader: R) -> Result<Vec<VariantRecord>, ParseErr> {
    let mut records: Vec<VariantRecord> = Vec::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(ParseErr::IoError)?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record = parse_gvcf_line(&line)?;
        if let Some(prev) = records.last() {
            let order = compare_contigs(&prev.contig, &record.contig)
                .then(prev.start.cmp(&record.start));
            if order == std::cmp::Ordering::Greater {
                return Err(ParseErr::UnsortedInput(format!(
                    "{}:{} follows {}:{}",
                    record.contig, record.start, prev.contig, prev.start
                )));
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Parse a gVCF file with automatic format detection (plain or BGZF).
pub fn parse_gvcf_file(gvcf_file: &str) -> io::Result<Vec<VariantRecord>> {
    let mut file = File::open(gvcf_file)
        .map_err(|e| io::Error::other(format!("Failed to open gVCF file '{gvcf_file}': {e}")))?;

    let result = if [".gz", ".bgz"].iter().any(|e| gvcf_file.ends_with(e)) {
        if !is_bgzf(&mut file)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.g.vcf.gz",
                    gvcf_file, gvcf_file
                ),
            ));
        }
        let reader = BufReader::new(bgzf::io::Reader::new(file));
        parse_gvcf(reader)
    } else {
        parse_gvcf(BufReader::new(file))
    };

    result.map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse gVCF from {}: {}", gvcf_file, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ref_block() {
        let line = "chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=200;ASM_Chr=asm1;ASM_Start=1000;ASM_End=1100;ASM_Strand=+";
        let record = parse_gvcf_line(line).unwrap();
        assert_eq!(record.kind, VariantKind::RefBlock);
        assert_eq!(record.start, 100);
        assert_eq!(record.end, 200);
        assert_eq!(record.asm_contig, "asm1");
        assert_eq!(record.asm_start, 1000);
        assert_eq!(record.asm_end, 1100);
        assert_eq!(record.strand, Strand::Forward);
    }

    #[test]
    fn test_parse_snp_default_strand() {
        let line = "chr1\t150\t.\tA\tG,<NON_REF>\t.\t.\tASM_Chr=asm1;ASM_Start=1050;ASM_End=1050";
        let record = parse_gvcf_line(line).unwrap();
        assert_eq!(record.kind, VariantKind::Snp);
        assert_eq!(record.end, 150);
        assert_eq!(record.alt_allele, "G");
        assert_eq!(record.strand, Strand::Forward);
    }

    #[test]
    fn test_parse_indels() {
        let ins = "chr1\t150\t.\tA\tACGT\t.\t.\tASM_Chr=asm1;ASM_Start=1050;ASM_End=1053";
        assert_eq!(parse_gvcf_line(ins).unwrap().kind, VariantKind::Insertion);

        let del = "chr1\t150\t.\tACGT\tA\t.\t.\tASM_Chr=asm1;ASM_Start=1050;ASM_End=1050";
        assert_eq!(parse_gvcf_line(del).unwrap().kind, VariantKind::Deletion);
    }

    #[test]
    fn test_parse_reverse_strand_block() {
        let line = "chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=200;ASM_Chr=asm1;ASM_Start=5000;ASM_End=4900;ASM_Strand=-";
        let record = parse_gvcf_line(line).unwrap();
        assert_eq!(record.strand, Strand::Reverse);
        assert!(record.asm_start > record.asm_end);
    }

    #[test]
    fn test_missing_asm_attribute() {
        let line = "chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=200;ASM_Start=1000;ASM_End=1100";
        assert!(matches!(
            parse_gvcf_line(line),
            Err(ParseErr::MissingAttribute(_))
        ));
    }

    #[test]
    fn test_strand_coordinate_mismatch() {
        // Forward strand but decreasing assembly coordinates
        let line = "chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=200;ASM_Chr=asm1;ASM_Start=1100;ASM_End=1000;ASM_Strand=+";
        assert!(matches!(
            parse_gvcf_line(line),
            Err(ParseErr::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unsorted_stream_rejected() {
        let data = "\
chr1\t200\t.\tA\t<NON_REF>\t.\t.\tEND=300;ASM_Chr=asm1;ASM_Start=1000;ASM_End=1100\n\
chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=150;ASM_Chr=asm1;ASM_Start=500;ASM_End=550\n";
        assert!(matches!(
            parse_gvcf(data.as_bytes()),
            Err(ParseErr::UnsortedInput(_))
        ));
    }

    #[test]
    fn test_parse_stream_skips_header() {
        let data = "\
##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=200;ASM_Chr=asm1;ASM_Start=1000;ASM_End=1100\n";
        let records = parse_gvcf(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
    }
}
