//! Sequence access: indexed FASTA files and the in-memory reference map.
//!
//! `SequenceSource` is the seam for haplotype sequence extraction; the
//! builder issues one batched request per sample through it. `FastaIndex`
//! resolves sequence names across multiple FASTA files with a per-thread
//! handle cache.

use rust_htslib::faidx;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;

use crate::merge::AssemblySpan;
use crate::position::ReferenceRange;

/// Read-only access to named sequences, 1-based inclusive coordinates.
pub trait SequenceSource {
    fn fetch(&self, seq_name: &str, start: i64, end: i64) -> io::Result<Vec<u8>>;

    /// Fetch many spans in one call. The default implementation issues one
    /// fetch per span; file-backed sources keep their handles warm across the
    /// whole batch.
    fn fetch_batch(&self, spans: &[AssemblySpan]) -> io::Result<Vec<Vec<u8>>> {
        spans
            .iter()
            .map(|span| self.fetch(&span.contig, span.start, span.end))
            .collect()
    }
}

// Simple cache for FASTA file handles with arbitrary eviction
struct FaidxCache {
    capacity: usize,
    readers: HashMap<String, faidx::Reader>,
}

impl FaidxCache {
    fn new(capacity: usize) -> Self {
        FaidxCache {
            capacity,
            readers: HashMap::with_capacity(capacity),
        }
    }

    fn get_or_open(&mut self, path: &str) -> io::Result<&mut faidx::Reader> {
        if self.readers.contains_key(path) {
            return Ok(self.readers.get_mut(path).unwrap());
        }

        if self.readers.len() >= self.capacity {
            if let Some(key_to_remove) = self.readers.keys().next().cloned() {
                self.readers.remove(&key_to_remove);
            }
        }

        let reader = faidx::Reader::from_path(path)
            .map_err(|e| io::Error::other(format!("Failed to open FASTA file '{path}': {e}")))?;

        self.readers.insert(path.to_string(), reader);
        Ok(self.readers.get_mut(path).unwrap())
    }
}

thread_local! {
    // Per-thread cache: 10 files per thread
    static FAIDX_CACHE: RefCell<FaidxCache> = RefCell::new(FaidxCache::new(10));
}

/// Maps sequence names to their owning FASTA file across a set of files
/// (assemblies are usually one file per sample).
#[derive(Debug, Default)]
pub struct FastaIndex {
    pub fasta_paths: Vec<String>,
    pub seq_name_to_fasta: FxHashMap<String, usize>,
    pub sequence_lengths: FxHashMap<String, usize>,
}

impl FastaIndex {
    pub fn build_from_files(fasta_files: &[String]) -> io::Result<Self> {
        let mut index = FastaIndex::default();

        for (fasta_idx, fasta_path) in fasta_files.iter().enumerate() {
            index.fasta_paths.push(fasta_path.clone());

            // Read the .fai file for sequence names; create it if missing
            let fai_path = format!("{fasta_path}.fai");
            let fai_content = match std::fs::read_to_string(&fai_path) {
                Ok(content) => content,
                Err(_) => match faidx::Reader::from_path(fasta_path) {
                    Ok(_) => std::fs::read_to_string(&fai_path)?,
                    Err(e) => {
                        return Err(io::Error::other(format!(
                            "Failed to create FASTA index for '{fasta_path}': {e}"
                        )));
                    }
                },
            };

            for line in fai_content.lines() {
                let fields: Vec<&str> = line.split('\t').collect();
                if fields.len() >= 2 && !fields[0].is_empty() {
                    index
                        .seq_name_to_fasta
                        .insert(fields[0].to_string(), fasta_idx);
                    if let Ok(length) = fields[1].parse::<usize>() {
                        index.sequence_lengths.insert(fields[0].to_string(), length);
                    }
                }
            }
        }

        Ok(index)
    }

    fn get_fasta_path(&self, seq_name: &str) -> Option<&str> {
        self.seq_name_to_fasta
            .get(seq_name)
            .map(|&idx| self.fasta_paths[idx].as_str())
    }

    pub fn sequence_names(&self) -> impl Iterator<Item = &str> {
        self.seq_name_to_fasta.keys().map(|s| s.as_str())
    }

    pub fn get_sequence_length(&self, seq_name: &str) -> io::Result<usize> {
        self.sequence_lengths.get(seq_name).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{seq_name}' not found"),
            )
        })
    }
}

impl SequenceSource for FastaIndex {
    fn fetch(&self, seq_name: &str, start: i64, end: i64) -> io::Result<Vec<u8>> {
        let fasta_path = self.get_fasta_path(seq_name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{seq_name}' not found in any FASTA file"),
            )
        })?;

        FAIDX_CACHE.with(|cache_cell| -> io::Result<Vec<u8>> {
            let mut cache = cache_cell.borrow_mut();
            let reader = cache.get_or_open(fasta_path)?;

            // rust-htslib expects 0-based inclusive end coordinates
            let seq_vec = match reader.fetch_seq(seq_name, (start - 1) as usize, (end - 1) as usize)
            {
                Ok(seq) => {
                    let mut seq_vec = seq.to_vec();
                    unsafe { libc::free(seq.as_ptr() as *mut std::ffi::c_void) }; // Free up memory to avoid memory leak (bug https://github.com/rust-bio/rust-htslib/issues/401#issuecomment-1704290171)
                    seq_vec
                        .iter_mut()
                        .for_each(|byte| *byte = byte.to_ascii_uppercase());
                    seq_vec
                }
                Err(e) => {
                    return Err(io::Error::other(format!(
                        "Failed to fetch sequence for {seq_name}: {e}"
                    )))
                }
            };

            Ok(seq_vec)
        })
    }
}

/// The whole reference genome in memory: contig name to full base sequence.
/// Used only to slice out reference strings for checksumming ranges.
#[derive(Debug, Default)]
pub struct RefGenome {
    sequences: FxHashMap<String, Vec<u8>>,
}

impl RefGenome {
    /// Load every contig of a FASTA file into memory.
    pub fn from_fasta(fasta_path: &str) -> io::Result<Self> {
        let index = FastaIndex::build_from_files(std::slice::from_ref(&fasta_path.to_string()))?;
        let names: Vec<String> = index.sequence_names().map(|s| s.to_string()).collect();

        let mut sequences = FxHashMap::default();
        for name in names {
            let len = index.get_sequence_length(&name)? as i64;
            let seq = index.fetch(&name, 1, len)?;
            sequences.insert(name, seq);
        }
        Ok(RefGenome { sequences })
    }

    pub fn from_map(sequences: FxHashMap<String, Vec<u8>>) -> Self {
        RefGenome { sequences }
    }

    pub fn contig(&self, name: &str) -> Option<&[u8]> {
        self.sequences.get(name).map(|s| s.as_slice())
    }

    /// Slice the reference sequence for one range. Missing contigs and empty
    /// slices are fatal: a range that cannot be validated poisons the run.
    pub fn range_sequence(&self, range: &ReferenceRange) -> io::Result<&[u8]> {
        let seq = self.contig(&range.contig).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "Reference contig '{}' for range {} not found in reference genome",
                    range.contig,
                    range.id()
                ),
            )
        })?;
        if range.start < 1 || range.end as usize > seq.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Range {} exceeds reference contig length {}",
                    range.id(),
                    seq.len()
                ),
            ));
        }
        let slice = &seq[(range.start - 1) as usize..range.end as usize];
        if slice.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Empty reference sequence for range {}", range.id()),
            ));
        }
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_ref() -> RefGenome {
        let mut map = FxHashMap::default();
        map.insert("chr1".to_string(), b"ACGTACGTAC".to_vec());
        RefGenome::from_map(map)
    }

    #[test]
    fn test_range_sequence_slices_one_based() {
        let genome = tiny_ref();
        let r = ReferenceRange::new("chr1", 2, 5);
        assert_eq!(genome.range_sequence(&r).unwrap(), b"CGTA");
    }

    #[test]
    fn test_range_sequence_missing_contig_fatal() {
        let genome = tiny_ref();
        let r = ReferenceRange::new("chrX", 1, 5);
        assert!(genome.range_sequence(&r).is_err());
    }

    #[test]
    fn test_range_sequence_out_of_bounds_fatal() {
        let genome = tiny_ref();
        let r = ReferenceRange::new("chr1", 5, 50);
        assert!(genome.range_sequence(&r).is_err());
    }
}
