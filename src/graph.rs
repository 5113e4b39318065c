//! The queryable haplotype graph: reference ranges as node slots, content
//! hashes as node identities, sample sets as occupancy.
//!
//! Built by a single-threaded fold over per-sample haplotype records after
//! the worker pool joins, then read-only. A changed input set means a
//! rebuild, not an in-place update.

use crate::haplotype::Haplotype;
use crate::position::ReferenceRange;
use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

/// Haplotype occupancy of one reference range.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RangeNode {
    /// Identifier to the set of samples carrying that haplotype.
    pub samples_by_hap: FxHashMap<String, BTreeSet<String>>,
    /// Sample to the identifier it carries at this range.
    pub hap_by_sample: FxHashMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HaplotypeGraph {
    ranges: Vec<ReferenceRange>,
    nodes: FxHashMap<ReferenceRange, RangeNode>,
    /// Identifier to full haplotype metadata, first writer wins.
    headers: FxHashMap<String, Haplotype>,
    samples: BTreeSet<String>,
}

impl HaplotypeGraph {
    /// Fold haplotype records from all samples into the graph. Record order
    /// does not matter; header insertion is idempotent (first wins, later
    /// duplicates are no-ops).
    pub fn from_haplotypes(
        ranges: Vec<ReferenceRange>,
        haplotypes: impl IntoIterator<Item = Haplotype>,
    ) -> Self {
        let mut graph = HaplotypeGraph {
            ranges,
            ..Default::default()
        };

        for hap in haplotypes {
            let node = graph.nodes.entry(hap.range.clone()).or_default();
            node.samples_by_hap
                .entry(hap.hap_id.clone())
                .or_default()
                .insert(hap.sample.clone());
            node.hap_by_sample
                .insert(hap.sample.clone(), hap.hap_id.clone());
            graph.samples.insert(hap.sample.clone());

            if graph.headers.contains_key(&hap.hap_id) {
                debug!(
                    "Haplotype {} at {} already registered; keeping first header",
                    hap.hap_id,
                    hap.range.id()
                );
            } else {
                graph.headers.insert(hap.hap_id.clone(), hap);
            }
        }

        graph
    }

    pub fn ranges(&self) -> &[ReferenceRange] {
        &self.ranges
    }

    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.samples.iter().map(|s| s.as_str())
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn num_haplotypes(&self) -> usize {
        self.headers.len()
    }

    /// All haplotypes observed at a range, or `None` when no sample had
    /// coverage there (distinct from "haplotype equals reference").
    pub fn haplotypes_at(&self, range: &ReferenceRange) -> Option<&RangeNode> {
        self.nodes.get(range)
    }

    /// The haplotype a sample carries at a range, if it had coverage.
    pub fn haplotype_of(&self, range: &ReferenceRange, sample: &str) -> Option<&Haplotype> {
        let hap_id = self.nodes.get(range)?.hap_by_sample.get(sample)?;
        self.headers.get(hap_id)
    }

    /// Header metadata by identifier.
    pub fn header(&self, hap_id: &str) -> Option<&Haplotype> {
        self.headers.get(hap_id)
    }

    const MAGIC: &'static [u8] = b"HAPGRph1";

    pub fn save(&self, path: &str) -> io::Result<()> {
        let file = File::create(path)
            .map_err(|e| io::Error::other(format!("Failed to create graph file '{path}': {e}")))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(Self::MAGIC)?;
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| io::Error::other(format!("Failed to encode haplotype graph: {e:?}")))?;
        Ok(())
    }

    pub fn load(path: &str) -> io::Result<Self> {
        let file = File::open(path)
            .map_err(|e| io::Error::other(format!("Failed to open graph file '{path}': {e}")))?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic[..] != Self::MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("'{path}' is not a haplotype graph file"),
            ));
        }
        bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
            .map_err(|e| io::Error::other(format!("Failed to decode haplotype graph: {e:?}")))
    }
}
