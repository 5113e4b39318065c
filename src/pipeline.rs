//! Per-sample processing pipeline and the parallel build driver.
//!
//! One sample is the unit of parallelism: each work item runs the full
//! classify -> resize -> merge -> build sequence to completion on the global
//! rayon pool. The fold into the graph is single-threaded and happens after
//! all workers finish.

use crate::classify::sweep_variants;
use crate::faidx::{FastaIndex, RefGenome, SequenceSource};
use crate::graph::HaplotypeGraph;
use crate::gvcf::parse_gvcf_file;
use crate::haplotype::{build_haplotypes, Haplotype, HaplotypeMetadata};
use crate::position::{validate_ranges, ReferenceRange};
use crate::resize::bucket_to_spans;
use log::{error, info};
use rayon::prelude::*;
use std::io;

/// One work item: a sample with its variant stream and assembly sequences.
#[derive(Debug, Clone)]
pub struct SampleSource {
    pub name: String,
    pub gvcf_path: String,
    pub assembly_path: String,
}

/// Run the whole pipeline for one sample: parse its variant stream, sweep it
/// against the range list, clip and merge each bucket into assembly spans,
/// then extract sequences and hash them into haplotype records.
pub fn process_sample(
    sample: &SampleSource,
    ranges: &[ReferenceRange],
    genome: &RefGenome,
    source: &dyn SequenceSource,
) -> io::Result<Vec<Haplotype>> {
    let variants = parse_gvcf_file(&sample.gvcf_path)?;
    info!(
        "Sample {}: {} variant records",
        sample.name,
        variants.len()
    );

    let buckets = sweep_variants(ranges, &variants);

    let mut metadata = Vec::with_capacity(buckets.len());
    for bucket in &buckets {
        let range = &ranges[bucket.range_index];
        let spans = bucket_to_spans(range, &bucket.variants).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Sample {}: {}", sample.name, e),
            )
        })?;
        metadata.push(HaplotypeMetadata {
            sample: sample.name.clone(),
            range: range.clone(),
            spans,
            sequence: None,
        });
    }

    let haplotypes = build_haplotypes(metadata, genome, source)?;
    info!(
        "Sample {}: {} haplotypes over {} ranges",
        sample.name,
        haplotypes.len(),
        ranges.len()
    );
    Ok(haplotypes)
}

/// Build the haplotype graph for a set of samples.
///
/// Range overlap is a configuration error checked up front. Samples run in
/// parallel; a failing sample is dropped with an error log and does not
/// abort the others. The run only fails outright when configuration is bad
/// or every sample failed.
pub fn build_graph(
    ranges: Vec<ReferenceRange>,
    samples: &[SampleSource],
    reference_path: &str,
) -> io::Result<HaplotypeGraph> {
    validate_ranges(&ranges)?;
    info!("Validated {} reference ranges", ranges.len());

    let genome = RefGenome::from_fasta(reference_path)?;

    let assembly_paths: Vec<String> = samples.iter().map(|s| s.assembly_path.clone()).collect();
    let assemblies = FastaIndex::build_from_files(&assembly_paths)?;

    let results: Vec<(String, io::Result<Vec<Haplotype>>)> = samples
        .par_iter()
        .map(|sample| {
            let result = process_sample(sample, &ranges, &genome, &assemblies);
            (sample.name.clone(), result)
        })
        .collect();

    // Single-threaded fold after the synchronization barrier
    let mut all_haplotypes = Vec::new();
    let mut failed = 0usize;
    for (name, result) in results {
        match result {
            Ok(haplotypes) => all_haplotypes.extend(haplotypes),
            Err(e) => {
                failed += 1;
                error!("Dropping sample {}: {}", name, e);
            }
        }
    }

    if failed == samples.len() && !samples.is_empty() {
        return Err(io::Error::other(format!(
            "All {} samples failed; no graph built",
            failed
        )));
    }

    info!(
        "Folding {} haplotype records from {} samples ({} dropped)",
        all_haplotypes.len(),
        samples.len() - failed,
        failed
    );
    Ok(HaplotypeGraph::from_haplotypes(ranges, all_haplotypes))
}
