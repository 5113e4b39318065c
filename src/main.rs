use clap::Parser;
use hapanchor::graph::HaplotypeGraph;
use hapanchor::pipeline::{build_graph, SampleSource};
use hapanchor::position::{parse_ranges_bed, ReferenceRange};
use log::info;
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::num::NonZeroUsize;

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Number of threads for parallel processing.
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(4).unwrap())]
    num_threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

/// Command-line tool for building and querying haplotype graphs from
/// per-assembly alignment calls.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Build the haplotype graph from per-sample gVCF files
    Build {
        #[clap(flatten)]
        common: CommonOpts,

        /// BED file of reference ranges (sorted, non-overlapping)
        #[clap(short = 'b', long, value_parser)]
        ranges: String,

        /// Reference genome FASTA
        #[clap(short = 'r', long, value_parser)]
        reference: String,

        /// Sample keyfile: one sample per line, tab-separated
        /// `name<TAB>gvcf_path<TAB>assembly_fasta_path`
        #[clap(short = 's', long, value_parser)]
        samples: String,

        /// Output graph file
        #[clap(short = 'o', long, value_parser)]
        output: String,
    },
    /// Query haplotypes in a built graph
    Query {
        #[clap(flatten)]
        common: CommonOpts,

        /// Path to the graph file produced by `build`
        #[clap(short = 'g', long, value_parser)]
        graph: String,

        /// Target range in the format `seq_name:start-end` (1-based inclusive)
        #[clap(short = 'r', long, value_parser)]
        region: String,

        /// Restrict output to one sample
        #[clap(short = 's', long, value_parser)]
        sample: Option<String>,
    },
    /// Print graph statistics
    Stats {
        #[clap(flatten)]
        common: CommonOpts,

        /// Path to the graph file produced by `build`
        #[clap(short = 'g', long, value_parser)]
        graph: String,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Build {
            common,
            ranges,
            reference,
            samples,
            output,
        } => {
            initialize(&common);
            let ranges = parse_ranges_bed(&ranges)?;
            let samples = parse_sample_keyfile(&samples)?;
            info!(
                "Building graph over {} ranges from {} samples",
                ranges.len(),
                samples.len()
            );
            let graph = build_graph(ranges, &samples, &reference)?;
            graph.save(&output)?;
            info!(
                "Wrote graph with {} haplotypes across {} samples to {}",
                graph.num_haplotypes(),
                graph.num_samples(),
                output
            );
        }
        Args::Query {
            common,
            graph,
            region,
            sample,
        } => {
            initialize(&common);
            let graph = HaplotypeGraph::load(&graph)?;
            let (target_name, (start, end)) = parse_target_range(&region)?;

            let range = graph
                .ranges()
                .iter()
                .find(|r| r.contig == target_name && r.start <= start && r.end >= end)
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("No reference range contains {region}"),
                    )
                })?;

            print_range(&graph, range, sample.as_deref());
        }
        Args::Stats { common, graph } => {
            initialize(&common);
            let graph = HaplotypeGraph::load(&graph)?;
            print_stats(&graph);
        }
    }

    Ok(())
}

/// Initialize logger and thread pool based on common options
fn initialize(common: &CommonOpts) {
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    ThreadPoolBuilder::new()
        .num_threads(common.num_threads.into())
        .build_global()
        .unwrap();
}

/// Parse a sample keyfile: `name<TAB>gvcf<TAB>assembly_fasta` per line.
fn parse_sample_keyfile(path: &str) -> io::Result<Vec<SampleSource>> {
    let file = File::open(path)
        .map_err(|e| io::Error::other(format!("Failed to open sample keyfile '{path}': {e}")))?;
    let reader = BufReader::new(file);

    let mut samples = Vec::new();
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
                    "Keyfile line {} needs 3 tab-separated fields (name, gvcf, assembly)",
                    line_num + 1
                ),
            ));
        }
        samples.push(SampleSource {
            name: fields[0].to_string(),
            gvcf_path: fields[1].to_string(),
            assembly_path: fields[2].to_string(),
        });
    }

    if samples.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Sample keyfile '{path}' contains no samples"),
        ));
    }
    Ok(samples)
}

fn parse_target_range(target_range: &str) -> io::Result<(String, (i64, i64))> {
    let parts: Vec<&str> = target_range.rsplitn(2, ':').collect();
    if parts.len() != 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Target range format should be `seq_name:start-end`",
        ));
    }

    let (range_part, target_name) = (parts[0], parts[1]);
    let range: Vec<&str> = range_part.split('-').collect();
    if range.len() != 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Target range format should be `seq_name:start-end`",
        ));
    }

    let start = range[0]
        .parse::<i64>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid start value"))?;
    let end = range[1]
        .parse::<i64>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid end value"))?;

    if start >= end {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid range: start ({start}) must be less than end ({end})"),
        ));
    }

    Ok((target_name.to_string(), (start, end)))
}

fn print_range(graph: &HaplotypeGraph, range: &ReferenceRange, sample: Option<&str>) {
    println!("range\thap_id\tsamples\tspans\tref_checksum");

    let Some(node) = graph.haplotypes_at(range) else {
        return; // absent: no sample had coverage here
    };

    match sample {
        Some(sample) => {
            if let Some(hap) = graph.haplotype_of(range, sample) {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    range.id(),
                    hap.hap_id,
                    sample,
                    hap.spans_field(),
                    hap.ref_checksum
                );
            }
        }
        None => {
            for (hap_id, samples) in &node.samples_by_hap {
                let header = graph.header(hap_id);
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    range.id(),
                    hap_id,
                    samples.iter().cloned().collect::<Vec<_>>().join(","),
                    header.map(|h| h.spans_field()).unwrap_or_default(),
                    header.map(|h| h.ref_checksum.as_str()).unwrap_or("")
                );
            }
        }
    }
}

fn print_stats(graph: &HaplotypeGraph) {
    let covered = graph
        .ranges()
        .iter()
        .filter(|r| graph.haplotypes_at(r).is_some())
        .count();
    let distinct_total: usize = graph
        .ranges()
        .iter()
        .filter_map(|r| graph.haplotypes_at(r))
        .map(|node| node.samples_by_hap.len())
        .sum();

    println!("Reference ranges: {}", graph.ranges().len());
    println!("Covered ranges: {}", covered);
    println!("Samples: {}", graph.num_samples());
    println!("Distinct haplotypes: {}", graph.num_haplotypes());
    if covered > 0 {
        println!(
            "Mean haplotypes per covered range: {:.2}",
            distinct_total as f64 / covered as f64
        );
    }
}
