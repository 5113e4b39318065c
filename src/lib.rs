// lib.rs
pub mod classify;
pub mod faidx;
pub mod graph;
pub mod gvcf;
pub mod haplotype;
pub mod merge;
pub mod pipeline;
pub mod position;
pub mod resize;
pub mod variant;
