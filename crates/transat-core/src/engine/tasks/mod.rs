//! Computational units of an analysis run.
//!
//! Each task takes the shared [`AnalysisContext`](super::context::AnalysisContext)
//! plus the alignment it should work on, so the same code serves the observed
//! alignment and every randomized copy. Per-sequence and per-trial work is spread
//! over the rayon pool when the `parallel` feature is enabled; results are always
//! merged in sequence or trial order.

pub mod competition;
pub mod helix_detection;
pub mod null_distribution;
pub mod true_helix_pvalues;
