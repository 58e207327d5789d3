//! # Engine Module
//!
//! This module implements the analysis engine of Transat: helix detection, the
//! phylogenetic likelihood model, competition statistics and the Monte Carlo null
//! model behind every reported p-value.
//!
//! ## Overview
//!
//! The engine turns an [`AlignmentModel`](crate::core::models::alignment::AlignmentModel)
//! and a phylogeny into scored helices. Work is organised as tasks that share one
//! read-only context per run; randomized alignments are fresh models, so nothing is
//! ever invalidated or updated in place.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters and their builder
//! - **Likelihood** ([`likelihood`]) - Felsenstein pruning over single and paired
//!   substitution models, with per-alignment memoization ([`cache`])
//! - **Metrics** ([`metrics`]) - Column, helix and coverage statistics
//! - **Randomization** ([`shuffle`], [`external`]) - Column shuffles, interval
//!   realignment and the external programs they may delegate to
//! - **Tasks** ([`tasks`]) - Helix detection, competition statistics and both
//!   p-value estimators
//! - **Progress Monitoring** ([`progress`]) - Progress events and cancellation
//! - **Error Handling** ([`error`]) - Engine error type wrapping every input error
//!
//! ## Key Capabilities
//!
//! - **Dynamic-programming and phylogenetic grow-mode** helix detection
//! - **Directional cis/trans/mid scoring** of helices competing with the consensus
//! - **Reproducible Monte Carlo trials** seeded per trial and run in parallel
//! - **Cooperative cancellation** checked between trials

pub(crate) mod cache;
pub mod config;
pub(crate) mod context;
pub mod error;
pub mod external;
pub mod likelihood;
pub mod metrics;
pub mod progress;
pub(crate) mod shuffle;
pub(crate) mod tasks;

/// Log target of warnings that describe a whole run rather than one trial, such as
/// likelihood underflow or an unvalidated realignment setup. Every evaluator raises
/// its own underflow warning, so subscribers may keep only the first per call site.
pub const ADVISORY_TARGET: &str = "transat::advisory";
