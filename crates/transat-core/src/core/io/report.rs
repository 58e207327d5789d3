use serde::{Serialize, Serializer};
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

fn as_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

pub const HELIX_TABLE_HEADER: [&str; 29] = [
    "Pvalue",
    "LogLikeRatio",
    "PairedLogLikelihood",
    "UnpairedLogLikelihood",
    "MeanFracCanonicalBP",
    "Covariance",
    "Conservation",
    "Length",
    "Midpoint",
    "NormalizedMidpoint",
    "Appearances",
    "IsConsensusHelix",
    "IsPartialConsensusHelix",
    "IsCompetingHelix",
    "ConsensusBps",
    "Structure",
    "AlignmentSize",
    "AlignmentLength",
    "TreeLength",
    "Bps",
    "Cis",
    "Trans",
    "Cis5",
    "Cis3",
    "Trans5",
    "Trans3",
    "Mid5",
    "Mid3",
    "newPvalue",
];

/// One row of the all-helices table; field order matches [`HELIX_TABLE_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelixRow {
    pub pvalue: f64,
    pub log_like_ratio: f64,
    pub paired_log_likelihood: f64,
    pub unpaired_log_likelihood: f64,
    pub mean_frac_canonical_bp: f64,
    pub covariance: f64,
    pub conservation: f64,
    pub length: usize,
    pub midpoint: f64,
    pub normalized_midpoint: f64,
    pub appearances: usize,
    #[serde(serialize_with = "as_flag")]
    pub is_consensus_helix: bool,
    #[serde(serialize_with = "as_flag")]
    pub is_partial_consensus_helix: bool,
    #[serde(serialize_with = "as_flag")]
    pub is_competing_helix: bool,
    pub consensus_bps: usize,
    pub structure: String,
    pub alignment_size: usize,
    pub alignment_length: usize,
    pub tree_length: f64,
    pub bps: String,
    pub cis: f64,
    pub trans: f64,
    pub cis5: f64,
    pub cis3: f64,
    pub trans5: f64,
    pub trans3: f64,
    pub mid5: f64,
    pub mid3: f64,
    pub new_pvalue: f64,
}

pub const COMPETITION_TABLE_HEADER: [&str; 18] = [
    "p-value",
    "Log Likelihood",
    "sequence index",
    "true helix",
    "competing helix",
    "cis3",
    "cis5",
    "trans3",
    "trans5",
    "mid3",
    "mid5",
    "midpoint",
    "structure",
    "%consensusBP",
    "%noGapConsensusBP",
    "%gaps",
    "seqCons",
    "Covariance",
];

/// One row of the per-true-helix competition table; field order matches
/// [`COMPETITION_TABLE_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitionRow {
    pub pvalue: f64,
    pub log_likelihood: f64,
    pub sequence_index: usize,
    pub true_helix: usize,
    pub competing_helix: usize,
    pub cis3: f64,
    pub cis5: f64,
    pub trans3: f64,
    pub trans5: f64,
    pub mid3: f64,
    pub mid5: f64,
    pub midpoint: f64,
    pub structure: String,
    pub consensus_bp: f64,
    pub no_gap_consensus_bp: f64,
    pub gaps: f64,
    pub seq_cons: f64,
    pub covariance: f64,
}

/// Writes `rows` as a tab-separated table, preceded by `header` when requested.
///
/// The header is written even when there are no rows.
pub fn write_table<T: Serialize>(
    rows: &[T],
    header: &[&str],
    print_header: bool,
    writer: impl Write,
) -> Result<(), ReportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);
    if print_header {
        csv_writer.write_record(header)?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// One candidate pair of the sparse base-pair feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct BpFeatureRow {
    /// Whether the pair belongs to the consensus structure.
    pub paired: bool,
    /// 1-based feature index and value, in increasing index order.
    pub features: Vec<(usize, f64)>,
}

/// Sparse `+1 1:v 2:v ...` rows.
pub fn write_sparse_table(rows: &[BpFeatureRow], mut writer: impl Write) -> Result<(), ReportError> {
    for row in rows {
        write!(writer, "{}", if row.paired { "+1" } else { "-1" })?;
        for (index, value) in &row.features {
            write!(writer, " {index}:{value}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
