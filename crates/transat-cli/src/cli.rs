use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Nicholas P. Wiebe, Irmtraud M. Meyer",
    version,
    about = "Transat CLI - detection of conserved and transient helices in RNA alignments, with phylogenetic p-values for helices competing with the consensus structure.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find all helices and estimate their p-values against shuffled alignments.
    Helices(HelicesArgs),
    /// Score the helices competing with each consensus helix against its own null model.
    Competition(CompetitionArgs),
    /// Write the sparse feature table of every candidate column pair.
    BpTable(BpTableArgs),
    /// Report the fraction of the consensus structure recovered by the detected helices.
    Coverage(CoverageArgs),
    /// Simulate an alignment down a tree for a given consensus structure.
    Simulate(SimulateArgs),
}

/// Alignment, structure and model inputs shared by every analysis.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Gapped FASTA alignment; by default its last record is the consensus structure.
    #[arg(long, required = true, value_name = "PATH")]
    pub fasta: PathBuf,

    /// Read the consensus structure from a CT file instead of the FASTA alignment.
    #[arg(long, value_name = "PATH", conflicts_with = "no_struct")]
    pub ct: Option<PathBuf>,

    /// The FASTA alignment carries no structure record; analyse without a consensus.
    #[arg(long)]
    pub no_struct: bool,

    /// Newick tree whose leaves name the aligned sequences.
    #[arg(long, required = true, value_name = "PATH")]
    pub tree: PathBuf,

    /// Nearest-neighbour stacking energy table (256 values).
    #[arg(long, value_name = "PATH")]
    pub stacking: Option<PathBuf>,

    /// TOML file overriding the substitution model parameters.
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Analysis configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the table to this file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Analysis settings; each overrides the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct AnalysisArgs {
    /// Helices must be longer than this many stacked pairs.
    #[arg(long, value_name = "INT")]
    pub min_stem_length: Option<usize>,

    /// Number of randomized alignments sampled for the null distribution.
    #[arg(long = "randomize", value_name = "INT")]
    pub trials: Option<usize>,

    /// Skip the null distribution; the p-value columns are filled with zeros.
    #[arg(long)]
    pub no_pvalues: bool,

    /// Grow helices from phylogenetic seeds instead of the per-sequence search.
    #[arg(long)]
    pub grow: bool,

    /// Minimum per-tree-length log-odds of a seed pair in grow mode.
    #[arg(long, value_name = "FLOAT", requires = "grow", allow_negative_numbers = true)]
    pub seed_threshold: Option<f64>,

    /// Minimum per-tree-length log-odds of a pair extending a seed in grow mode.
    #[arg(long, value_name = "FLOAT", requires = "grow", allow_negative_numbers = true)]
    pub grow_threshold: Option<f64>,

    /// Treat a gap opposite a base as unpaired evidence instead of missing data.
    #[arg(long)]
    pub no_non_gap_pair: bool,

    /// Print "0" instead of the dot-bracket string of each helix.
    #[arg(long)]
    pub no_structure_column: bool,

    /// Omit the table header.
    #[arg(long)]
    pub no_header: bool,

    /// Base seed of every random stream; a run is reproducible for a fixed seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sampling.trials=100
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `helices` subcommand.
#[derive(Args, Debug)]
pub struct HelicesArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Realign the sequences with T-Coffee before shuffling.
    #[arg(long)]
    pub realign: bool,

    /// T-Coffee executable used by --realign.
    #[arg(long, value_name = "PATH", requires = "realign")]
    pub tcoffee: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShufflerKind {
    /// Permute whole columns uniformly at random.
    Uniform,
    /// Delegate to an external stratified shuffler reading and writing ClustalW.
    External,
}

/// Arguments for the `competition` subcommand.
#[derive(Args, Debug)]
pub struct CompetitionArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Column shuffling strategy for the randomized alignments.
    #[arg(long, value_enum)]
    pub shuffler: Option<ShufflerKind>,

    /// External shuffler executable (default: rnazRandomizeAln.pl).
    #[arg(long, value_name = "PATH")]
    pub shuffler_program: Option<PathBuf>,

    /// Realign the intervals between the held-fixed helix columns before shuffling.
    #[arg(long)]
    pub realign_intervals: bool,

    /// Java class path containing the interval realigner.
    #[arg(long, value_name = "CLASSPATH")]
    pub realigner_classpath: Option<String>,

    /// Java executable used by --realign-intervals.
    #[arg(long, value_name = "PATH")]
    pub java: Option<PathBuf>,
}

/// Arguments for the `bp-table` subcommand.
#[derive(Args, Debug)]
pub struct BpTableArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Arguments for the `coverage` subcommand.
#[derive(Args, Debug)]
pub struct CoverageArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Arguments for the `simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Newick tree; one sequence is simulated per leaf.
    #[arg(long, required = true, value_name = "PATH")]
    pub tree: PathBuf,

    /// Consensus structure in dot-bracket notation.
    #[arg(long, required = true, value_name = "DOT_BRACKET")]
    pub structure: String,

    /// TOML file overriding the substitution model parameters.
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Do not append the structure record to the FASTA output.
    #[arg(long)]
    pub no_struct: bool,

    /// Write the alignment to this file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
