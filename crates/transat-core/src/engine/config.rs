use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How helices are enumerated from the alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionMode {
    /// Per-sequence dynamic programming over canonical pairs.
    Dynamic,
    /// Phylogenetic seed-and-grow over column pairs, thresholds on the log-odds
    /// divided by the tree length.
    Grow {
        seed_threshold: f64,
        grow_threshold: f64,
    },
}

/// Column shuffling strategy for randomized alignments.
#[derive(Debug, Clone, PartialEq)]
pub enum Shuffler {
    Uniform,
    /// A program reading a ClustalW file argument and writing the shuffled
    /// alignment as ClustalW on stdout.
    External { program: PathBuf },
}

/// External realigner applied to the intervals between held-fixed helix columns.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRealigner {
    pub java: PathBuf,
    pub classpath: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub min_stem_length: usize,
    pub detection: DetectionMode,
    pub trials: usize,
    pub compute_pvalues: bool,
    pub non_gap_pair: bool,
    pub print_headers: bool,
    pub verbose_structure: bool,
    pub seed: u64,
    pub shuffler: Shuffler,
    /// T-Coffee executable used to realign the whole alignment before all-helices
    /// shuffling.
    pub tcoffee: Option<PathBuf>,
    pub interval_realigner: Option<IntervalRealigner>,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    min_stem_length: Option<usize>,
    detection: Option<DetectionMode>,
    trials: Option<usize>,
    compute_pvalues: Option<bool>,
    non_gap_pair: Option<bool>,
    print_headers: Option<bool>,
    verbose_structure: Option<bool>,
    seed: Option<u64>,
    shuffler: Option<Shuffler>,
    tcoffee: Option<PathBuf>,
    interval_realigner: Option<IntervalRealigner>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_stem_length(mut self, length: usize) -> Self {
        self.min_stem_length = Some(length);
        self
    }
    pub fn detection(mut self, mode: DetectionMode) -> Self {
        self.detection = Some(mode);
        self
    }
    pub fn trials(mut self, trials: usize) -> Self {
        self.trials = Some(trials);
        self
    }
    pub fn compute_pvalues(mut self, enabled: bool) -> Self {
        self.compute_pvalues = Some(enabled);
        self
    }
    pub fn non_gap_pair(mut self, enabled: bool) -> Self {
        self.non_gap_pair = Some(enabled);
        self
    }
    pub fn print_headers(mut self, enabled: bool) -> Self {
        self.print_headers = Some(enabled);
        self
    }
    pub fn verbose_structure(mut self, enabled: bool) -> Self {
        self.verbose_structure = Some(enabled);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn shuffler(mut self, shuffler: Shuffler) -> Self {
        self.shuffler = Some(shuffler);
        self
    }
    pub fn tcoffee(mut self, program: PathBuf) -> Self {
        self.tcoffee = Some(program);
        self
    }
    pub fn interval_realigner(mut self, realigner: IntervalRealigner) -> Self {
        self.interval_realigner = Some(realigner);
        self
    }

    /// Assembles the configuration.
    ///
    /// The minimum stem length and the seed have no default and must be given; all
    /// toggles default to the behaviour of a plain all-helices run.
    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let min_stem_length = self
            .min_stem_length
            .ok_or(ConfigError::MissingParameter("min_stem_length"))?;
        if min_stem_length == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "min_stem_length",
                reason: "must be at least 1".into(),
            });
        }
        let detection = self.detection.unwrap_or(DetectionMode::Dynamic);
        if let DetectionMode::Grow {
            seed_threshold,
            grow_threshold,
        } = detection
        {
            if !seed_threshold.is_finite() || !grow_threshold.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name: "detection",
                    reason: "grow thresholds must be finite".into(),
                });
            }
        }
        let compute_pvalues = self.compute_pvalues.unwrap_or(true);
        let trials = self.trials.unwrap_or(0);
        if compute_pvalues && trials == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "trials",
                reason: "p-values require at least one trial".into(),
            });
        }
        Ok(AnalysisConfig {
            min_stem_length,
            detection,
            trials,
            compute_pvalues,
            non_gap_pair: self.non_gap_pair.unwrap_or(true),
            print_headers: self.print_headers.unwrap_or(true),
            verbose_structure: self.verbose_structure.unwrap_or(true),
            seed: self.seed.ok_or(ConfigError::MissingParameter("seed"))?,
            shuffler: self.shuffler.unwrap_or(Shuffler::Uniform),
            tcoffee: self.tcoffee,
            interval_realigner: self.interval_realigner,
        })
    }
}
