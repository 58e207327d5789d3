use crate::cli::{AnalysisArgs, CompetitionArgs, HelicesArgs, ShufflerKind};
use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use transat::engine::config::{self as core_config, DetectionMode};

pub const DEFAULT_MIN_STEM_LENGTH: usize = 8;
pub const DEFAULT_TRIALS: usize = 500;
pub const DEFAULT_SEED_THRESHOLD: f64 = 0.0;
pub const DEFAULT_GROW_THRESHOLD: f64 = -5.0;
pub const DEFAULT_TCOFFEE: &str = "t_coffee";
pub const DEFAULT_SHUFFLER: &str = "rnazRandomizeAln.pl";
pub const DEFAULT_JAVA: &str = "java";

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialDetectionConfig {
    min_stem_length: Option<usize>,
    grow: Option<bool>,
    seed_threshold: Option<f64>,
    grow_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSamplingConfig {
    trials: Option<usize>,
    pvalues: Option<bool>,
    seed: Option<u64>,
    shuffler: Option<String>,
    shuffler_program: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialLikelihoodConfig {
    non_gap_pair: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialOutputConfig {
    header: Option<bool>,
    structure_column: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialExternalConfig {
    tcoffee: Option<PathBuf>,
    java: Option<PathBuf>,
    realigner_classpath: Option<String>,
}

/// The optional `--config` file; every field may be left out.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialAnalysisConfig {
    detection: Option<PartialDetectionConfig>,
    sampling: Option<PartialSamplingConfig>,
    likelihood: Option<PartialLikelihoodConfig>,
    output: Option<PartialOutputConfig>,
    external: Option<PartialExternalConfig>,
}

/// External tools requested on the command line rather than in the file.
#[derive(Debug, Default, Clone)]
pub struct ExternalOverrides {
    pub realign: bool,
    pub tcoffee: Option<PathBuf>,
    pub shuffler: Option<ShufflerKind>,
    pub shuffler_program: Option<PathBuf>,
    pub realign_intervals: bool,
    pub realigner_classpath: Option<String>,
    pub java: Option<PathBuf>,
}

impl ExternalOverrides {
    pub fn for_helices(args: &HelicesArgs) -> Self {
        Self {
            realign: args.realign,
            tcoffee: args.tcoffee.clone(),
            ..Self::default()
        }
    }

    pub fn for_competition(args: &CompetitionArgs) -> Self {
        Self {
            shuffler: args.shuffler,
            shuffler_program: args.shuffler_program.clone(),
            realign_intervals: args.realign_intervals,
            realigner_classpath: args.realigner_classpath.clone(),
            java: args.java.clone(),
            ..Self::default()
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

impl PartialAnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Resolves the final configuration: command line over `-S` over file over defaults.
    pub fn merge_with_cli(
        mut self,
        args: &AnalysisArgs,
        external: &ExternalOverrides,
    ) -> Result<core_config::AnalysisConfig> {
        self.apply_set_values(&args.set_values)?;

        let detection = self.detection.take().unwrap_or_default();
        let sampling = self.sampling.take().unwrap_or_default();
        let likelihood = self.likelihood.take().unwrap_or_default();
        let output = self.output.take().unwrap_or_default();
        let file_external = self.external.take().unwrap_or_default();

        let min_stem_length = args
            .min_stem_length
            .or(detection.min_stem_length)
            .unwrap_or(DEFAULT_MIN_STEM_LENGTH);
        let mode = if args.grow || detection.grow.unwrap_or(false) {
            DetectionMode::Grow {
                seed_threshold: args
                    .seed_threshold
                    .or(detection.seed_threshold)
                    .unwrap_or(DEFAULT_SEED_THRESHOLD),
                grow_threshold: args
                    .grow_threshold
                    .or(detection.grow_threshold)
                    .unwrap_or(DEFAULT_GROW_THRESHOLD),
            }
        } else {
            DetectionMode::Dynamic
        };
        let seed = args.seed.or(sampling.seed).unwrap_or_else(|| {
            let seed = time_seed();
            info!(seed, "No seed given; seeding from the clock.");
            seed
        });

        let mut builder = core_config::AnalysisConfigBuilder::new()
            .min_stem_length(min_stem_length)
            .detection(mode)
            .trials(args.trials.or(sampling.trials).unwrap_or(DEFAULT_TRIALS))
            .compute_pvalues(!args.no_pvalues && sampling.pvalues.unwrap_or(true))
            .non_gap_pair(!args.no_non_gap_pair && likelihood.non_gap_pair.unwrap_or(true))
            .print_headers(!args.no_header && output.header.unwrap_or(true))
            .verbose_structure(!args.no_structure_column && output.structure_column.unwrap_or(true))
            .seed(seed)
            .shuffler(Self::merge_shuffler(external, &sampling)?);

        if external.realign {
            let program = external
                .tcoffee
                .clone()
                .or(file_external.tcoffee)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TCOFFEE));
            builder = builder.tcoffee(program);
        }
        if external.realign_intervals {
            let classpath = external
                .realigner_classpath
                .clone()
                .or(file_external.realigner_classpath)
                .ok_or_else(|| {
                    CliError::Config(
                        "--realign-intervals requires a realigner class path (--realigner-classpath or `external.realigner-classpath`)."
                            .to_string(),
                    )
                })?;
            let java = external
                .java
                .clone()
                .or(file_external.java)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JAVA));
            builder = builder.interval_realigner(core_config::IntervalRealigner { java, classpath });
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_shuffler(
        external: &ExternalOverrides,
        sampling: &PartialSamplingConfig,
    ) -> Result<core_config::Shuffler> {
        let kind = match (external.shuffler, sampling.shuffler.as_deref()) {
            (Some(kind), _) => kind,
            (None, None | Some("uniform")) => ShufflerKind::Uniform,
            (None, Some("external")) => ShufflerKind::External,
            (None, Some(other)) => {
                return Err(CliError::Config(format!(
                    "Unknown shuffler '{}'. Expected 'uniform' or 'external'.",
                    other
                )));
            }
        };
        Ok(match kind {
            ShufflerKind::Uniform => core_config::Shuffler::Uniform,
            ShufflerKind::External => core_config::Shuffler::External {
                program: external
                    .shuffler_program
                    .clone()
                    .or_else(|| sampling.shuffler_program.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SHUFFLER)),
            },
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "detection.min-stem-length" => {
                    self.detection
                        .get_or_insert_with(Default::default)
                        .min_stem_length = Some(parse_value(key, value_str, "integer")?);
                }
                "detection.seed-threshold" => {
                    self.detection
                        .get_or_insert_with(Default::default)
                        .seed_threshold = Some(parse_value(key, value_str, "float")?);
                }
                "detection.grow-threshold" => {
                    self.detection
                        .get_or_insert_with(Default::default)
                        .grow_threshold = Some(parse_value(key, value_str, "float")?);
                }
                "sampling.trials" => {
                    self.sampling.get_or_insert_with(Default::default).trials =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "sampling.seed" => {
                    self.sampling.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "likelihood.non-gap-pair" => {
                    self.likelihood
                        .get_or_insert_with(Default::default)
                        .non_gap_pair = Some(parse_value(key, value_str, "boolean")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn time_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
