use crate::core::models::nucleotide::{PAIR_STATES, SINGLE_STATES};
use nalgebra::{DMatrix, SMatrix, SVector};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const FREQUENCY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid {kind} frequencies: {reason}")]
    InvalidFrequencies { kind: &'static str, reason: String },
    #[error("Invalid rate parameter '{name}': {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// A time-reversible substitution model over `N` states, stored in decomposed form.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutionModel<const N: usize> {
    frequencies: SVector<f64, N>,
    eigenvalues: SVector<f64, N>,
    right: SMatrix<f64, N, N>,
    left: SMatrix<f64, N, N>,
}

impl<const N: usize> SubstitutionModel<N> {
    /// Builds the model `Q_ij = s_ij * pi_j`, scaled to one expected substitution per
    /// unit time.
    ///
    /// `exchangeability` must be symmetric and non-negative; its diagonal is ignored.
    pub fn reversible(
        kind: &'static str,
        frequencies: [f64; N],
        exchangeability: impl Fn(usize, usize) -> f64,
    ) -> Result<Self, ModelError> {
        check_frequencies(kind, &frequencies)?;

        let mut rates = DMatrix::<f64>::zeros(N, N);
        for i in 0..N {
            for j in 0..N {
                if i != j {
                    rates[(i, j)] = exchangeability(i, j) * frequencies[j];
                }
            }
            let outflow: f64 = rates.row(i).sum();
            rates[(i, i)] = -outflow;
        }
        let mean_rate: f64 = (0..N).map(|i| -frequencies[i] * rates[(i, i)]).sum();
        if !(mean_rate > 0.0) {
            return Err(ModelError::InvalidRate {
                name: "mean substitution rate",
                value: mean_rate,
            });
        }
        rates /= mean_rate;

        // D^1/2 Q D^-1/2 is symmetric for a reversible chain.
        let sqrt_pi: Vec<f64> = frequencies.iter().map(|p| p.sqrt()).collect();
        let symmetric =
            DMatrix::from_fn(N, N, |i, j| rates[(i, j)] * sqrt_pi[i] / sqrt_pi[j]);
        let eigen = symmetric.symmetric_eigen();

        Ok(Self {
            frequencies: SVector::from_fn(|i, _| frequencies[i]),
            eigenvalues: SVector::from_fn(|k, _| eigen.eigenvalues[k]),
            right: SMatrix::from_fn(|i, k| eigen.eigenvectors[(i, k)] / sqrt_pi[i]),
            left: SMatrix::from_fn(|k, j| eigen.eigenvectors[(j, k)] * sqrt_pi[j]),
        })
    }

    /// Stationary distribution.
    pub fn frequencies(&self) -> &SVector<f64, N> {
        &self.frequencies
    }

    /// Transition probabilities `P(i -> j)` along a branch of length `t`.
    pub fn transition(&self, t: f64) -> SMatrix<f64, N, N> {
        let decay: Vec<f64> = self.eigenvalues.iter().map(|l| (l * t).exp()).collect();
        SMatrix::from_fn(|i, j| {
            let p: f64 = (0..N)
                .map(|k| self.right[(i, k)] * decay[k] * self.left[(k, j)])
                .sum();
            p.max(0.0)
        })
    }
}

fn check_frequencies(kind: &'static str, frequencies: &[f64]) -> Result<(), ModelError> {
    if let Some(bad) = frequencies.iter().find(|f| !(**f > 0.0)) {
        return Err(ModelError::InvalidFrequencies {
            kind,
            reason: format!("every frequency must be positive, found {bad}"),
        });
    }
    let total: f64 = frequencies.iter().sum();
    if (total - 1.0).abs() > FREQUENCY_TOLERANCE {
        return Err(ModelError::InvalidFrequencies {
            kind,
            reason: format!("frequencies sum to {total}, expected 1"),
        });
    }
    Ok(())
}

/// Parameters of the single and pair models, overridable from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct EvolutionParams {
    /// Stationary frequencies of A, U, G, C.
    pub single_frequencies: [f64; SINGLE_STATES],
    /// Transition/transversion rate ratio of the single model.
    pub single_kappa: f64,
    /// Stationary frequencies of the 16 ordered base pairs.
    pub pair_frequencies: [f64; PAIR_STATES],
    /// Transition/transversion rate ratio for a single-base change within a pair.
    pub pair_kappa: f64,
    /// Relative rate of substitutions that change both bases at once.
    pub double_change_rate: f64,
}

impl Default for EvolutionParams {
    /// Built-in placeholder parameters: uniform single frequencies, pair mass
    /// concentrated on canonical pairs, and round kappa and double-change rates.
    /// They are not fitted to any RNA family. Supply measured values through a
    /// model TOML file (see [`EvolutionModel::load`]) for production runs.
    fn default() -> Self {
        // Pair states in A, U, G, C order; canonical pairs carry 90% of the mass.
        let mut pair_frequencies = [0.01; PAIR_STATES];
        pair_frequencies[1] = 0.16; // AU
        pair_frequencies[4] = 0.16; // UA
        pair_frequencies[11] = 0.22; // GC
        pair_frequencies[14] = 0.22; // CG
        pair_frequencies[9] = 0.08; // GU
        pair_frequencies[6] = 0.06; // UG
        Self {
            single_frequencies: [0.25; SINGLE_STATES],
            single_kappa: 2.0,
            pair_frequencies,
            pair_kappa: 2.0,
            double_change_rate: 0.5,
        }
    }
}

/// A <-> G and U <-> C.
#[inline]
fn is_transition(a: usize, b: usize) -> bool {
    matches!((a, b), (0, 2) | (2, 0) | (1, 3) | (3, 1))
}

/// The paired and unpaired substitution models used for every likelihood query.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionModel {
    single: SubstitutionModel<SINGLE_STATES>,
    pair: SubstitutionModel<PAIR_STATES>,
}

impl EvolutionModel {
    pub fn standard() -> Result<Self, ModelError> {
        Self::from_params(&EvolutionParams::default())
    }

    pub fn from_params(params: &EvolutionParams) -> Result<Self, ModelError> {
        for (name, value) in [
            ("single-kappa", params.single_kappa),
            ("pair-kappa", params.pair_kappa),
            ("double-change-rate", params.double_change_rate),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ModelError::InvalidRate { name, value });
            }
        }

        let single_kappa = params.single_kappa;
        let single = SubstitutionModel::reversible("single", params.single_frequencies, |a, b| {
            if is_transition(a, b) { single_kappa } else { 1.0 }
        })?;

        let pair_kappa = params.pair_kappa;
        let double_rate = params.double_change_rate;
        let pair = SubstitutionModel::reversible("pair", params.pair_frequencies, |x, y| {
            let (x5, x3) = (x / SINGLE_STATES, x % SINGLE_STATES);
            let (y5, y3) = (y / SINGLE_STATES, y % SINGLE_STATES);
            match (x5 != y5, x3 != y3) {
                (true, true) => double_rate,
                (true, false) if is_transition(x5, y5) => pair_kappa,
                (false, true) if is_transition(x3, y3) => pair_kappa,
                (true, false) | (false, true) => 1.0,
                (false, false) => 0.0,
            }
        })?;

        Ok(Self { single, pair })
    }

    /// Reads [`EvolutionParams`] from a TOML file; omitted keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let params: EvolutionParams = toml::from_str(&content).map_err(|e| ModelError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_params(&params)
    }

    pub fn single(&self) -> &SubstitutionModel<SINGLE_STATES> {
        &self.single
    }

    pub fn pair(&self) -> &SubstitutionModel<PAIR_STATES> {
        &self.pair
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const EPS: f64 = 1e-9;

    #[test]
    fn transition_at_zero_is_identity() {
        let model = EvolutionModel::standard().unwrap();
        let p = model.single().transition(0.0);
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((p[(i, j)] - expected).abs() < EPS);
            }
        }
    }

    #[test]
    fn transition_rows_sum_to_one() {
        let model = EvolutionModel::standard().unwrap();
        let single = model.single().transition(0.3);
        let pair = model.pair().transition(0.3);
        for i in 0..4 {
            assert!((single.row(i).sum() - 1.0).abs() < EPS);
        }
        for i in 0..16 {
            assert!((pair.row(i).sum() - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn stationary_distribution_is_preserved() {
        let model = EvolutionModel::standard().unwrap();
        let pair = model.pair();
        let p = pair.transition(0.7);
        let pi = pair.frequencies();
        for j in 0..16 {
            let flowed: f64 = (0..16).map(|i| pi[i] * p[(i, j)]).sum();
            assert!((flowed - pi[j]).abs() < 1e-8);
        }
    }

    #[test]
    fn long_branches_converge_to_frequencies() {
        let model = EvolutionModel::standard().unwrap();
        let p = model.pair().transition(5000.0);
        let pi = model.pair().frequencies();
        for i in 0..16 {
            for j in 0..16 {
                assert!((p[(i, j)] - pi[j]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn transitions_are_faster_than_transversions() {
        let model = EvolutionModel::standard().unwrap();
        let p = model.single().transition(0.1);
        // A -> G versus A -> U
        assert!(p[(0, 2)] > p[(0, 1)]);
    }

    #[test]
    fn invalid_frequencies_are_rejected() {
        let params = EvolutionParams {
            single_frequencies: [0.5, 0.5, 0.5, 0.5],
            ..EvolutionParams::default()
        };
        assert!(matches!(
            EvolutionModel::from_params(&params),
            Err(ModelError::InvalidFrequencies { kind: "single", .. })
        ));
    }

    #[test]
    fn negative_rate_is_rejected() {
        let params = EvolutionParams {
            double_change_rate: -1.0,
            ..EvolutionParams::default()
        };
        assert!(matches!(
            EvolutionModel::from_params(&params),
            Err(ModelError::InvalidRate {
                name: "double-change-rate",
                ..
            })
        ));
    }

    #[test]
    fn load_overrides_selected_parameters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        fs::write(
            &path,
            "single-kappa = 4.0\nsingle-frequencies = [0.3, 0.2, 0.3, 0.2]\n",
        )
        .unwrap();
        let model = EvolutionModel::load(&path).unwrap();
        assert!((model.single().frequencies()[0] - 0.3).abs() < EPS);
        assert_eq!(model.pair(), EvolutionModel::standard().unwrap().pair());
    }

    #[test]
    fn load_replaces_the_placeholder_pair_parameters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        let frequencies = vec!["0.0625"; PAIR_STATES].join(", ");
        fs::write(
            &path,
            format!(
                "pair-frequencies = [{frequencies}]\npair-kappa = 3.0\ndouble-change-rate = 0.1\n"
            ),
        )
        .unwrap();
        let model = EvolutionModel::load(&path).unwrap();
        assert!(model.pair().frequencies().iter().all(|&f| (f - 0.0625).abs() < EPS));
        assert_ne!(model.pair(), EvolutionModel::standard().unwrap().pair());
        assert_eq!(model.single(), EvolutionModel::standard().unwrap().single());
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        fs::write(&path, "kappa = 4.0\n").unwrap();
        assert!(matches!(EvolutionModel::load(&path), Err(ModelError::Toml { .. })));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(matches!(EvolutionModel::load(&path), Err(ModelError::Io { .. })));
    }
}
