//! Configuration models for revisio.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file; every
//! section is optional and falls back to the published experiment values.

use super::{Result, RevisionError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters of one experimental condition.
///
/// K_i: Never mutated once built; shared read-only by every chain of the condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Probability of an additive move when both move kinds are possible
    pub p_add: f64,

    /// Chain length
    pub steps: usize,

    /// Tempering factor applied to the log-posterior delta
    pub temperature: f64,

    /// Independent chains per trial
    pub num_chains: usize,
}

impl ExperimentConfig {
    /// Build and validate a condition from raw (possibly negative) values.
    pub fn new(p_add: f64, steps: i64, temperature: f64, num_chains: i64) -> Result<Self> {
        let steps = usize::try_from(steps)
            .map_err(|_| RevisionError::invalid_config(format!("steps must be >= 0, got {steps}")))?;
        let num_chains = usize::try_from(num_chains).map_err(|_| {
            RevisionError::invalid_config(format!("num_chains must be >= 0, got {num_chains}"))
        })?;
        let config = Self {
            p_add,
            steps,
            temperature,
            num_chains,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the float parameters.
    ///
    /// B_i(temperature > 0) → otherwise the acceptance ratio is undefined
    /// B_i(p_add ∈ [0, 1])
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(RevisionError::invalid_config(format!(
                "temperature must be a finite value > 0, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.p_add) {
            return Err(RevisionError::invalid_config(format!(
                "p_add must lie in [0, 1], got {}",
                self.p_add
            )));
        }
        Ok(())
    }

    /// Condition label used in chain records.
    pub fn label(&self) -> String {
        format!(
            "p_add={}_steps={}_temp={}",
            self.p_add, self.steps, self.temperature
        )
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base seed; every chain's stream is derived from it
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub pool: PoolConfig,

    /// Values held fixed while another parameter is swept
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Proposal-bias sweep
    #[serde(default = "default_cueing")]
    pub cueing: SweepAxis<f64>,

    /// Chain-length sweep
    #[serde(default = "default_cog_steps")]
    pub cog_steps: SweepAxis<i64>,

    /// Temperature sweep
    #[serde(default = "default_cog_temp")]
    pub cog_temp: SweepAxis<f64>,

    #[serde(default)]
    pub fit: FitConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 0,
            pool: PoolConfig::default(),
            defaults: DefaultsConfig::default(),
            baseline: BaselineConfig::default(),
            cueing: default_cueing(),
            cog_steps: default_cog_steps(),
            cog_temp: default_cog_temp(),
            fit: FitConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Chain pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum concurrently running chain batches
    #[serde(default = "default_pool_size")]
    pub size: usize,
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
        }
    }
}

/// Default condition values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_p_add")]
    pub p_add: f64,

    #[serde(default = "default_steps")]
    pub steps: i64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_p_add() -> f64 {
    0.5
}

fn default_steps() -> i64 {
    500
}

fn default_temperature() -> f64 {
    1.0
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            p_add: default_p_add(),
            steps: default_steps(),
            temperature: default_temperature(),
        }
    }
}

/// Baseline run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    #[serde(default = "default_baseline_chains")]
    pub num_chains: i64,
}

fn default_baseline_chains() -> i64 {
    50
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            num_chains: default_baseline_chains(),
        }
    }
}

/// One swept parameter: its grid and the chain count per grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis<T> {
    pub values: Vec<T>,

    #[serde(default = "default_sweep_chains")]
    pub num_chains: i64,
}

fn default_sweep_chains() -> i64 {
    30
}

fn default_cueing() -> SweepAxis<f64> {
    SweepAxis {
        values: vec![0.1, 0.3, 0.5, 0.7, 0.9],
        num_chains: default_sweep_chains(),
    }
}

fn default_cog_steps() -> SweepAxis<i64> {
    SweepAxis {
        values: vec![50, 150, 300, 500, 800],
        num_chains: default_sweep_chains(),
    }
}

fn default_cog_temp() -> SweepAxis<f64> {
    SweepAxis {
        values: vec![1.0, 1.5, 2.0, 3.0],
        num_chains: default_sweep_chains(),
    }
}

/// Loss used to compare model and human response distributions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LossMetric {
    /// KL(human || model), default
    #[default]
    Kl,
    /// Squared euclidean distance
    L2,
    /// Cross entropy of the model under the human distribution
    CrossEntropy,
}

/// Model-fit grid search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    #[serde(default = "default_fit_p_add")]
    pub p_add: Vec<f64>,

    #[serde(default = "default_fit_steps")]
    pub steps: Vec<i64>,

    #[serde(default = "default_fit_temperature")]
    pub temperature: Vec<f64>,

    #[serde(default = "default_baseline_chains")]
    pub num_chains: i64,

    /// Human condition to fit against
    #[serde(default = "default_fit_condition")]
    pub condition: String,

    #[serde(default)]
    pub metric: LossMetric,
}

fn default_fit_p_add() -> Vec<f64> {
    vec![0.1, 0.3, 0.5, 0.7, 0.9]
}

fn default_fit_steps() -> Vec<i64> {
    vec![100, 200, 500, 800]
}

fn default_fit_temperature() -> Vec<f64> {
    vec![0.5, 1.0, 1.5, 2.0]
}

fn default_fit_condition() -> String {
    "normal".to_string()
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            p_add: default_fit_p_add(),
            steps: default_fit_steps(),
            temperature: default_fit_temperature(),
            num_chains: default_baseline_chains(),
            condition: default_fit_condition(),
            metric: LossMetric::default(),
        }
    }
}

impl FitConfig {
    /// Cartesian product of the grids, p_add outermost.
    pub fn grid(&self) -> Result<Vec<ExperimentConfig>> {
        let mut grid = Vec::with_capacity(self.p_add.len() * self.steps.len() * self.temperature.len());
        for &p_add in &self.p_add {
            for &steps in &self.steps {
                for &temperature in &self.temperature {
                    grid.push(ExperimentConfig::new(
                        p_add,
                        steps,
                        temperature,
                        self.num_chains,
                    )?);
                }
            }
        }
        Ok(grid)
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Whether to write per-chain JSONL records
    #[serde(default = "default_true")]
    pub write_chains: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            write_chains: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &std::path::Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load the file if it exists, otherwise use defaults.
    pub fn from_file_or_default(path: &std::path::Path) -> std::result::Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// The condition with every parameter at its default, using `num_chains`.
    pub fn default_condition(&self, num_chains: i64) -> Result<ExperimentConfig> {
        ExperimentConfig::new(
            self.defaults.p_add,
            self.defaults.steps,
            self.defaults.temperature,
            num_chains,
        )
    }

    /// Validate everything the sweep and the fit would derive from this file.
    pub fn validate(&self) -> Result<()> {
        if self.pool.size == 0 {
            return Err(RevisionError::invalid_config("pool.size must be >= 1"));
        }
        self.default_condition(self.baseline.num_chains)?;
        for &p_add in &self.cueing.values {
            ExperimentConfig::new(
                p_add,
                self.defaults.steps,
                self.defaults.temperature,
                self.cueing.num_chains,
            )?;
        }
        for &steps in &self.cog_steps.values {
            ExperimentConfig::new(
                self.defaults.p_add,
                steps,
                self.defaults.temperature,
                self.cog_steps.num_chains,
            )?;
        }
        for &temperature in &self.cog_temp.values {
            ExperimentConfig::new(
                self.defaults.p_add,
                self.defaults.steps,
                temperature,
                self.cog_temp.num_chains,
            )?;
        }
        self.fit.grid()?;
        Ok(())
    }
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_experiment_config_rejects_bad_values() {
        assert!(ExperimentConfig::new(0.5, 500, 1.0, 30).is_ok());
        assert!(ExperimentConfig::new(0.5, 0, 1.0, 0).is_ok());

        for (p_add, steps, temp, chains) in [
            (0.5, -1, 1.0, 10),
            (0.5, 10, 0.0, 10),
            (0.5, 10, -2.0, 10),
            (0.5, 10, f64::NAN, 10),
            (0.5, 10, f64::INFINITY, 10),
            (1.5, 10, 1.0, 10),
            (-0.1, 10, 1.0, 10),
            (0.5, 10, 1.0, -3),
        ] {
            let err = ExperimentConfig::new(p_add, steps, temp, chains).unwrap_err();
            assert!(
                matches!(err, RevisionError::InvalidConfig(_)),
                "expected InvalidConfig for ({p_add}, {steps}, {temp}, {chains})"
            );
        }
    }

    #[test]
    fn test_condition_label() {
        let config = ExperimentConfig::new(0.3, 150, 1.5, 30).unwrap();
        assert_eq!(config.label(), "p_add=0.3_steps=150_temp=1.5");
    }

    #[test]
    fn test_defaults_match_published_experiment() {
        let config = Config::default();
        assert_eq!(config.defaults.p_add, 0.5);
        assert_eq!(config.defaults.steps, 500);
        assert_eq!(config.defaults.temperature, 1.0);
        assert_eq!(config.baseline.num_chains, 50);
        assert_eq!(config.cueing.values, vec![0.1, 0.3, 0.5, 0.7, 0.9]);
        assert_eq!(config.cog_steps.values, vec![50, 150, 300, 500, 800]);
        assert_eq!(config.cog_temp.values, vec![1.0, 1.5, 2.0, 3.0]);
        assert_eq!(config.cog_temp.num_chains, 30);
        assert_eq!(config.fit.grid().unwrap().len(), 5 * 4 * 4);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
seed = 7

[cueing]
values = [0.2, 0.8]

[fit]
metric = "cross_entropy"

[output]
dir = "out"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.cueing.values, vec![0.2, 0.8]);
        assert_eq!(config.cueing.num_chains, 30);
        assert_eq!(config.cog_steps.values.len(), 5);
        assert_eq!(config.fit.metric, LossMetric::CrossEntropy);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert!(config.output.write_chains);
    }

    #[test]
    fn test_validate_catches_bad_sweep_value() {
        let mut config = Config::default();
        config.cog_temp.values.push(0.0);
        assert!(matches!(config.validate(), Err(RevisionError::InvalidConfig(_))));

        let mut config = Config::default();
        config.cog_steps.values = vec![-10];
        assert!(matches!(config.validate(), Err(RevisionError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "seed = \"not a number\"").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
