//! Parameter sweep pipeline.
//!
//! Pipeline flow:
//! Config → declared sweep points → Chain Pool (per point) → labels per family → JSON
//!
//! One parameter is varied per family while the others stay at their defaults.

use super::output::{file_stem, write_json, write_records_csv, write_records_jsonl};
use crate::models::{
    BoundTrial, ChainRecord, Config, ExperimentConfig, FeatureSpace, ResponseDistribution,
    ResponseType, Result, RevisionError,
};
use crate::pool::ChainPool;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// The four result collections of a full sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SweepFamily {
    Baseline,
    /// Proposal-bias sweep
    Cueing,
    /// Chain-length sweep
    CogSteps,
    /// Temperature sweep
    CogTemp,
}

impl SweepFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Cueing => "cueing",
            Self::CogSteps => "cogSteps",
            Self::CogTemp => "cogTemp",
        }
    }
}

/// One declared condition of the sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub family: SweepFamily,
    /// Short label of the varied value (e.g. "p_add=0.3")
    pub label: String,
    /// Random stream shared by every chain of this point
    pub stream: u64,
    pub config: ExperimentConfig,
}

/// Build the declared list of sweep points, in output order.
pub fn sweep_points(config: &Config) -> Result<Vec<SweepPoint>> {
    let d = &config.defaults;
    let mut points = Vec::new();
    let mut push = |family, label: String, cfg: ExperimentConfig| {
        let stream = points.len() as u64;
        points.push(SweepPoint {
            family,
            label,
            stream,
            config: cfg,
        });
    };

    push(
        SweepFamily::Baseline,
        "baseline".to_string(),
        config.default_condition(config.baseline.num_chains)?,
    );
    for &p_add in &config.cueing.values {
        push(
            SweepFamily::Cueing,
            format!("p_add={p_add}"),
            ExperimentConfig::new(p_add, d.steps, d.temperature, config.cueing.num_chains)?,
        );
    }
    for &steps in &config.cog_steps.values {
        push(
            SweepFamily::CogSteps,
            format!("steps={steps}"),
            ExperimentConfig::new(d.p_add, steps, d.temperature, config.cog_steps.num_chains)?,
        );
    }
    for &temperature in &config.cog_temp.values {
        push(
            SweepFamily::CogTemp,
            format!("temp={temperature}"),
            ExperimentConfig::new(d.p_add, d.steps, temperature, config.cog_temp.num_chains)?,
        );
    }
    Ok(points)
}

/// Chains of one sweep point.
#[derive(Debug, Clone)]
pub struct ConditionResult {
    pub point: SweepPoint,
    pub records: Vec<ChainRecord>,
}

impl ConditionResult {
    /// Flat label list across all trials.
    pub fn labels(&self) -> Vec<ResponseType> {
        self.records.iter().map(|r| r.response_type).collect()
    }

    pub fn summary(&self) -> ConditionSummary {
        ConditionSummary::from_records(&self.point, &self.records)
    }
}

/// Aggregate statistics of one condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub family: SweepFamily,
    pub label: String,
    pub condition: String,
    pub p_add: f64,
    pub steps: usize,
    pub temperature: f64,
    pub chains: usize,
    pub distribution: ResponseDistribution,
    pub mean_accuracy: f64,
    pub mean_final_length: f64,
    /// Accepted / evaluated proposals over all chains
    pub acceptance_rate: f64,
}

impl ConditionSummary {
    pub fn from_records(point: &SweepPoint, records: &[ChainRecord]) -> Self {
        let n = records.len();
        let mean = |f: &dyn Fn(&ChainRecord) -> f64| {
            if n == 0 {
                0.0
            } else {
                records.iter().map(f).sum::<f64>() / n as f64
            }
        };
        let proposals: usize = records.iter().map(|r| r.proposals).sum();
        let accepted: usize = records.iter().map(|r| r.accepted).sum();

        Self {
            family: point.family,
            label: point.label.clone(),
            condition: point.config.label(),
            p_add: point.config.p_add,
            steps: point.config.steps,
            temperature: point.config.temperature,
            chains: n,
            distribution: ResponseDistribution::from_labels(records.iter().map(|r| &r.response_type)),
            mean_accuracy: mean(&|r: &ChainRecord| r.accuracy),
            mean_final_length: mean(&|r: &ChainRecord| r.final_length as f64),
            acceptance_rate: if proposals > 0 {
                accepted as f64 / proposals as f64
            } else {
                0.0
            },
        }
    }
}

/// Label collections keyed the way downstream analysis expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResults {
    pub baseline: Vec<ResponseType>,
    pub cueing: Vec<Vec<ResponseType>>,
    pub cog_steps: Vec<Vec<ResponseType>>,
    pub cog_temp: Vec<Vec<ResponseType>>,
}

impl SweepResults {
    /// Collect condition labels into their families, preserving sweep order.
    pub fn from_conditions(conditions: &[ConditionResult]) -> Self {
        let mut results = Self::default();
        for condition in conditions {
            let labels = condition.labels();
            match condition.point.family {
                SweepFamily::Baseline => results.baseline.extend(labels),
                SweepFamily::Cueing => results.cueing.push(labels),
                SweepFamily::CogSteps => results.cog_steps.push(labels),
                SweepFamily::CogTemp => results.cog_temp.push(labels),
            }
        }
        results
    }
}

/// Metadata and summaries of one sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub seed: u64,
    pub trials: usize,
    pub runtime_secs: f64,
    pub conditions: Vec<ConditionSummary>,
}

/// CSV tables and the families each one collects, in sweep order.
const CSV_TABLES: [(&str, &[SweepFamily]); 3] = [
    ("results_baseline.csv", &[SweepFamily::Baseline]),
    ("results_cognitive_load.csv", &[SweepFamily::CogSteps, SweepFamily::CogTemp]),
    ("results_cueing.csv", &[SweepFamily::Cueing]),
];

/// Sweep pipeline: runs every declared point through the chain pool.
pub struct SweepPipeline {
    pool: ChainPool,
    config: Config,
    show_progress: bool,
}

impl SweepPipeline {
    /// Create a new sweep pipeline. Validates the whole config up front.
    pub fn new(config: Config, trials: Vec<BoundTrial>) -> Result<Self> {
        config.validate()?;
        let pool = ChainPool::new(
            FeatureSpace::shared(),
            Arc::new(trials),
            config.pool.size,
            config.seed,
        );
        Ok(Self {
            pool,
            config,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run every sweep point.
    pub async fn run(&self) -> Result<(SweepReport, Vec<ConditionResult>)> {
        let started_at = Utc::now();
        let start = Instant::now();
        let points = sweep_points(&self.config)?;

        info!(
            points = points.len(),
            trials = self.pool.trials().len(),
            pool_size = self.pool.pool_size(),
            seed = self.config.seed,
            "Starting sweep"
        );

        let pb = progress_bar(points.len(), self.show_progress)?;
        let mut conditions = Vec::with_capacity(points.len());

        for point in points {
            pb.set_message(format!("{} {}", point.family.as_str(), point.label));
            let records = self.pool.run_condition(point.config, point.stream).await?;
            let result = ConditionResult { point, records };

            let summary = result.summary();
            info!(
                family = summary.family.as_str(),
                label = %summary.label,
                chains = summary.chains,
                additive = summary.distribution.additive,
                subtractive = summary.distribution.subtractive,
                mixed = summary.distribution.mixed,
                nochange = summary.distribution.nochange,
                "Sweep point complete"
            );

            conditions.push(result);
            pb.inc(1);
        }
        pb.finish_with_message("Done!");

        let report = SweepReport {
            run_id: Uuid::new_v4(),
            started_at,
            seed: self.config.seed,
            trials: self.pool.trials().len(),
            runtime_secs: start.elapsed().as_secs_f64(),
            conditions: conditions.iter().map(ConditionResult::summary).collect(),
        };

        info!(
            run_id = %report.run_id,
            runtime_secs = report.runtime_secs,
            "Sweep complete"
        );

        Ok((report, conditions))
    }

    /// Write `sweep.json`, `summary.json`, the per-family CSV tables and
    /// (optionally) per-condition chain files.
    pub fn write_outputs(
        &self,
        dir: &Path,
        report: &SweepReport,
        conditions: &[ConditionResult],
    ) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| RevisionError::io("creating output directory", e))?;

        write_json(&dir.join("sweep.json"), &SweepResults::from_conditions(conditions))?;
        write_json(&dir.join("summary.json"), report)?;

        for (file, families) in CSV_TABLES {
            let records: Vec<ChainRecord> = conditions
                .iter()
                .filter(|c| families.contains(&c.point.family))
                .flat_map(|c| c.records.iter().cloned())
                .collect();
            write_records_csv(&dir.join(file), &records)?;
        }

        if self.config.output.write_chains {
            let chains_dir = dir.join("chains");
            std::fs::create_dir_all(&chains_dir)
                .map_err(|e| RevisionError::io("creating chains directory", e))?;
            for condition in conditions {
                let name = format!(
                    "{}_{}.jsonl",
                    condition.point.family.as_str(),
                    file_stem(&condition.point.label)
                );
                write_records_jsonl(&chains_dir.join(name), &condition.records)?;
            }
        }

        info!(dir = %dir.display(), "Wrote sweep outputs");
        Ok(())
    }
}

pub(crate) fn progress_bar(len: usize, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
            .map_err(|e| RevisionError::Internal(format!("Bad progress template: {e}")))?
            .progress_chars("##-"),
    );
    Ok(pb)
}
