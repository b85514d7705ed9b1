//! Model-fit pipeline: grid search of sampler parameters against human responses.
//!
//! Pipeline flow:
//! Participant files → human distribution (one condition)
//! Grid point → Chain Pool → model distribution → loss → best point

use super::output::{write_csv, write_json};
use super::sweep::progress_bar;
use crate::models::{
    BoundTrial, Config, FeatureSpace, Hypothesis, LossMetric, ResponseDistribution, ResponseType,
    Result, RevisionError,
};
use crate::pool::ChainPool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Smoothing added to every entry before taking logs.
const LOSS_EPS: f64 = 1e-9;

/// One recorded response of a live participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanResponse {
    /// Filled from the file name when loading a directory
    #[serde(default)]
    pub participant: String,

    pub trial_id: String,

    pub response_type: ResponseType,

    #[serde(default = "default_condition")]
    pub condition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_hypothesis: Option<Hypothesis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hypothesis: Option<Hypothesis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_ms: Option<f64>,
}

fn default_condition() -> String {
    "unknown".to_string()
}

#[derive(Deserialize)]
struct ParticipantFile {
    responses: Vec<HumanResponse>,
}

/// Load every `*.json` participant file in a directory (sorted by file name).
pub fn load_human_responses(dir: &Path) -> Result<Vec<HumanResponse>> {
    if !dir.is_dir() {
        return Err(RevisionError::io(
            "reading responses directory",
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            ),
        ));
    }

    let pattern = format!("{}/*.json", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths = glob::glob(&pattern)
        .map_err(|e| RevisionError::Internal(format!("Invalid glob pattern: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RevisionError::io("reading responses directory", e.into_error()))?;
    paths.sort();

    let mut responses = Vec::new();
    for path in paths {
        let participant = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RevisionError::io("reading participant file", e))?;
        let file: ParticipantFile = serde_json::from_str(&content)
            .map_err(|e| RevisionError::ParseError(format!("{}: {}", path.display(), e)))?;

        debug!(participant = %participant, responses = file.responses.len(), "Loaded participant");
        responses.extend(file.responses.into_iter().map(|mut r| {
            r.participant = participant.clone();
            r
        }));
    }

    info!(count = responses.len(), "Loaded human responses");
    Ok(responses)
}

/// Response distribution of one condition.
pub fn human_distribution(responses: &[HumanResponse], condition: &str) -> Result<ResponseDistribution> {
    let labels: Vec<ResponseType> = responses
        .iter()
        .filter(|r| r.condition == condition)
        .map(|r| r.response_type)
        .collect();
    if labels.is_empty() {
        return Err(RevisionError::InvalidInput(format!(
            "no human responses for condition '{condition}'"
        )));
    }
    Ok(ResponseDistribution::from_labels(&labels))
}

/// KL(p || q) with additive smoothing.
pub fn kl_divergence(p: &ResponseDistribution, q: &ResponseDistribution) -> f64 {
    p.to_vec()
        .iter()
        .zip(q.to_vec())
        .map(|(&p, q)| {
            let (p, q) = (p + LOSS_EPS, q + LOSS_EPS);
            p * (p / q).ln()
        })
        .sum()
}

/// Squared euclidean distance.
pub fn l2_distance(p: &ResponseDistribution, q: &ResponseDistribution) -> f64 {
    p.to_vec()
        .iter()
        .zip(q.to_vec())
        .map(|(&p, q)| (p - q).powi(2))
        .sum()
}

/// Cross entropy of q under p, with additive smoothing.
pub fn cross_entropy(p: &ResponseDistribution, q: &ResponseDistribution) -> f64 {
    -p.to_vec()
        .iter()
        .zip(q.to_vec())
        .map(|(&p, q)| (p + LOSS_EPS) * (q + LOSS_EPS).ln())
        .sum::<f64>()
}

pub fn loss(metric: LossMetric, human: &ResponseDistribution, model: &ResponseDistribution) -> f64 {
    match metric {
        LossMetric::Kl => kl_divergence(human, model),
        LossMetric::L2 => l2_distance(human, model),
        LossMetric::CrossEntropy => cross_entropy(human, model),
    }
}

/// One evaluated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitPoint {
    pub p_add: f64,
    pub steps: usize,
    pub temperature: f64,
    pub model: ResponseDistribution,
    pub loss: f64,
}

/// Grid point as a CSV row: parameters and loss only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitGridRow {
    pub p_add: f64,
    pub steps: usize,
    pub temperature: f64,
    pub loss: f64,
}

impl From<&FitPoint> for FitGridRow {
    fn from(point: &FitPoint) -> Self {
        Self {
            p_add: point.p_add,
            steps: point.steps,
            temperature: point.temperature,
            loss: point.loss,
        }
    }
}

/// Result of a grid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub condition: String,
    pub metric: LossMetric,
    pub human: ResponseDistribution,
    pub grid: Vec<FitPoint>,
    /// Minimum-loss point (first one wins on ties)
    pub best: FitPoint,
}

/// Grid-search pipeline over the `[fit]` section of the config.
pub struct FitPipeline {
    pool: ChainPool,
    config: Config,
    show_progress: bool,
}

impl FitPipeline {
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

    /// Evaluate every grid point against the configured human condition.
    pub async fn run(&self, responses: &[HumanResponse]) -> Result<FitReport> {
        let fit = &self.config.fit;
        let human = human_distribution(responses, &fit.condition)?;
        let grid = fit.grid()?;
        let started_at = Utc::now();

        info!(
            grid_points = grid.len(),
            condition = %fit.condition,
            metric = ?fit.metric,
            "Beginning grid search"
        );

        let pb = progress_bar(grid.len(), self.show_progress)?;
        let mut points = Vec::with_capacity(grid.len());

        for (stream, experiment) in grid.into_iter().enumerate() {
            let records = self.pool.run_condition(experiment, stream as u64).await?;
            let model = ResponseDistribution::from_labels(records.iter().map(|r| &r.response_type));
            let point_loss = loss(fit.metric, &human, &model);

            debug!(condition = %experiment.label(), loss = point_loss, "Grid point evaluated");
            pb.set_message(format!("{} loss={:.4}", experiment.label(), point_loss));
            pb.inc(1);

            points.push(FitPoint {
                p_add: experiment.p_add,
                steps: experiment.steps,
                temperature: experiment.temperature,
                model,
                loss: point_loss,
            });
        }
        pb.finish_with_message("Done!");

        let best = points
            .iter()
            .fold(None::<&FitPoint>, |best, p| match best {
                Some(b) if b.loss <= p.loss => Some(b),
                _ => Some(p),
            })
            .cloned()
            .ok_or_else(|| RevisionError::InvalidConfig("fit grid is empty".to_string()))?;

        if best.loss.is_nan() {
            warn!("Best loss is NaN; check the human distribution");
        }

        info!(
            p_add = best.p_add,
            steps = best.steps,
            temperature = best.temperature,
            loss = best.loss,
            "Best parameters"
        );

        Ok(FitReport {
            run_id: Uuid::new_v4(),
            started_at,
            condition: fit.condition.clone(),
            metric: fit.metric,
            human,
            grid: points,
            best,
        })
    }

    /// Write `model_fit_grid.json`, `model_fit_grid.csv` and `best_model_params.json`.
    pub fn write_outputs(&self, dir: &Path, report: &FitReport) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| RevisionError::io("creating output directory", e))?;
        write_json(&dir.join("model_fit_grid.json"), report)?;
        let rows: Vec<FitGridRow> = report.grid.iter().map(FitGridRow::from).collect();
        write_csv(&dir.join("model_fit_grid.csv"), &rows)?;
        write_json(
            &dir.join("best_model_params.json"),
            &serde_json::json!({
                "p_add": report.best.p_add,
                "steps": report.best.steps,
                "temperature": report.best.temperature,
            }),
        )?;
        info!(dir = %dir.display(), "Wrote fit outputs");
        Ok(())
    }
}
