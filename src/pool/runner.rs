//! Chain pool for concurrent experiment runs.
//!
//! Epistemic foundation:
//! - K_i: Chains are independent; trials share only immutable data
//! - K_i: Each chain draws from its own seeded stream → order-free aggregation
//! - B_i: A batch may fail at construction time → Result
//! - I^R: Pool size is configurable

use crate::models::{BoundTrial, ChainRecord, ExperimentConfig, FeatureSpace, Result, RevisionError};
use crate::sampler::Sampler;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pool that runs the chains of a condition across blocking worker threads.
pub struct ChainPool {
    /// Feature registry (shared)
    space: Arc<FeatureSpace>,
    /// Bound trials (shared, read-only)
    trials: Arc<Vec<BoundTrial>>,
    /// Pool size (max concurrent trial batches)
    pool_size: usize,
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
    /// Base seed for every chain stream
    seed: u64,
}

impl ChainPool {
    /// Create a new chain pool. A pool size of zero is treated as one.
    pub fn new(
        space: Arc<FeatureSpace>,
        trials: Arc<Vec<BoundTrial>>,
        pool_size: usize,
        seed: u64,
    ) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            space,
            trials,
            pool_size,
            semaphore: Arc::new(Semaphore::new(pool_size)),
            seed,
        }
    }

    pub fn trials(&self) -> &[BoundTrial] {
        &self.trials
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run `config.num_chains` chains for every trial.
    ///
    /// Records come back in (trial, chain) order regardless of which batch
    /// finishes first. `stream` separates the random streams of different
    /// conditions sharing one base seed.
    pub async fn run_condition(
        &self,
        config: ExperimentConfig,
        stream: u64,
    ) -> Result<Vec<ChainRecord>> {
        config.validate()?;
        let start = Instant::now();
        let mut handles = Vec::with_capacity(self.trials.len());

        for trial_index in 0..self.trials.len() {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| RevisionError::Internal("Semaphore closed".to_string()))?;
            let space = Arc::clone(&self.space);
            let trials = Arc::clone(&self.trials);
            let seed = self.seed;

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let sampler = Sampler::new(&space);
                let records =
                    sampler.run_trial(&trials[trial_index], trial_index, config, seed, stream);
                (trial_index, records)
            });
            handles.push(handle);
        }

        let records = collect_batches(&self.trials, handles).await?;

        info!(
            condition = %config.label(),
            trials = self.trials.len(),
            chains = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Condition complete"
        );

        Ok(records)
    }
}

/// Await every batch, then merge in trial order.
///
/// A failed batch does not short-circuit: the remaining batches are still
/// awaited so no blocking task outlives the call. The first error wins.
async fn collect_batches(
    trials: &[BoundTrial],
    handles: Vec<JoinHandle<(usize, Result<Vec<ChainRecord>>)>>,
) -> Result<Vec<ChainRecord>> {
    let mut batches = Vec::with_capacity(handles.len());
    let mut first_error = None;

    for handle in handles {
        match handle.await {
            Ok((trial_index, Ok(records))) => {
                debug!(
                    trial = %trials[trial_index].id,
                    chains = records.len(),
                    "Trial batch complete"
                );
                batches.push((trial_index, records));
            }
            Ok((trial_index, Err(e))) => {
                warn!(trial = %trials[trial_index].id, error = %e, "Trial batch failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                warn!(error = %e, "Chain task failed");
                if first_error.is_none() {
                    first_error = Some(RevisionError::Internal(format!("Chain task failed: {e}")));
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    batches.sort_by_key(|(trial_index, _)| *trial_index);
    Ok(batches.into_iter().flat_map(|(_, r)| r).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundExample, Feature, Hypothesis, Object, ResponseType};
    use crate::sampler::run_condition_sync;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn trials() -> Vec<BoundTrial> {
        use Feature::*;
        let obj = |id, s, c, f, z| Object::new(id, s, c, f, z).unwrap();
        let examples = vec![
            BoundExample { object: obj(1, Circle, Red, Solid, Big), label: true },
            BoundExample { object: obj(2, Circle, Blue, Solid, Small), label: true },
            BoundExample { object: obj(3, Square, Red, Striped, Big), label: false },
        ];
        vec![
            BoundTrial {
                id: "a".to_string(),
                trial_type: "subtractive".to_string(),
                initial: [Circle, Red].into_iter().collect(),
                examples: examples.clone(),
            },
            BoundTrial {
                id: "b".to_string(),
                trial_type: "additive".to_string(),
                initial: Hypothesis::new(),
                examples: examples.clone(),
            },
            BoundTrial {
                id: "c".to_string(),
                trial_type: "additive".to_string(),
                initial: [Square].into_iter().collect(),
                examples,
            },
        ]
    }

    #[tokio::test]
    async fn test_pool_matches_serial_runner() {
        let trials = trials();
        let config = ExperimentConfig::new(0.5, 200, 1.0, 12).unwrap();
        let expected =
            run_condition_sync(FeatureSpace::standard(), &trials, config, 42, 3).unwrap();

        let pool = ChainPool::new(FeatureSpace::shared(), Arc::new(trials), 2, 42);
        let records = pool.run_condition(config, 3).await.unwrap();

        assert_eq!(records.len(), 3 * 12);
        assert_eq!(records, expected);
    }

    #[tokio::test]
    async fn test_pool_size_does_not_change_results() {
        let trials = Arc::new(trials());
        let config = ExperimentConfig::new(0.7, 100, 1.5, 8).unwrap();

        let narrow = ChainPool::new(FeatureSpace::shared(), Arc::clone(&trials), 1, 9);
        let wide = ChainPool::new(FeatureSpace::shared(), Arc::clone(&trials), 16, 9);
        assert_eq!(
            narrow.run_condition(config, 0).await.unwrap(),
            wide.run_condition(config, 0).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let pool = ChainPool::new(FeatureSpace::shared(), Arc::new(trials()), 2, 0);
        let config = ExperimentConfig {
            p_add: 0.5,
            steps: 10,
            temperature: -1.0,
            num_chains: 2,
        };
        assert!(matches!(
            pool.run_condition(config, 0).await,
            Err(RevisionError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_steps_all_nochange() {
        let pool = ChainPool::new(FeatureSpace::shared(), Arc::new(trials()), 4, 0);
        let config = ExperimentConfig::new(0.5, 0, 1.0, 5).unwrap();
        let records = pool.run_condition(config, 0).await.unwrap();
        assert_eq!(records.len(), 15);
        assert!(records
            .iter()
            .all(|r| r.response_type == ResponseType::NoChange));
    }

    #[tokio::test]
    async fn test_failed_batch_still_awaits_siblings() {
        let trials = trials();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let handles: Vec<JoinHandle<(usize, Result<Vec<ChainRecord>>)>> = vec![
            tokio::task::spawn_blocking(|| {
                (0, Err(RevisionError::Internal("batch failed".to_string())))
            }),
            tokio::task::spawn_blocking(move || {
                std::thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
                (1, Ok(Vec::new()))
            }),
        ];

        let result = collect_batches(&trials, handles).await;
        assert!(matches!(result, Err(RevisionError::Internal(ref m)) if m == "batch failed"));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_batches_merge_in_trial_order() {
        let trials = trials();
        let config = ExperimentConfig::new(0.5, 10, 1.0, 2).unwrap();
        let expected = run_condition_sync(FeatureSpace::standard(), &trials, config, 1, 0).unwrap();

        let (first, rest) = expected.split_at(2);
        let first = first.to_vec();
        let rest = rest.to_vec();
        let handles: Vec<JoinHandle<(usize, Result<Vec<ChainRecord>>)>> = vec![
            tokio::task::spawn_blocking(move || (1, Ok(rest))),
            tokio::task::spawn_blocking(move || (0, Ok(first))),
        ];
        assert_eq!(collect_batches(&trials, handles).await.unwrap(), expected);
    }
}
