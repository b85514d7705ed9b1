//! Stimulus definitions: objects, labelled examples and trials.
//!
//! K_i: Field names (`hypothesis`, `examples`, `object_id`, `label`) match the
//! trial-definition JSON consumed by the presentation layer.
//! B_i: Examples may reference objects that do not exist → checked when binding.

use super::{FeatureSpace, Hypothesis, Object, Result, RevisionError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// A labelled reference to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub object_id: u32,

    /// Category membership: 1 = member, 0 = non-member
    pub label: u8,
}

/// One learning scenario: an initial hypothesis plus labelled examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: String,

    /// Free-form trial family tag (e.g. "additive", "subtractive")
    #[serde(rename = "type", default)]
    pub trial_type: String,

    pub hypothesis: Hypothesis,

    pub examples: Vec<Example>,
}

/// The full stimulus file: object table plus trials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stimuli {
    pub objects: Vec<Object>,
    pub trials: Vec<Trial>,
}

impl Stimuli {
    /// Load stimuli from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RevisionError::io("reading stimuli file", e))?;
        let stimuli: Stimuli = serde_json::from_str(&content)
            .map_err(|e| RevisionError::ParseError(format!("{}: {}", path.display(), e)))?;

        info!(
            objects = stimuli.objects.len(),
            trials = stimuli.trials.len(),
            "Loaded stimuli"
        );
        Ok(stimuli)
    }

    /// Object table keyed by identifier. Duplicate ids are rejected.
    pub fn object_table(&self) -> Result<HashMap<u32, Object>> {
        let mut table = HashMap::with_capacity(self.objects.len());
        for object in &self.objects {
            if table.insert(object.id, *object).is_some() {
                return Err(RevisionError::InvalidInput(format!(
                    "duplicate object id {}",
                    object.id
                )));
            }
        }
        Ok(table)
    }

    /// Bind every trial against the object table. Fails on the first bad trial.
    pub fn bind(&self, space: &FeatureSpace) -> Result<Vec<BoundTrial>> {
        let table = self.object_table()?;
        self.trials
            .iter()
            .map(|trial| BoundTrial::bind(trial, &table, space))
            .collect()
    }
}

/// An example with its object resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundExample {
    pub object: Object,
    pub label: bool,
}

/// A trial whose examples have been resolved and whose hypothesis has been checked.
///
/// Owns copies of its objects, so it can be shared across worker threads.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTrial {
    pub id: String,
    pub trial_type: String,
    pub initial: Hypothesis,
    pub examples: Vec<BoundExample>,
}

impl BoundTrial {
    /// Resolve a trial.
    ///
    /// B_i(every object_id exists) → `UnknownObject`
    /// B_i(every hypothesis feature is registered) → `InvalidFeature`
    pub fn bind(
        trial: &Trial,
        objects: &HashMap<u32, Object>,
        space: &FeatureSpace,
    ) -> Result<Self> {
        for feature in trial.hypothesis.iter() {
            space.dimension_of(feature)?;
        }

        let examples = trial
            .examples
            .iter()
            .map(|ex| {
                let object = objects
                    .get(&ex.object_id)
                    .copied()
                    .ok_or_else(|| RevisionError::UnknownObject {
                        trial_id: trial.id.clone(),
                        object_id: ex.object_id,
                    })?;
                let label = match ex.label {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(RevisionError::InvalidInput(format!(
                            "trial '{}': label {} for object {} is not 0 or 1",
                            trial.id, other, ex.object_id
                        )))
                    }
                };
                Ok(BoundExample { object, label })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: trial.id.clone(),
            trial_type: trial.trial_type.clone(),
            initial: trial.hypothesis.clone(),
            examples,
        })
    }

    /// Fraction of examples the hypothesis labels correctly (0.0 with no examples).
    pub fn accuracy(&self, hypothesis: &Hypothesis) -> f64 {
        if self.examples.is_empty() {
            return 0.0;
        }
        let correct = self
            .examples
            .iter()
            .filter(|ex| hypothesis.predicts(&ex.object) == ex.label)
            .count();
        correct as f64 / self.examples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const STIMULI: &str = r#"{
        "objects": [
            {"id": 1, "shape": "circle", "color": "red", "fill": "solid", "size": "big"},
            {"id": 2, "shape": "square", "color": "blue", "fill": "striped", "size": "small"}
        ],
        "trials": [
            {"id": "t1", "type": "additive", "hypothesis": ["circle"],
             "examples": [{"object_id": 1, "label": 1}, {"object_id": 2, "label": 0}]}
        ]
    }"#;

    #[test]
    fn test_load_and_bind() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(STIMULI.as_bytes()).unwrap();

        let stimuli = Stimuli::from_file(file.path()).unwrap();
        let bound = stimuli.bind(FeatureSpace::standard()).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].id, "t1");
        assert_eq!(bound[0].trial_type, "additive");
        assert_eq!(bound[0].examples.len(), 2);
        assert!(bound[0].examples[0].label);
        assert_eq!(bound[0].examples[1].object.shape, Feature::Square);
    }

    #[test]
    fn test_unknown_object_is_fatal() {
        let mut stimuli: Stimuli = serde_json::from_str(STIMULI).unwrap();
        stimuli.trials[0].examples.push(Example {
            object_id: 99,
            label: 1,
        });
        let err = stimuli.bind(FeatureSpace::standard()).unwrap_err();
        assert!(matches!(
            err,
            RevisionError::UnknownObject { ref trial_id, object_id: 99 } if trial_id == "t1"
        ));
    }

    #[test]
    fn test_unregistered_hypothesis_feature_is_rejected() {
        let stimuli: Stimuli = serde_json::from_str(STIMULI).unwrap();
        let space = FeatureSpace::new([Feature::Red, Feature::Blue]);
        let err = stimuli.bind(&space).unwrap_err();
        assert!(matches!(err, RevisionError::InvalidFeature(ref f) if f == "circle"));
    }

    #[test]
    fn test_bad_label_and_duplicate_ids() {
        let mut stimuli: Stimuli = serde_json::from_str(STIMULI).unwrap();
        stimuli.trials[0].examples[0].label = 2;
        assert!(matches!(
            stimuli.bind(FeatureSpace::standard()),
            Err(RevisionError::InvalidInput(_))
        ));

        let mut stimuli: Stimuli = serde_json::from_str(STIMULI).unwrap();
        let dup = stimuli.objects[0];
        stimuli.objects.push(dup);
        assert!(matches!(stimuli.object_table(), Err(RevisionError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Stimuli::from_file(Path::new("/nonexistent/stimuli.json")).unwrap_err();
        assert!(matches!(err, RevisionError::Io { .. }));
    }

    #[test]
    fn test_accuracy() {
        let stimuli: Stimuli = serde_json::from_str(STIMULI).unwrap();
        let trial = &stimuli.bind(FeatureSpace::standard()).unwrap()[0];
        assert_eq!(trial.accuracy(&trial.initial), 1.0);
        assert_eq!(trial.accuracy(&Hypothesis::new()), 0.5);
    }
}
