//! Constrained proposal generator.
//!
//! An additive move may only introduce a brand-new dimension; a subtractive
//! move drops any held feature. No Hastings correction is applied for the
//! differing pool sizes.

use crate::models::{Dimension, Feature, FeatureSpace, Hypothesis};
use rand::Rng;
use std::collections::BTreeSet;

/// Kind of edit a proposal makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Additive,
    Subtractive,
    /// Nothing can be added or removed; the chain skips the step
    None,
}

/// A candidate next hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub hypothesis: Hypothesis,
    pub kind: MoveKind,
    /// Feature that was added or removed (absent for `MoveKind::None`)
    pub feature: Option<Feature>,
}

/// Proposal generator bound to a feature registry.
#[derive(Debug, Clone, Copy)]
pub struct Proposer<'a> {
    space: &'a FeatureSpace,
}

impl<'a> Proposer<'a> {
    pub fn new(space: &'a FeatureSpace) -> Self {
        Self { space }
    }

    pub fn used_dimensions(&self, hypothesis: &Hypothesis) -> BTreeSet<Dimension> {
        hypothesis.used_dimensions()
    }

    /// Registered features that are not held and whose dimension is not yet used.
    /// Returned in registry order.
    pub fn available_adds(&self, hypothesis: &Hypothesis) -> Vec<Feature> {
        let used = self.used_dimensions(hypothesis);
        self.space
            .features()
            .iter()
            .copied()
            .filter(|f| !hypothesis.contains(*f) && !used.contains(&f.dimension()))
            .collect()
    }

    /// Every held feature may be dropped.
    pub fn removable_features(&self, hypothesis: &Hypothesis) -> Vec<Feature> {
        hypothesis.iter().collect()
    }

    /// Draw a proposal.
    ///
    /// Move kind is forced when only one pool is non-empty; otherwise it is
    /// additive with probability `p_add`. The feature is uniform within the pool.
    pub fn propose<R: Rng + ?Sized>(&self, hypothesis: &Hypothesis, p_add: f64, rng: &mut R) -> Proposal {
        let adds = self.available_adds(hypothesis);
        let removes = self.removable_features(hypothesis);

        let do_add = match (adds.is_empty(), removes.is_empty()) {
            (true, true) => {
                return Proposal {
                    hypothesis: hypothesis.clone(),
                    kind: MoveKind::None,
                    feature: None,
                }
            }
            (true, false) => false,
            (false, true) => true,
            (false, false) => rng.gen_bool(p_add),
        };

        if do_add {
            let feature = adds[rng.gen_range(0..adds.len())];
            Proposal {
                hypothesis: hypothesis.with(feature),
                kind: MoveKind::Additive,
                feature: Some(feature),
            }
        } else {
            let feature = removes[rng.gen_range(0..removes.len())];
            Proposal {
                hypothesis: hypothesis.without(feature),
                kind: MoveKind::Subtractive,
                feature: Some(feature),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn h(features: &[Feature]) -> Hypothesis {
        features.iter().copied().collect()
    }

    #[test]
    fn test_empty_hypothesis_pools() {
        let proposer = Proposer::new(FeatureSpace::standard());
        let empty = Hypothesis::new();
        assert_eq!(proposer.available_adds(&empty), Feature::ALL.to_vec());
        assert!(proposer.removable_features(&empty).is_empty());

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let p = proposer.propose(&empty, 0.0, &mut rng);
            assert_eq!(p.kind, MoveKind::Additive);
            assert_eq!(p.hypothesis.len(), 1);
        }
    }

    #[test]
    fn test_full_hypothesis_forces_subtractive() {
        use Feature::*;
        let proposer = Proposer::new(FeatureSpace::standard());
        let full = h(&[Square, Blue, Striped, Small]);
        assert!(proposer.available_adds(&full).is_empty());

        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let p = proposer.propose(&full, 1.0, &mut rng);
            assert_eq!(p.kind, MoveKind::Subtractive);
            assert_eq!(p.hypothesis.len(), 3);
            assert!(!p.hypothesis.contains(p.feature.unwrap()));
        }
    }

    #[test]
    fn test_circle_red_pools() {
        use Feature::*;
        let proposer = Proposer::new(FeatureSpace::standard());
        let current = h(&[Circle, Red]);
        assert_eq!(
            proposer.used_dimensions(&current),
            [Dimension::Shape, Dimension::Color].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(proposer.available_adds(&current), vec![Solid, Striped, Big, Small]);
        assert_eq!(proposer.removable_features(&current), vec![Circle, Red]);
    }

    #[test]
    fn test_adds_never_reuse_a_dimension() {
        let proposer = Proposer::new(FeatureSpace::standard());
        let mut rng = StdRng::seed_from_u64(3);
        let mut current = Hypothesis::new();
        for _ in 0..500 {
            for f in proposer.available_adds(&current) {
                assert!(!current.contains(f));
                assert!(!current.used_dimensions().contains(&f.dimension()));
            }
            current = proposer.propose(&current, 0.5, &mut rng).hypothesis;
            assert_eq!(current.used_dimensions().len(), current.len());
        }
    }

    #[test]
    fn test_empty_space_yields_none_move() {
        let space = FeatureSpace::new(Vec::<Feature>::new());
        let proposer = Proposer::new(&space);
        let mut rng = StdRng::seed_from_u64(4);
        let p = proposer.propose(&Hypothesis::new(), 0.5, &mut rng);
        assert_eq!(p.kind, MoveKind::None);
        assert_eq!(p.hypothesis, Hypothesis::new());
        assert_eq!(p.feature, None);
    }

    #[test]
    fn test_bias_extremes() {
        use Feature::*;
        let proposer = Proposer::new(FeatureSpace::standard());
        let current = h(&[Circle]);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            assert_eq!(proposer.propose(&current, 1.0, &mut rng).kind, MoveKind::Additive);
            assert_eq!(proposer.propose(&current, 0.0, &mut rng).kind, MoveKind::Subtractive);
        }
    }
}
