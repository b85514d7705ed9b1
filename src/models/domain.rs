//! Domain model: features, dimensions, objects and conjunctive hypotheses.
//!
//! K_i: The feature universe is closed (8 symbols over 4 dimensions).
//! K_i: Every object carries exactly one feature per dimension.
//! B_i: Symbols arriving from outside are parsed → Result.

use super::{Result, RevisionError};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// A category of mutually exclusive feature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Shape,
    Color,
    Fill,
    Size,
}

impl Dimension {
    /// All dimensions in canonical order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Shape,
        Dimension::Color,
        Dimension::Fill,
        Dimension::Size,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shape => "shape",
            Self::Color => "color",
            Self::Fill => "fill",
            Self::Size => "size",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic feature symbol. Ordering follows the canonical universe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Feature {
    Circle,
    Square,
    Red,
    Blue,
    Solid,
    Striped,
    Big,
    Small,
}

impl Feature {
    /// The full universe in canonical order.
    pub const ALL: [Feature; 8] = [
        Feature::Circle,
        Feature::Square,
        Feature::Red,
        Feature::Blue,
        Feature::Solid,
        Feature::Striped,
        Feature::Big,
        Feature::Small,
    ];

    /// The dimension this feature belongs to. Total over the closed universe.
    pub const fn dimension(self) -> Dimension {
        match self {
            Self::Circle | Self::Square => Dimension::Shape,
            Self::Red | Self::Blue => Dimension::Color,
            Self::Solid | Self::Striped => Dimension::Fill,
            Self::Big | Self::Small => Dimension::Size,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Solid => "solid",
            Self::Striped => "striped",
            Self::Big => "big",
            Self::Small => "small",
        }
    }
}

impl FromStr for Feature {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| RevisionError::InvalidFeature(s.to_string()))
    }
}

impl TryFrom<String> for Feature {
    type Error = RevisionError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` iff the object's value on the feature's dimension is that feature.
pub fn satisfies(feature: Feature, object: &Object) -> bool {
    object.value(feature.dimension()) == feature
}

/// A stimulus object: one feature per dimension plus a stable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawObject")]
pub struct Object {
    pub id: u32,
    pub shape: Feature,
    pub color: Feature,
    pub fill: Feature,
    pub size: Feature,
}

/// Wire form of an object before per-dimension validation.
#[derive(Deserialize)]
struct RawObject {
    id: u32,
    shape: Feature,
    color: Feature,
    fill: Feature,
    size: Feature,
}

impl TryFrom<RawObject> for Object {
    type Error = RevisionError;

    fn try_from(raw: RawObject) -> Result<Self> {
        Object::new(raw.id, raw.shape, raw.color, raw.fill, raw.size)
    }
}

impl Object {
    /// Build an object, checking that each slot holds a value of its own dimension.
    pub fn new(id: u32, shape: Feature, color: Feature, fill: Feature, size: Feature) -> Result<Self> {
        let slots = [
            (Dimension::Shape, shape),
            (Dimension::Color, color),
            (Dimension::Fill, fill),
            (Dimension::Size, size),
        ];
        for (dim, value) in slots {
            if value.dimension() != dim {
                return Err(RevisionError::InvalidInput(format!(
                    "object {id}: '{value}' is not a {dim} value"
                )));
            }
        }
        Ok(Self {
            id,
            shape,
            color,
            fill,
            size,
        })
    }

    /// The object's value on a dimension.
    pub fn value(&self, dimension: Dimension) -> Feature {
        match dimension {
            Dimension::Shape => self.shape,
            Dimension::Color => self.color,
            Dimension::Fill => self.fill,
            Dimension::Size => self.size,
        }
    }
}

/// A conjunction of features.
///
/// The type tolerates any feature collection (including two features from
/// the same dimension); dimension exclusivity is maintained by the proposal
/// generator, not here. Duplicates collapse since this is a set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hypothesis(BTreeSet<Feature>);

impl Hypothesis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    /// Features in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }

    /// A copy with `feature` added.
    pub fn with(&self, feature: Feature) -> Self {
        let mut next = self.clone();
        next.0.insert(feature);
        next
    }

    /// A copy with `feature` removed.
    pub fn without(&self, feature: Feature) -> Self {
        let mut next = self.clone();
        next.0.remove(&feature);
        next
    }

    /// Dimensions already represented.
    pub fn used_dimensions(&self) -> BTreeSet<Dimension> {
        self.iter().map(Feature::dimension).collect()
    }

    /// Features in `self` that are not in `other`.
    pub fn difference(&self, other: &Hypothesis) -> Vec<Feature> {
        self.0.difference(&other.0).copied().collect()
    }

    /// `true` iff the object satisfies every feature. Vacuously true when empty.
    pub fn predicts(&self, object: &Object) -> bool {
        self.iter().all(|f| satisfies(f, object))
    }
}

impl FromIterator<Feature> for Hypothesis {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols: Vec<&str> = self.iter().map(Feature::as_str).collect();
        write!(f, "{{{}}}", symbols.join(", "))
    }
}

/// Immutable feature registry shared by the posterior model and the proposal generator.
///
/// The registry's order is the order in which candidate additions are
/// enumerated, so it fixes which feature a given random draw selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpace {
    features: Vec<Feature>,
}

static STANDARD_SPACE: OnceLock<Arc<FeatureSpace>> = OnceLock::new();

impl FeatureSpace {
    /// Build a registry from a feature list. Repeated features keep their first position.
    pub fn new(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut seen = BTreeSet::new();
        let features = features.into_iter().filter(|f| seen.insert(*f)).collect();
        Self { features }
    }

    /// The full 8-feature universe, built once per process.
    pub fn standard() -> &'static FeatureSpace {
        Self::standard_arc().as_ref()
    }

    /// Shared handle to the standard registry, for moving into worker tasks.
    pub fn shared() -> Arc<FeatureSpace> {
        Arc::clone(Self::standard_arc())
    }

    fn standard_arc() -> &'static Arc<FeatureSpace> {
        STANDARD_SPACE.get_or_init(|| Arc::new(FeatureSpace::new(Feature::ALL)))
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Dimension lookup, rejecting features this registry does not know.
    pub fn dimension_of(&self, feature: Feature) -> Result<Dimension> {
        if self.contains(feature) {
            Ok(feature.dimension())
        } else {
            Err(RevisionError::InvalidFeature(feature.to_string()))
        }
    }

    /// Registry-checked form of [`satisfies`].
    pub fn satisfies(&self, feature: Feature, object: &Object) -> Result<bool> {
        let dim = self.dimension_of(feature)?;
        Ok(object.value(dim) == feature)
    }

    /// Parse a symbol and check it is registered.
    pub fn parse(&self, symbol: &str) -> Result<Feature> {
        let feature: Feature = symbol.parse()?;
        self.dimension_of(feature)?;
        Ok(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(id: u32, shape: Feature, color: Feature, fill: Feature, size: Feature) -> Object {
        Object::new(id, shape, color, fill, size).unwrap()
    }

    #[test]
    fn test_feature_dimension_table() {
        assert_eq!(Feature::Circle.dimension(), Dimension::Shape);
        assert_eq!(Feature::Square.dimension(), Dimension::Shape);
        assert_eq!(Feature::Red.dimension(), Dimension::Color);
        assert_eq!(Feature::Blue.dimension(), Dimension::Color);
        assert_eq!(Feature::Solid.dimension(), Dimension::Fill);
        assert_eq!(Feature::Striped.dimension(), Dimension::Fill);
        assert_eq!(Feature::Big.dimension(), Dimension::Size);
        assert_eq!(Feature::Small.dimension(), Dimension::Size);
    }

    #[test]
    fn test_unknown_symbol_is_invalid_feature() {
        let err = "triangle".parse::<Feature>().unwrap_err();
        assert!(matches!(err, RevisionError::InvalidFeature(ref s) if s == "triangle"));

        let err = serde_json::from_str::<Hypothesis>(r#"["circle", "green"]"#).unwrap_err();
        assert!(err.to_string().contains("green"));
    }

    #[test]
    fn test_feature_serde_uses_symbols() {
        let h: Hypothesis = serde_json::from_str(r#"["red", "circle", "red"]"#).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(serde_json::to_string(&h).unwrap(), r#"["circle","red"]"#);
    }

    #[test]
    fn test_satisfies_and_predicts() {
        let o = obj(1, Feature::Circle, Feature::Red, Feature::Solid, Feature::Big);
        assert!(satisfies(Feature::Circle, &o));
        assert!(!satisfies(Feature::Square, &o));
        assert!(!satisfies(Feature::Small, &o));

        let h: Hypothesis = [Feature::Circle, Feature::Red].into_iter().collect();
        assert!(h.predicts(&o));
        assert!(!h.with(Feature::Striped).predicts(&o));
    }

    #[test]
    fn test_empty_hypothesis_predicts_everything() {
        let h = Hypothesis::new();
        let o = obj(7, Feature::Square, Feature::Blue, Feature::Striped, Feature::Small);
        assert!(h.predicts(&o));
    }

    #[test]
    fn test_object_rejects_misplaced_value() {
        let err = Object::new(1, Feature::Red, Feature::Red, Feature::Solid, Feature::Big).unwrap_err();
        assert!(matches!(err, RevisionError::InvalidInput(_)));

        let json = r#"{"id": 2, "shape": "circle", "color": "big", "fill": "solid", "size": "big"}"#;
        assert!(serde_json::from_str::<Object>(json).is_err());
    }

    #[test]
    fn test_hypothesis_tolerates_same_dimension_features() {
        let h: Hypothesis = [Feature::Circle, Feature::Square].into_iter().collect();
        assert_eq!(h.len(), 2);
        assert_eq!(h.used_dimensions().len(), 1);
    }

    #[test]
    fn test_difference_is_disjoint() {
        let a: Hypothesis = [Feature::Circle, Feature::Red].into_iter().collect();
        let b: Hypothesis = [Feature::Red, Feature::Big].into_iter().collect();
        let removed = a.difference(&b);
        let added = b.difference(&a);
        assert_eq!(removed, vec![Feature::Circle]);
        assert_eq!(added, vec![Feature::Big]);
        assert!(removed.iter().all(|f| !added.contains(f)));
    }

    #[test]
    fn test_standard_space_is_full_universe() {
        let space = FeatureSpace::standard();
        assert_eq!(space.features(), &Feature::ALL);
        assert!(std::ptr::eq(space, FeatureSpace::standard()));
        assert!(std::ptr::eq(space, FeatureSpace::shared().as_ref()));
    }

    #[test]
    fn test_reduced_space_rejects_unregistered_feature() {
        let space = FeatureSpace::new([Feature::Circle, Feature::Square, Feature::Circle]);
        assert_eq!(space.features().len(), 2);
        let o = obj(1, Feature::Circle, Feature::Red, Feature::Solid, Feature::Big);

        assert!(space.satisfies(Feature::Circle, &o).unwrap());
        assert!(matches!(
            space.satisfies(Feature::Red, &o),
            Err(RevisionError::InvalidFeature(_))
        ));
        assert!(matches!(space.parse("blue"), Err(RevisionError::InvalidFeature(_))));
        assert_eq!(space.parse("square").unwrap(), Feature::Square);
    }

    #[test]
    fn test_hypothesis_display() {
        let h: Hypothesis = [Feature::Red, Feature::Circle].into_iter().collect();
        assert_eq!(h.to_string(), "{circle, red}");
        assert_eq!(Hypothesis::new().to_string(), "{}");
    }
}
