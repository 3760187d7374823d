//! Operator tokens, output labels and operator sets.
//!
//! An [`Operator`] names a statistic (`MAX`, `FQC_MAX`, `AVG|MID`...). A
//! [`MeasureSet`] is the label written to the `measure_set` column of a
//! historical record. An [`OperatorSet`] maps operators to labels for one
//! measurement, keeping insertion order.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Central statistics that can be paired in comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Central {
    /// Arithmetic mean.
    Avg,
    /// Median.
    Med,
    /// Midpoint between max and min.
    Mid,
}

impl Central {
    /// All central statistics, in comparison-set order.
    pub const ALL: [Central; 3] = [Central::Avg, Central::Med, Central::Mid];

    /// Upper-case token fragment (`"AVG"`).
    pub fn token(self) -> &'static str {
        match self {
            Central::Avg => "AVG",
            Central::Med => "MED",
            Central::Mid => "MID",
        }
    }

    /// Lower-case label fragment (`"avg"`).
    pub fn label(self) -> &'static str {
        match self {
            Central::Avg => "avg",
            Central::Med => "med",
            Central::Mid => "mid",
        }
    }

    fn from_token(s: &str) -> Option<Self> {
        match s {
            "AVG" => Some(Central::Avg),
            "MED" => Some(Central::Med),
            "MID" => Some(Central::Mid),
            _ => None,
        }
    }

    fn from_label(s: &str) -> Option<Self> {
        match s {
            "avg" => Some(Central::Avg),
            "med" => Some(Central::Med),
            "mid" => Some(Central::Mid),
            _ => None,
        }
    }
}

/// A statistical operator token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operator {
    /// Maximum value.
    Max,
    /// Minimum value.
    Min,
    /// Arithmetic mean.
    Avg,
    /// Population standard deviation.
    Std,
    /// Median.
    Med,
    /// Midpoint, `(max + min) / 2`. Derived on read.
    Mid,
    /// Amplitude, `max - min`. Derived on read.
    Amp,
    /// Most frequent value.
    FqcMax,
    /// Least frequent value.
    FqcMin,
    /// Window maximum scaled down to an hourly peak.
    HrMax,
    /// Pairing of two central statistics (`AVG|MID`). Derived on read.
    Compare(Central, Central),
}

impl Operator {
    /// Token as written in policy tables (`"MAX"`, `"FQC_MAX"`, `"AVG|MID"`).
    pub fn token(&self) -> String {
        match self {
            Operator::Compare(a, b) => format!("{}|{}", a.token(), b.token()),
            other => other.simple_token().to_string(),
        }
    }

    fn simple_token(&self) -> &'static str {
        match self {
            Operator::Max => "MAX",
            Operator::Min => "MIN",
            Operator::Avg => "AVG",
            Operator::Std => "STD",
            Operator::Med => "MED",
            Operator::Mid => "MID",
            Operator::Amp => "AMP",
            Operator::FqcMax => "FQC_MAX",
            Operator::FqcMin => "FQC_MIN",
            Operator::HrMax => "HR_MAX",
            Operator::Compare(..) => "",
        }
    }

    /// Label used when no override applies.
    ///
    /// ```
    /// use wxhist_types::{MeasureSet, Operator};
    ///
    /// assert_eq!(Operator::Std.default_label(), MeasureSet::Dev);
    /// assert_eq!(Operator::FqcMax.default_label(), MeasureSet::Dom);
    /// ```
    pub fn default_label(&self) -> MeasureSet {
        match self {
            Operator::Max => MeasureSet::Max,
            Operator::Min => MeasureSet::Min,
            Operator::Avg => MeasureSet::Avg,
            Operator::Std => MeasureSet::Dev,
            Operator::Med => MeasureSet::Med,
            Operator::Mid => MeasureSet::Mid,
            Operator::Amp => MeasureSet::Amp,
            Operator::FqcMax | Operator::FqcMin => MeasureSet::Dom,
            Operator::HrMax => MeasureSet::MaxHr,
            Operator::Compare(a, b) => MeasureSet::Compare(*a, *b),
        }
    }

    /// Whether the value is computed by consumers from other stored values
    /// rather than persisted by the rollup.
    pub fn is_derived(&self) -> bool {
        matches!(self, Operator::Mid | Operator::Amp | Operator::Compare(..))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Compare(a, b) => write!(f, "{}|{}", a.token(), b.token()),
            other => f.write_str(other.simple_token()),
        }
    }
}

impl FromStr for Operator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "MAX" => Operator::Max,
            "MIN" => Operator::Min,
            "AVG" => Operator::Avg,
            "STD" => Operator::Std,
            "MED" => Operator::Med,
            "MID" => Operator::Mid,
            "AMP" => Operator::Amp,
            "FQC_MAX" => Operator::FqcMax,
            "FQC_MIN" => Operator::FqcMin,
            "HR_MAX" => Operator::HrMax,
            _ => {
                return s
                    .split_once('|')
                    .and_then(|(a, b)| Some((Central::from_token(a)?, Central::from_token(b)?)))
                    .filter(|(a, b)| a != b)
                    .map(|(a, b)| Operator::Compare(a, b))
                    .ok_or_else(|| ParseError::UnknownOperator(s.to_string()));
            }
        };
        Ok(op)
    }
}

/// Discriminator of a historical record (`measure_set` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MeasureSet {
    Max,
    Min,
    Avg,
    Dev,
    Mid,
    Med,
    Amp,
    /// Daily aggregate (cumulative kinds).
    Agg,
    /// Dominant value.
    Dom,
    /// Hourly maximum.
    MaxHr,
    /// Comparison pair (`avg|mid`).
    Compare(Central, Central),
}

impl MeasureSet {
    /// Label as stored (`"max"`, `"maxhr"`, `"avg|mid"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureSet::Max => "max",
            MeasureSet::Min => "min",
            MeasureSet::Avg => "avg",
            MeasureSet::Dev => "dev",
            MeasureSet::Mid => "mid",
            MeasureSet::Med => "med",
            MeasureSet::Amp => "amp",
            MeasureSet::Agg => "agg",
            MeasureSet::Dom => "dom",
            MeasureSet::MaxHr => "maxhr",
            MeasureSet::Compare(a, b) => match (a, b) {
                (Central::Avg, Central::Med) => "avg|med",
                (Central::Avg, Central::Mid) => "avg|mid",
                (Central::Med, Central::Avg) => "med|avg",
                (Central::Med, Central::Mid) => "med|mid",
                (Central::Mid, Central::Avg) => "mid|avg",
                (Central::Mid, Central::Med) => "mid|med",
                // Not constructible through FromStr or the policy tables.
                (Central::Avg, Central::Avg) => "avg",
                (Central::Med, Central::Med) => "med",
                (Central::Mid, Central::Mid) => "mid",
            },
        }
    }
}

impl fmt::Display for MeasureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let set = match s {
            "max" => MeasureSet::Max,
            "min" => MeasureSet::Min,
            "avg" => MeasureSet::Avg,
            "dev" => MeasureSet::Dev,
            "mid" => MeasureSet::Mid,
            "med" => MeasureSet::Med,
            "amp" => MeasureSet::Amp,
            "agg" => MeasureSet::Agg,
            "dom" => MeasureSet::Dom,
            "maxhr" => MeasureSet::MaxHr,
            _ => {
                return s
                    .split_once('|')
                    .and_then(|(a, b)| Some((Central::from_label(a)?, Central::from_label(b)?)))
                    .filter(|(a, b)| a != b)
                    .map(|(a, b)| MeasureSet::Compare(a, b))
                    .ok_or_else(|| ParseError::UnknownMeasureSet(s.to_string()));
            }
        };
        Ok(set)
    }
}

/// One `(token, label)` pair of an operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperatorSpec {
    pub operator: Operator,
    pub label: MeasureSet,
}

impl OperatorSpec {
    pub fn new(operator: Operator, label: MeasureSet) -> Self {
        Self { operator, label }
    }
}

/// Ordered mapping from operator to output label.
///
/// Each operator appears at most once. Inserting an operator that is already
/// present replaces its label and keeps its position.
///
/// ```
/// use wxhist_types::{MeasureSet, Operator, OperatorSet};
///
/// let mut set = OperatorSet::new()
///     .with(Operator::Max, MeasureSet::Max)
///     .with(Operator::Min, MeasureSet::Min);
/// set.insert(Operator::Max, MeasureSet::Agg);
///
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.label(Operator::Max), Some(MeasureSet::Agg));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperatorSet {
    specs: Vec<OperatorSpec>,
}

impl OperatorSet {
    /// An empty set ("do not aggregate").
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, operator: Operator, label: MeasureSet) -> Self {
        self.insert(operator, label);
        self
    }

    /// Insert or replace the label for `operator`.
    pub fn insert(&mut self, operator: Operator, label: MeasureSet) {
        match self.specs.iter_mut().find(|s| s.operator == operator) {
            Some(spec) => spec.label = label,
            None => self.specs.push(OperatorSpec::new(operator, label)),
        }
    }

    /// Label mapped to `operator`, if present.
    pub fn label(&self, operator: Operator) -> Option<MeasureSet> {
        self.specs
            .iter()
            .find(|s| s.operator == operator)
            .map(|s| s.label)
    }

    pub fn contains(&self, operator: Operator) -> bool {
        self.label(operator).is_some()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperatorSpec> {
        self.specs.iter()
    }

    /// Tokens in insertion order, mostly useful for logging.
    pub fn tokens(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.operator.token()).collect()
    }
}

impl FromIterator<(Operator, MeasureSet)> for OperatorSet {
    fn from_iter<I: IntoIterator<Item = (Operator, MeasureSet)>>(iter: I) -> Self {
        let mut set = OperatorSet::new();
        for (operator, label) in iter {
            set.insert(operator, label);
        }
        set
    }
}

impl<'a> IntoIterator for &'a OperatorSet {
    type Item = &'a OperatorSpec;
    type IntoIter = std::slice::Iter<'a, OperatorSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}
