//! Operator policy resolution.
//!
//! Decides, for one measurement series, which statistics are computed and
//! under which `measure_set` labels. Resolution is a pure function of the
//! measurement kind, the module kind, the full-mode flag and the request
//! mode:
//!
//! 1. Kinds that are not historizable get an empty base set.
//! 2. Historizable kinds get the base set of the request mode.
//! 3. Per-kind overrides replace the set, whatever step 1 decided.
//!
//! An empty set means "do not aggregate this series".

use wxhist_types::{
    Central, MeasureSet, MeasurementCatalog, Operator, OperatorSet, is_live_module, kinds,
};

/// Shape of the statistics requested from the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Daily summaries written by the rollup.
    #[default]
    Plain,
    /// Pairwise comparisons of central statistics (`AVG|MID`).
    Comparison,
    /// Central statistics for distribution views.
    Distribution,
}

impl RequestMode {
    /// Mode from the two request flags. Comparison wins when both are set.
    pub fn from_flags(comparison: bool, distribution: bool) -> Self {
        if comparison {
            RequestMode::Comparison
        } else if distribution {
            RequestMode::Distribution
        } else {
            RequestMode::Plain
        }
    }
}

/// Operator resolver bound to a measurement catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorPolicy {
    catalog: MeasurementCatalog,
}

impl OperatorPolicy {
    pub const fn new(catalog: MeasurementCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &MeasurementCatalog {
        &self.catalog
    }

    /// Operators to compute for `measure_type` on a `module_type` module.
    pub fn resolve(
        &self,
        measure_type: &str,
        module_type: &str,
        full_mode: bool,
        mode: RequestMode,
    ) -> OperatorSet {
        let base = if self.catalog.is_historizable(measure_type, full_mode) {
            base_set(mode, full_mode)
        } else {
            OperatorSet::new()
        };

        match measure_type {
            kinds::RAIN_DAY_AGGREGATED => match mode {
                RequestMode::Plain => OperatorSet::new().with(Operator::Max, MeasureSet::Agg),
                _ => OperatorSet::new(),
            },
            kinds::RAIN if is_live_module(module_type) => OperatorSet::new(),
            kinds::RAIN if full_mode => base_set(mode, true),
            kinds::WEATHER => match mode {
                RequestMode::Plain => OperatorSet::new().with(Operator::FqcMax, MeasureSet::Dom),
                _ => OperatorSet::new(),
            },
            kinds::STRIKE_COUNT if full_mode && self.catalog.is_extended(measure_type) => {
                match mode {
                    RequestMode::Plain => {
                        OperatorSet::new().with(Operator::HrMax, MeasureSet::MaxHr)
                    }
                    _ => base,
                }
            }
            _ => base,
        }
    }
}

fn base_set(mode: RequestMode, full_mode: bool) -> OperatorSet {
    match mode {
        RequestMode::Plain => {
            let mut set = OperatorSet::new()
                .with(Operator::Max, MeasureSet::Max)
                .with(Operator::Min, MeasureSet::Min)
                .with(Operator::Avg, MeasureSet::Avg)
                .with(Operator::Mid, MeasureSet::Mid);
            if full_mode {
                set.insert(Operator::Std, MeasureSet::Dev);
                set.insert(Operator::Med, MeasureSet::Med);
                set.insert(Operator::Amp, MeasureSet::Amp);
            }
            set
        }
        RequestMode::Comparison if full_mode => Central::ALL
            .iter()
            .flat_map(|&a| Central::ALL.iter().map(move |&b| (a, b)))
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (Operator::Compare(a, b), MeasureSet::Compare(a, b)))
            .collect(),
        RequestMode::Comparison => OperatorSet::new()
            .with(
                Operator::Compare(Central::Avg, Central::Mid),
                MeasureSet::Compare(Central::Avg, Central::Mid),
            )
            .with(
                Operator::Compare(Central::Mid, Central::Avg),
                MeasureSet::Compare(Central::Mid, Central::Avg),
            ),
        RequestMode::Distribution => {
            let mut set = OperatorSet::new()
                .with(Operator::Avg, MeasureSet::Avg)
                .with(Operator::Mid, MeasureSet::Mid);
            if full_mode {
                set.insert(Operator::Med, MeasureSet::Med);
            }
            set
        }
    }
}

/// Resolve against the default catalog from raw request flags.
///
/// ```
/// use wxhist_core::resolve;
/// use wxhist_types::{MeasureSet, Operator};
///
/// let set = resolve("rain_day_aggregated", "NAModule3", false, false, false);
/// assert_eq!(set.label(Operator::Max), Some(MeasureSet::Agg));
/// assert_eq!(set.len(), 1);
/// ```
pub fn resolve(
    measure_type: &str,
    module_type: &str,
    full_mode: bool,
    comparison_mode: bool,
    distribution_mode: bool,
) -> OperatorSet {
    OperatorPolicy::new(MeasurementCatalog::DEFAULT).resolve(
        measure_type,
        module_type,
        full_mode,
        RequestMode::from_flags(comparison_mode, distribution_mode),
    )
}
