//! Measurement catalog and module kinds.
//!
//! Measurement kinds are split into two disjoint tiers:
//!
//! - **Standard**: historized whenever historization is on.
//! - **Extended**: historized only in "full" mode.
//!
//! Kinds absent from both tiers are never historized.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Well-known measurement kinds with special operator rules.
pub mod kinds {
    /// Air temperature, °C.
    pub const TEMPERATURE: &str = "temperature";
    /// Relative humidity, %.
    pub const HUMIDITY: &str = "humidity";
    /// Atmospheric pressure, hPa.
    pub const PRESSURE: &str = "pressure";
    /// Cumulative precipitation since local midnight.
    pub const RAIN_DAY_AGGREGATED: &str = "rain_day_aggregated";
    /// Instantaneous precipitation.
    pub const RAIN: &str = "rain";
    /// Categorical weather condition code.
    pub const WEATHER: &str = "weather";
    /// Lightning strikes per recording bucket.
    pub const STRIKE_COUNT: &str = "strike_count";
}

/// Module kind of the live "current conditions" pseudo-module.
pub const LIVE_MODULE: &str = "NACurrent";

/// Whether `module_type` is the live/current pseudo-module.
pub fn is_live_module(module_type: &str) -> bool {
    module_type == LIVE_MODULE
}

/// Tier of a measurement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Tier {
    Standard,
    Extended,
}

const STANDARD: &[&str] = &[
    "absolute_humidity",
    "cbi",
    "cloud_ceiling",
    "cloud_cover",
    "co",
    "co2",
    "dew_point",
    "evapotranspiration",
    "guststrength",
    "health_idx",
    "heat_index",
    "humidex",
    "humidity",
    "illuminance",
    "irradiance",
    "leaf_wetness",
    "moisture_content",
    "moisture_tension",
    "noise",
    "o3",
    "pressure",
    "pressure_sl",
    "rain_day_aggregated",
    "soil_temperature",
    "sunshine",
    "temperature",
    "uv_index",
    "visibility",
    "weather",
    "wind_chill",
    "windstrength",
];

const EXTENDED: &[&str] = &[
    "air_density",
    "delta_t",
    "emc",
    "equivalent_potential_temperature",
    "equivalent_temperature",
    "frost_point",
    "gustangle",
    "partial_absolute_humidity",
    "partial_vapor_pressure",
    "potential_temperature",
    "rain",
    "rain_hour_aggregated",
    "saturation_absolute_humidity",
    "saturation_vapor_pressure",
    "specific_enthalpy",
    "steadman",
    "strike_count",
    "strike_distance",
    "strike_instant",
    "summer_simmer",
    "wet_bulb",
    "windangle",
    "wood_emc",
];

/// Static classification of measurement kinds.
///
/// ```
/// use wxhist_types::{MeasurementCatalog, Tier};
///
/// let catalog = MeasurementCatalog::DEFAULT;
/// assert_eq!(catalog.tier("temperature"), Some(Tier::Standard));
/// assert_eq!(catalog.tier("strike_count"), Some(Tier::Extended));
/// assert_eq!(catalog.tier("battery"), None);
/// assert!(!catalog.is_historizable("windangle", false));
/// assert!(catalog.is_historizable("windangle", true));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementCatalog {
    standard: &'static [&'static str],
    extended: &'static [&'static str],
}

impl MeasurementCatalog {
    /// Catalog of the kinds known to weather station modules.
    pub const DEFAULT: MeasurementCatalog = MeasurementCatalog {
        standard: STANDARD,
        extended: EXTENDED,
    };

    /// Build a catalog from custom tables.
    ///
    /// Tables must be disjoint; a kind listed in both is treated as standard.
    pub const fn new(standard: &'static [&'static str], extended: &'static [&'static str]) -> Self {
        Self { standard, extended }
    }

    pub fn is_standard(&self, kind: &str) -> bool {
        self.standard.contains(&kind)
    }

    pub fn is_extended(&self, kind: &str) -> bool {
        !self.is_standard(kind) && self.extended.contains(&kind)
    }

    pub fn tier(&self, kind: &str) -> Option<Tier> {
        if self.is_standard(kind) {
            Some(Tier::Standard)
        } else if self.is_extended(kind) {
            Some(Tier::Extended)
        } else {
            None
        }
    }

    /// Whether `kind` is eligible for history under the given mode.
    pub fn is_historizable(&self, kind: &str, full_mode: bool) -> bool {
        match self.tier(kind) {
            Some(Tier::Standard) => true,
            Some(Tier::Extended) => full_mode,
            None => false,
        }
    }

    /// Every historizable kind (standard first).
    pub fn all(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.standard.iter().chain(self.extended.iter()).copied()
    }
}

impl Default for MeasurementCatalog {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers_are_disjoint() {
        for kind in STANDARD {
            assert!(!EXTENDED.contains(kind), "{kind} is in both tiers");
        }
    }

    #[test]
    fn test_special_kinds_are_classified() {
        let catalog = MeasurementCatalog::DEFAULT;
        assert_eq!(catalog.tier(kinds::RAIN_DAY_AGGREGATED), Some(Tier::Standard));
        assert_eq!(catalog.tier(kinds::WEATHER), Some(Tier::Standard));
        assert_eq!(catalog.tier(kinds::RAIN), Some(Tier::Extended));
        assert_eq!(catalog.tier(kinds::STRIKE_COUNT), Some(Tier::Extended));
    }

    #[test]
    fn test_unknown_kind_is_in_no_tier() {
        let catalog = MeasurementCatalog::DEFAULT;
        for kind in ["", "battery", "TEMPERATURE", "signal_rf"] {
            assert!(!catalog.is_standard(kind));
            assert!(!catalog.is_extended(kind));
            assert!(!catalog.is_historizable(kind, true));
        }
    }

    #[test]
    fn test_custom_catalog_overlap_prefers_standard() {
        const BOTH: &[&str] = &["x"];
        let catalog = MeasurementCatalog::new(BOTH, BOTH);
        assert_eq!(catalog.tier("x"), Some(Tier::Standard));
        assert!(!catalog.is_extended("x"));
    }

    #[test]
    fn test_all_lists_every_kind() {
        let catalog = MeasurementCatalog::DEFAULT;
        assert_eq!(catalog.all().count(), STANDARD.len() + EXTENDED.len());
    }

    #[test]
    fn test_live_module() {
        assert!(is_live_module("NACurrent"));
        assert!(!is_live_module("NAModule3"));
    }
}
