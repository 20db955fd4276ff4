//! Strategy registry: maps strategy identifiers to rule-set variants.
//!
//! Registry file layout:
//!
//! ```ini
//! [strategies]
//! Strategy 1 = BollingerRSIReversal
//! Trend = moving_average_trend
//! ```

use crate::domain::error::EngineError;
use crate::domain::strategy::StrategyVariant;
use crate::ports::config_port::ConfigPort;

pub const REGISTRY_SECTION: &str = "strategies";

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRegistry {
    entries: Vec<(String, StrategyVariant)>,
}

impl StrategyRegistry {
    /// `Strategy 1` through `Strategy 4`, one per variant.
    pub fn builtin() -> Self {
        let entries = StrategyVariant::ALL
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("Strategy {}", i + 1), v))
            .collect();
        Self { entries }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        if !config.has_section(REGISTRY_SECTION) {
            return Err(EngineError::ConfigMissing {
                section: REGISTRY_SECTION.to_string(),
                key: "<any strategy>".to_string(),
            });
        }

        let mut entries = Vec::new();
        for id in config.keys(REGISTRY_SECTION) {
            let raw = config
                .get_string(REGISTRY_SECTION, &id)
                .unwrap_or_default();
            let variant = raw
                .parse::<StrategyVariant>()
                .map_err(|reason| EngineError::invalid(REGISTRY_SECTION, &id, reason))?;
            entries.push((id, variant));
        }

        if entries.is_empty() {
            return Err(EngineError::invalid(
                REGISTRY_SECTION,
                "<any strategy>",
                "registry defines no strategies",
            ));
        }
        Ok(Self { entries })
    }

    /// The registered spelling of `id` and its variant. Exact identifier first,
    /// then a case-insensitive match.
    pub fn lookup(&self, id: &str) -> Result<(&str, StrategyVariant), EngineError> {
        let id = id.trim();
        self.entries
            .iter()
            .find(|(name, _)| name == id)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(id))
            })
            .map(|(name, v)| (name.as_str(), *v))
            .ok_or_else(|| EngineError::UnknownStrategy { id: id.to_string() })
    }

    pub fn resolve(&self, id: &str) -> Result<StrategyVariant, EngineError> {
        self.lookup(id).map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, StrategyVariant)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn builtin_has_one_entry_per_variant() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.resolve("Strategy 1").unwrap(),
            StrategyVariant::BollingerRsiReversal
        );
        assert_eq!(
            registry.resolve("Strategy 4").unwrap(),
            StrategyVariant::MovingAverageTrend
        );
    }

    #[test]
    fn resolve_falls_back_to_case_insensitive() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(
            registry.resolve(" strategy 3 ").unwrap(),
            StrategyVariant::MacdBollingerMomentum
        );
    }

    #[test]
    fn lookup_returns_registered_spelling() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(
            registry.lookup("STRATEGY 4").unwrap(),
            ("Strategy 4", StrategyVariant::MovingAverageTrend)
        );
        assert_eq!(registry.lookup("Strategy 2").unwrap().0, "Strategy 2");
    }

    #[test]
    fn unknown_identifier() {
        let err = StrategyRegistry::builtin().resolve("Strategy 9").unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy { ref id } if id == "Strategy 9"));
    }

    #[test]
    fn loads_from_ini() {
        let config = FileConfigAdapter::from_string(
            "[strategies]\n\
             Strategy 1 = All_strategies.BollingerRSIReversal\n\
             Trend = moving_average_trend\n",
        )
        .unwrap();
        let registry = StrategyRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.resolve("Trend").unwrap(),
            StrategyVariant::MovingAverageTrend
        );
        assert!(registry.resolve("Strategy 2").is_err());
    }

    #[test]
    fn bad_variant_names_the_entry() {
        let config =
            FileConfigAdapter::from_string("[strategies]\nMine = MeanReversion\n").unwrap();
        let err = StrategyRegistry::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ConfigInvalid { ref section, ref key, .. }
                if section == "strategies" && key == "Mine"
        ));
    }

    #[test]
    fn missing_section_is_an_error() {
        let config = FileConfigAdapter::from_string("[other]\na = b\n").unwrap();
        assert!(matches!(
            StrategyRegistry::from_config(&config),
            Err(EngineError::ConfigMissing { .. })
        ));
    }
}
