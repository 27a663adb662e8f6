use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use time::Month;

use crate::domain::{PlanCategory, PlanRecord, PlanRequirements, RateStructure, Season};

const BUILTIN_CATALOG: &str = include_str!("../../catalog/taipower.toml");

/// Basic-fee label used when a plan does not price by meter spec.
pub const STANDARD_FEE_LABEL: &str = "standard";

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("failed to read plan catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse plan catalog: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid plan catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SeasonalRate {
    pub summer: f64,
    pub non_summer: f64,
}

impl SeasonalRate {
    pub fn for_season(&self, season: Season) -> f64 {
        match season {
            Season::Summer => self.summer,
            Season::NonSummer => self.non_summer,
        }
    }
}

/// A labelled hour window, `[start_hour, end_hour)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TouWindow {
    pub period: String,
    /// Applies to both seasons when absent.
    #[serde(default)]
    pub season: Option<Season>,
    /// Saturdays and Sundays fall through to off-peak.
    #[serde(default)]
    pub weekdays_only: bool,
    pub start_hour: u8,
    pub end_hour: u8,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OffPeak {
    #[serde(default)]
    pub label: Option<String>,
    pub summer: f64,
    pub non_summer: f64,
}

impl OffPeak {
    pub fn rate(&self, season: Season) -> f64 {
        SeasonalRate { summer: self.summer, non_summer: self.non_summer }.for_season(season)
    }
}

/// Monthly usage block. The last block of a plan is open-ended.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tier {
    #[serde(default)]
    pub up_to_kwh: Option<f64>,
    pub summer: f64,
    pub non_summer: f64,
}

impl Tier {
    pub fn rate(&self, season: Season) -> f64 {
        SeasonalRate { summer: self.summer, non_summer: self.non_summer }.for_season(season)
    }
}

fn default_summer_months() -> Vec<u8> {
    vec![6, 7, 8, 9]
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanDefinition {
    pub id: String,
    pub name: String,
    pub category: PlanCategory,
    pub rate_structure: RateStructure,
    /// Alternate ids the engine accepts; they are not listed in the directory.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub requires_contract_capacity: bool,
    #[serde(default)]
    pub requires_meter_spec: bool,
    #[serde(default)]
    pub uses_basic_fee_formula: bool,
    #[serde(default)]
    pub formula_type: Option<String>,
    #[serde(default = "default_summer_months")]
    pub summer_months: Vec<u8>,
    /// Monthly basic fee keyed by meter phase (or `standard`).
    #[serde(default)]
    pub basic_fees: BTreeMap<String, f64>,
    /// Monthly charge per contracted kW.
    #[serde(default)]
    pub capacity_rate: Option<SeasonalRate>,
    #[serde(default)]
    pub windows: Vec<TouWindow>,
    #[serde(default)]
    pub off_peak: Option<OffPeak>,
    #[serde(default)]
    pub tiers: Vec<Tier>,
}

impl PlanDefinition {
    pub fn matches(&self, plan_id: &str) -> bool {
        self.id == plan_id || self.aliases.iter().any(|a| a == plan_id)
    }

    pub fn season(&self, month: Month) -> Season {
        Season::of(month, &self.summer_months)
    }

    pub fn record(&self) -> PlanRecord {
        PlanRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category,
            rate_structure: self.rate_structure,
            requires_contract_capacity: self.requires_contract_capacity,
            requires_meter_spec: self.requires_meter_spec,
        }
    }

    pub fn requirements(&self, plan_id: &str) -> PlanRequirements {
        PlanRequirements {
            plan_id: plan_id.to_string(),
            requires_contract_capacity: self.requires_contract_capacity,
            requires_meter_spec: self.requires_meter_spec,
            valid_basic_fee_labels: self.basic_fees.keys().cloned().collect(),
            uses_basic_fee_formula: self.uses_basic_fee_formula,
            formula_type: self.formula_type.clone(),
        }
    }

    fn check(&self) -> Result<(), String> {
        if let Some(m) = self.summer_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(format!("plan '{}': summer month {m} is out of range", self.id));
        }
        if self.requires_meter_spec && self.basic_fees.is_empty() {
            return Err(format!("plan '{}' requires a meter spec but lists no basic fees", self.id));
        }
        match self.rate_structure {
            RateStructure::Tou => {
                if self.off_peak.is_none() {
                    return Err(format!("time-of-use plan '{}' has no off_peak rate", self.id));
                }
                if let Some(w) = self
                    .windows
                    .iter()
                    .find(|w| w.start_hour >= w.end_hour || w.end_hour > 24)
                {
                    return Err(format!(
                        "plan '{}': window '{}' {}-{} is not a valid hour range",
                        self.id, w.period, w.start_hour, w.end_hour
                    ));
                }
            }
            RateStructure::Tiered => {
                let Some(last) = self.tiers.last() else {
                    return Err(format!("tiered plan '{}' has no tiers", self.id));
                };
                if last.up_to_kwh.is_some() {
                    return Err(format!("tiered plan '{}': last tier must be open-ended", self.id));
                }
                let bounds: Vec<f64> = self.tiers.iter().filter_map(|t| t.up_to_kwh).collect();
                if bounds.len() != self.tiers.len() - 1 || bounds.windows(2).any(|b| b[0] >= b[1]) {
                    return Err(format!(
                        "tiered plan '{}': tier limits must be increasing and only the last tier open-ended",
                        self.id
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Naming-pattern rule used to describe ids missing from the catalog.
///
/// A rule matches when the id contains every `contains` fragment and none of
/// the `excludes` fragments. The first matching rule that sets a field wins.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRule {
    pub contains: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub category: Option<PlanCategory>,
    #[serde(default)]
    pub rate_structure: Option<RateStructure>,
}

impl ClassificationRule {
    fn matches(&self, plan_id: &str) -> bool {
        self.contains.iter().all(|c| plan_id.contains(c.as_str()))
            && !self.excludes.iter().any(|e| plan_id.contains(e.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TariffCatalog {
    #[serde(default)]
    pub classification: Vec<ClassificationRule>,
    pub plans: Vec<PlanDefinition>,
}

impl TariffCatalog {
    /// The plan set compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CatalogError> {
        let catalog: TariffCatalog = toml::from_str(contents)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for plan in &self.plans {
            for id in std::iter::once(&plan.id).chain(plan.aliases.iter()) {
                if !seen.insert(id.as_str()) {
                    return Err(CatalogError::Invalid(format!("plan id '{id}' is defined twice")));
                }
            }
            plan.check().map_err(CatalogError::Invalid)?;
        }
        Ok(())
    }

    /// Looks a plan up by id or alias.
    pub fn find(&self, plan_id: &str) -> Option<&PlanDefinition> {
        self.plans.iter().find(|p| p.matches(plan_id))
    }

    /// Category and rate structure guessed from the id's naming pattern.
    /// Falls back to lighting / time-of-use.
    pub fn classify(&self, plan_id: &str) -> (PlanCategory, RateStructure) {
        let mut category = None;
        let mut rate_structure = None;
        for rule in self.classification.iter().filter(|r| r.matches(plan_id)) {
            category = category.or(rule.category);
            rate_structure = rate_structure.or(rule.rate_structure);
        }
        (
            category.unwrap_or(PlanCategory::Lighting),
            rate_structure.unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [[plans]]
        id = "flat"
        name = "Flat"
        category = "low_voltage"
        rate_structure = "tou"
        aliases = ["flat_legacy"]
        off_peak = { summer = 2.0, non_summer = 1.0 }
    "#;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = TariffCatalog::builtin().unwrap();
        assert!(catalog.find("residential_simple_2_tier").is_some());
        assert!(catalog.find("residential_non_tou").is_some());
        assert!(catalog.plans.len() >= 5);
    }

    #[test]
    fn find_resolves_aliases() {
        let catalog = TariffCatalog::from_toml_str(MINIMAL).unwrap();
        assert_eq!(catalog.find("flat_legacy").map(|p| p.id.as_str()), Some("flat"));
        assert!(catalog.find("nope").is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doubled = format!("{MINIMAL}\n{}", MINIMAL.replace("aliases = [\"flat_legacy\"]", ""));
        let err = TariffCatalog::from_toml_str(&doubled).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(msg) if msg.contains("'flat'")));
    }

    #[test]
    fn tou_plan_without_off_peak_is_rejected() {
        let toml = r#"
            [[plans]]
            id = "broken"
            name = "Broken"
            category = "lighting"
            rate_structure = "tou"
        "#;
        assert!(matches!(
            TariffCatalog::from_toml_str(toml),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn tiered_plan_needs_open_last_tier() {
        let toml = r#"
            [[plans]]
            id = "blocks"
            name = "Blocks"
            category = "lighting"
            rate_structure = "tiered"
            tiers = [
                { up_to_kwh = 100.0, summer = 1.0, non_summer = 1.0 },
                { up_to_kwh = 200.0, summer = 2.0, non_summer = 2.0 },
            ]
        "#;
        assert!(matches!(
            TariffCatalog::from_toml_str(toml),
            Err(CatalogError::Invalid(msg)) if msg.contains("open-ended")
        ));
    }

    #[test]
    fn classify_uses_first_matching_rule_per_field() {
        let toml = r#"
            [[classification]]
            contains = ["non_tou"]
            rate_structure = "tiered"

            [[classification]]
            contains = ["high_voltage"]
            excludes = ["extra_high"]
            category = "high_voltage"

            [[classification]]
            contains = ["extra_high"]
            category = "extra_high_voltage"

            [[classification]]
            contains = ["voltage"]
            category = "low_voltage"

            [[plans]]
            id = "flat"
            name = "Flat"
            category = "low_voltage"
            rate_structure = "tou"
            off_peak = { summer = 2.0, non_summer = 1.0 }
        "#;
        let catalog = TariffCatalog::from_toml_str(toml).unwrap();

        assert_eq!(
            catalog.classify("high_voltage_non_tou"),
            (PlanCategory::HighVoltage, RateStructure::Tiered)
        );
        assert_eq!(
            catalog.classify("extra_high_voltage_2_tier"),
            (PlanCategory::ExtraHighVoltage, RateStructure::Tou)
        );
        assert_eq!(
            catalog.classify("mystery"),
            (PlanCategory::Lighting, RateStructure::Tou)
        );
    }

    #[test]
    fn requirements_list_basic_fee_labels() {
        let catalog = TariffCatalog::builtin().unwrap();
        let plan = catalog.find("residential_simple_2_tier").unwrap();
        let reqs = plan.requirements("residential_simple_2_tier");
        assert!(reqs.requires_meter_spec);
        assert_eq!(reqs.valid_basic_fee_labels, vec!["single".to_string(), "three".to_string()]);
    }
}
