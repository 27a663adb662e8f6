use serde::{Deserialize, Serialize};
use time::Month;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCategory {
    Lighting,
    LowVoltage,
    HighVoltage,
    ExtraHighVoltage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateStructure {
    /// Time-of-use: the rate depends on the period an interval falls in.
    #[default]
    Tou,
    /// Block tariff: the rate depends on cumulative usage in the billing period.
    Tiered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Summer,
    NonSummer,
}

impl Season {
    pub fn of(month: Month, summer_months: &[u8]) -> Self {
        if summer_months.contains(&u8::from(month)) {
            Self::Summer
        } else {
            Self::NonSummer
        }
    }
}

/// Directory entry describing a plan for display and request validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: String,
    pub name: String,
    pub category: PlanCategory,
    pub rate_structure: RateStructure,
    pub requires_contract_capacity: bool,
    pub requires_meter_spec: bool,
}

/// Inputs a plan needs before it can be priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequirements {
    pub plan_id: String,
    pub requires_contract_capacity: bool,
    pub requires_meter_spec: bool,
    pub valid_basic_fee_labels: Vec<String>,
    pub uses_basic_fee_formula: bool,
    pub formula_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_follows_summer_months() {
        let summer = [6, 7, 8, 9];
        assert_eq!(Season::of(Month::June, &summer), Season::Summer);
        assert_eq!(Season::of(Month::September, &summer), Season::Summer);
        assert_eq!(Season::of(Month::October, &summer), Season::NonSummer);
        assert_eq!(Season::of(Month::May, &[5, 6, 7, 8, 9, 10]), Season::Summer);
    }

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(
            serde_json::to_value(PlanCategory::ExtraHighVoltage).unwrap(),
            "extra_high_voltage"
        );
        assert_eq!(serde_json::to_value(RateStructure::Tiered).unwrap(), "tiered");
        assert_eq!(serde_json::to_value(Season::NonSummer).unwrap(), "non_summer");
    }
}
