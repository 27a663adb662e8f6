use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How often the utility issues a bill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    #[default]
    Monthly,
    /// Two-month periods starting in odd months (Jan–Feb, Mar–Apr, …).
    OddMonth,
    /// Two-month periods starting in even months (Feb–Mar, …, Dec–Jan).
    EvenMonth,
}

impl BillingCycle {
    pub fn months_per_period(&self) -> u8 {
        match self {
            Self::Monthly => 1,
            Self::OddMonth | Self::EvenMonth => 2,
        }
    }
}

/// Optional billing parameters forwarded to the tariff engine.
///
/// `None` means "not supplied", which some plans treat differently from an
/// explicit zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_voltage_v: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_ampere: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_capacity_kw: Option<f64>,
    /// Contract capacity per period label (e.g. `regular`, `off_peak`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_capacities: Option<BTreeMap<String, f64>>,
    /// Power factor in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demand_kw: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle_type: Option<BillingCycle>,
}

impl BillingInputs {
    /// Effective contract capacity: the flat value, else the sum of the
    /// per-period capacities.
    pub fn contract_capacity(&self) -> Option<f64> {
        if let Some(kw) = self.contract_capacity_kw {
            return Some(kw);
        }
        self.contract_capacities
            .as_ref()
            .filter(|m| !m.is_empty())
            .map(|m| m.values().sum())
    }

    pub fn billing_cycle(&self) -> BillingCycle {
        self.billing_cycle_type.unwrap_or_default()
    }

    /// Peak of the supplied demand series, if any.
    pub fn peak_demand_kw(&self) -> Option<f64> {
        self.demand_kw
            .as_ref()
            .and_then(|d| d.iter().copied().reduce(f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_capacity_prefers_flat_value() {
        let mut inputs = BillingInputs {
            contract_capacities: Some(BTreeMap::from([
                ("regular".to_string(), 100.0),
                ("off_peak".to_string(), 20.0),
            ])),
            ..Default::default()
        };
        assert_eq!(inputs.contract_capacity(), Some(120.0));

        inputs.contract_capacity_kw = Some(80.0);
        assert_eq!(inputs.contract_capacity(), Some(80.0));
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let inputs = BillingInputs {
            meter_phase: Some("single".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&inputs).unwrap();
        assert_eq!(json, serde_json::json!({ "meter_phase": "single" }));
    }

    #[test]
    fn billing_cycle_defaults_to_monthly() {
        let inputs: BillingInputs = serde_json::from_str("{}").unwrap();
        assert_eq!(inputs.billing_cycle(), BillingCycle::Monthly);

        let inputs: BillingInputs =
            serde_json::from_str(r#"{"billing_cycle_type": "even_month", "demand_kw": [3.0, 7.5, 2.0]}"#).unwrap();
        assert_eq!(inputs.billing_cycle(), BillingCycle::EvenMonth);
        assert_eq!(inputs.billing_cycle().months_per_period(), 2);
        assert_eq!(inputs.peak_demand_kw(), Some(7.5));
    }
}
