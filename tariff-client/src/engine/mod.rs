//! Tariff engine seam.
//!
//! Billing code only talks to [`TariffEngine`]. [`RateTableEngine`] is the
//! catalog-driven implementation shipped with the crate.

pub mod catalog;
pub mod rate_table;

pub use catalog::{CatalogError, ClassificationRule, PlanDefinition, TariffCatalog};
pub use rate_table::RateTableEngine;

use serde::Serialize;
use time::{Date, PrimitiveDateTime};

use crate::domain::{
    iso_local, BillingInputs, PlanCategory, PlanRecord, PlanRequirements, RateStructure, Season, UsageSeries,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("plan not found: {0}")]
    PlanNotFound(String),
    #[error("plan '{plan_id}' requires {field}")]
    MissingInput { plan_id: String, field: &'static str },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("calculation error: {0}")]
    Calculation(String),
}

/// Cost of one usage interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalCost {
    #[serde(with = "iso_local")]
    pub timestamp: PrimitiveDateTime,
    /// Energy charge for the interval's kWh.
    pub energy: f64,
    /// Share of the month's fixed charges (basic fee, capacity, adjustments).
    pub fixed: f64,
    pub total: f64,
}

/// One interval annotated with the tariff's month/season/period view.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub timestamp: PrimitiveDateTime,
    /// First day of the interval's calendar month.
    pub month: Date,
    pub season: Season,
    /// `None` when the plan has no label for the interval.
    pub period: Option<String>,
    pub usage_kwh: f64,
    /// Energy cost only; fixed charges are reported by `interval_costs`.
    pub cost: f64,
}

pub trait TariffEngine: Send + Sync {
    /// Every plan the engine can price under its canonical id.
    fn plan_directory(&self) -> Vec<PlanRecord>;

    fn requirements(&self, plan_id: &str) -> Result<PlanRequirements, EngineError>;

    /// Directory id for `plan_id` when it is an alias or a canonical id.
    /// `None` means the engine knows no such plan.
    fn canonical_id(&self, _plan_id: &str) -> Option<String> {
        None
    }

    /// Category and rate structure assumed for an id the directory does not
    /// list.
    fn classify(&self, _plan_id: &str) -> (PlanCategory, RateStructure) {
        (PlanCategory::Lighting, RateStructure::Tou)
    }

    fn interval_costs(
        &self,
        usage: &UsageSeries,
        plan_id: &str,
        inputs: &BillingInputs,
    ) -> Result<Vec<IntervalCost>, EngineError>;

    fn breakdown(
        &self,
        usage: &UsageSeries,
        plan_id: &str,
        inputs: &BillingInputs,
    ) -> Result<Vec<BreakdownRow>, EngineError>;
}
