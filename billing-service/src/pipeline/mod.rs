//! Billing orchestration: normalized usage in, priced plans out.

pub mod compare;

pub use compare::{ComparisonOutcome, PlanComparison};

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use serde::Serialize;
use tariff_client::{
    domain::iso_local, BillingInputs, BreakdownRow, EngineError, PlanRecord, Season, TariffEngine, UsageSeries,
};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use crate::{
    directory::PlanDirectory,
    rounding::round2,
    sources::IngestError,
    transform::{UsageNormalizer, UsagePayload},
};

/// Label for breakdown rows the engine left without a period.
pub const UNKNOWN_PERIOD: &str = "unknown";

#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("Plan not found: {0}")]
    PlanNotFound(String),
    #[error(transparent)]
    Engine(EngineError),
    #[error("All {} plan(s) failed to calculate:\n{}", .failures.len(), failure_lines(.failures))]
    AllPlansFailed { failures: Vec<FailedPlan> },
}

fn failure_lines(failures: &[FailedPlan]) -> String {
    failures
        .iter()
        .map(|f| format!("- {}: {}", f.plan_id, f.error_message))
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<EngineError> for BillingError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::PlanNotFound(id) => Self::PlanNotFound(id),
            other => Self::Engine(other),
        }
    }
}

impl BillingError {
    /// Stable error name reported to clients and in `failed_plans`.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Ingest(e) => e.kind(),
            Self::PlanNotFound(_) => "PlanNotFoundError",
            Self::Engine(_) => "EngineError",
            Self::AllPlansFailed { .. } => "AllPlansFailedError",
        }
    }

    /// Whether the caller's request caused the failure.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Ingest(_) | Self::PlanNotFound(_) | Self::AllPlansFailed { .. } => true,
            Self::Engine(e) => matches!(e, EngineError::MissingInput { .. } | EngineError::InvalidInput(_)),
        }
    }
}

/// A plan that could not be priced during a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPlan {
    pub plan_id: String,
    pub error_type: String,
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodCost {
    pub period: String,
    pub usage_kwh: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBreakdown {
    /// `YYYY-MM`.
    pub month: String,
    pub season: Season,
    pub usage_kwh: f64,
    pub energy_cost: f64,
    /// In order of first appearance within the month.
    pub by_period: Vec<PeriodCost>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationSummary {
    pub total_cost: f64,
    pub total_usage_kwh: f64,
    pub average_rate: f64,
    #[serde(with = "iso_local")]
    pub period_start: PrimitiveDateTime,
    #[serde(with = "iso_local")]
    pub period_end: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalculationResult {
    pub request_id: Uuid,
    pub plan: PlanRecord,
    pub summary: CalculationSummary,
    pub monthly_breakdown: Vec<MonthlyBreakdown>,
}

/// Cost totals for one plan over one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlanTotals {
    pub total_cost: f64,
    pub total_usage_kwh: f64,
    pub average_rate: f64,
}

/// Keeps only supplied, non-empty inputs: zero numbers, blank strings and
/// empty collections are treated as not supplied.
pub fn sparse_inputs(inputs: &BillingInputs) -> BillingInputs {
    let nonzero = |v: Option<f64>| v.filter(|x| *x != 0.0);

    BillingInputs {
        meter_phase: inputs.meter_phase.clone().filter(|s| !s.trim().is_empty()),
        meter_voltage_v: inputs.meter_voltage_v.filter(|v| *v != 0),
        meter_ampere: nonzero(inputs.meter_ampere),
        contract_capacity_kw: nonzero(inputs.contract_capacity_kw),
        contract_capacities: inputs.contract_capacities.clone().filter(|m| !m.is_empty()),
        power_factor: nonzero(inputs.power_factor),
        demand_kw: inputs.demand_kw.clone().filter(|d| !d.is_empty()),
        billing_cycle_type: inputs.billing_cycle_type,
    }
}

/// Groups breakdown rows by calendar month, then by period.
pub fn aggregate_months(rows: &[BreakdownRow]) -> Vec<MonthlyBreakdown> {
    let mut months: BTreeMap<Date, MonthlyBreakdown> = BTreeMap::new();

    for row in rows {
        let month = months.entry(row.month).or_insert_with(|| MonthlyBreakdown {
            month: format!("{:04}-{:02}", row.month.year(), u8::from(row.month.month())),
            season: row.season,
            usage_kwh: 0.0,
            energy_cost: 0.0,
            by_period: Vec::new(),
        });
        month.usage_kwh += row.usage_kwh;
        month.energy_cost += row.cost;

        let label = row
            .period
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(UNKNOWN_PERIOD);
        match month.by_period.iter_mut().find(|p| p.period == label) {
            Some(bucket) => {
                bucket.usage_kwh += row.usage_kwh;
                bucket.cost += row.cost;
            }
            None => month.by_period.push(PeriodCost {
                period: label.to_string(),
                usage_kwh: row.usage_kwh,
                cost: row.cost,
            }),
        }
    }

    months.into_values().collect()
}

/// Normalizes usage and prices it against one or more plans.
pub struct BillingPipeline {
    engine: Arc<dyn TariffEngine>,
    directory: PlanDirectory,
    normalizer: UsageNormalizer,
}

impl BillingPipeline {
    pub fn new(engine: Arc<dyn TariffEngine>, normalizer: UsageNormalizer) -> Self {
        Self {
            directory: PlanDirectory::new(engine.clone()),
            engine,
            normalizer,
        }
    }

    pub fn engine(&self) -> &dyn TariffEngine {
        self.engine.as_ref()
    }

    pub fn directory(&self) -> &PlanDirectory {
        &self.directory
    }

    pub fn normalizer(&self) -> &UsageNormalizer {
        &self.normalizer
    }

    pub fn evaluate(
        &self,
        plan_id: &str,
        usage: &UsagePayload,
        inputs: &BillingInputs,
    ) -> Result<CalculationResult, BillingError> {
        let series = self.normalizer.normalize_payload(usage)?;
        self.evaluate_series(plan_id, &series, inputs)
    }

    pub fn evaluate_series(
        &self,
        plan_id: &str,
        series: &UsageSeries,
        inputs: &BillingInputs,
    ) -> Result<CalculationResult, BillingError> {
        let inputs = sparse_inputs(inputs);
        let priced = self.totals(plan_id, series, &inputs).and_then(|totals| {
            let rows = self.engine.breakdown(series, plan_id, &inputs)?;
            Ok((totals, rows))
        });
        let (totals, rows) = match priced {
            Ok(priced) => priced,
            Err(e) => {
                metrics::counter!("plan_evaluation_failures_total").increment(1);
                tracing::error!(plan_id = %plan_id, error = %e, "plan evaluation failed");
                return Err(e);
            }
        };

        let request_id = Uuid::new_v4();
        tracing::info!(
            request_id = %request_id,
            plan_id = %plan_id,
            intervals = series.len(),
            total_cost = totals.total_cost,
            "plan evaluated"
        );

        Ok(CalculationResult {
            request_id,
            plan: self.directory.resolve(plan_id),
            summary: CalculationSummary {
                total_cost: totals.total_cost,
                total_usage_kwh: totals.total_usage_kwh,
                average_rate: totals.average_rate,
                period_start: series.start(),
                period_end: series.end(),
            },
            monthly_breakdown: aggregate_months(&rows),
        })
    }

    /// Prices one plan; `inputs` must already be sparse.
    pub(crate) fn totals(
        &self,
        plan_id: &str,
        series: &UsageSeries,
        inputs: &BillingInputs,
    ) -> Result<PlanTotals, BillingError> {
        let started = Instant::now();
        let costs = self.engine.interval_costs(series, plan_id, inputs);
        metrics::histogram!("plan_evaluation_duration_seconds").record(started.elapsed().as_secs_f64());
        metrics::counter!("plan_evaluations_total").increment(1);

        let total_cost: f64 = costs?.iter().map(|c| c.total).sum();
        let total_usage_kwh = series.total_kwh();
        let average_rate = if total_usage_kwh > 0.0 {
            round2(total_cost / total_usage_kwh)
        } else {
            0.0
        };

        Ok(PlanTotals {
            total_cost,
            total_usage_kwh,
            average_rate,
        })
    }
}
