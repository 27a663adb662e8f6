use std::collections::BTreeMap;

use time::{Date, PrimitiveDateTime, Weekday};

use super::{
    catalog::{CatalogError, OffPeak, PlanDefinition, TariffCatalog, Tier, STANDARD_FEE_LABEL},
    BreakdownRow, EngineError, IntervalCost, TariffEngine,
};
use crate::domain::{
    BillingCycle, BillingInputs, PlanCategory, PlanRecord, PlanRequirements, RateStructure, Season,
    UsageSeries,
};

/// Power factor (percent) at which no adjustment applies.
const PF_BASELINE: f64 = 80.0;
/// Power factor above this earns no further discount.
const PF_DISCOUNT_CAP: f64 = 95.0;
/// Fraction of the capacity charge per power-factor point.
const PF_STEP: f64 = 0.001;
/// Demand above contract capacity is charged at this multiple of the capacity rate.
const OVER_CONTRACT_MULTIPLIER: f64 = 2.0;

/// Prices usage from a [`TariffCatalog`].
pub struct RateTableEngine {
    catalog: TariffCatalog,
}

#[derive(Debug, Clone)]
struct PricedInterval {
    timestamp: PrimitiveDateTime,
    month: Date,
    season: Season,
    period: Option<String>,
    usage_kwh: f64,
    energy: f64,
    fixed: f64,
}

impl RateTableEngine {
    pub fn new(catalog: TariffCatalog) -> Self {
        Self { catalog }
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Ok(Self::new(TariffCatalog::builtin()?))
    }

    pub fn catalog(&self) -> &TariffCatalog {
        &self.catalog
    }

    fn plan(&self, plan_id: &str) -> Result<&PlanDefinition, EngineError> {
        self.catalog
            .find(plan_id)
            .ok_or_else(|| EngineError::PlanNotFound(plan_id.to_string()))
    }

    fn price(
        &self,
        usage: &UsageSeries,
        plan_id: &str,
        inputs: &BillingInputs,
    ) -> Result<Vec<PricedInterval>, EngineError> {
        let plan = self.plan(plan_id)?;

        if plan.requires_contract_capacity && inputs.contract_capacity().is_none() {
            return Err(EngineError::MissingInput {
                plan_id: plan_id.to_string(),
                field: "contract_capacity_kw",
            });
        }
        let basic_fee = basic_fee(plan, plan_id, inputs)?;

        let mut priced = match plan.rate_structure {
            RateStructure::Tou => {
                let off_peak = plan.off_peak.as_ref().ok_or_else(|| {
                    EngineError::Calculation(format!("plan '{plan_id}' has no off-peak rate"))
                })?;
                price_tou(plan, off_peak, usage)?
            }
            RateStructure::Tiered => {
                if plan.tiers.is_empty() {
                    return Err(EngineError::Calculation(format!("plan '{plan_id}' has no tiers")));
                }
                price_tiered(plan, usage, inputs.billing_cycle())?
            }
        };

        // Fixed charges are monthly; spread each month's total over its intervals.
        let mut months: BTreeMap<Date, (Season, usize)> = BTreeMap::new();
        for p in &priced {
            months.entry(p.month).or_insert((p.season, 0)).1 += 1;
        }
        let per_interval: BTreeMap<Date, f64> = months
            .into_iter()
            .map(|(month, (season, count))| {
                (month, monthly_fixed(plan, season, basic_fee, inputs) / count as f64)
            })
            .collect();
        for p in &mut priced {
            p.fixed = per_interval.get(&p.month).copied().unwrap_or(0.0);
        }

        Ok(priced)
    }
}

fn month_start(ts: PrimitiveDateTime) -> Result<Date, EngineError> {
    Date::from_calendar_date(ts.year(), ts.month(), 1)
        .map_err(|e| EngineError::Calculation(format!("invalid month for {ts}: {e}")))
}

fn basic_fee(plan: &PlanDefinition, plan_id: &str, inputs: &BillingInputs) -> Result<f64, EngineError> {
    if !plan.requires_meter_spec {
        return Ok(plan.basic_fees.get(STANDARD_FEE_LABEL).copied().unwrap_or(0.0));
    }

    let phase = inputs.meter_phase.as_deref().ok_or_else(|| EngineError::MissingInput {
        plan_id: plan_id.to_string(),
        field: "meter_phase",
    })?;
    plan.basic_fees.get(phase).copied().ok_or_else(|| {
        let labels: Vec<&str> = plan.basic_fees.keys().map(String::as_str).collect();
        EngineError::InvalidInput(format!(
            "meter phase '{phase}' is not valid for plan '{plan_id}'; expected one of: {}",
            labels.join(", ")
        ))
    })
}

fn monthly_fixed(plan: &PlanDefinition, season: Season, basic_fee: f64, inputs: &BillingInputs) -> f64 {
    let mut fixed = basic_fee;

    if let (Some(rate), Some(capacity)) = (plan.capacity_rate, inputs.contract_capacity()) {
        let per_kw = rate.for_season(season);
        let capacity_charge = capacity * per_kw;
        fixed += capacity_charge;

        if let Some(pf) = inputs.power_factor {
            fixed += capacity_charge * (PF_BASELINE - pf.min(PF_DISCOUNT_CAP)) * PF_STEP;
        }
        if let Some(peak) = inputs.peak_demand_kw() {
            let excess = peak - capacity;
            if excess > 0.0 {
                fixed += excess * per_kw * OVER_CONTRACT_MULTIPLIER;
            }
        }
    }

    fixed
}

fn price_tou(
    plan: &PlanDefinition,
    off_peak: &OffPeak,
    usage: &UsageSeries,
) -> Result<Vec<PricedInterval>, EngineError> {
    usage
        .iter()
        .map(|point| {
            let ts = point.timestamp;
            let season = plan.season(ts.month());
            let hour = ts.hour();
            let is_weekday = !matches!(ts.weekday(), Weekday::Saturday | Weekday::Sunday);

            let (period, rate) = plan
                .windows
                .iter()
                .find(|w| {
                    w.season.map_or(true, |s| s == season)
                        && (is_weekday || !w.weekdays_only)
                        && (w.start_hour..w.end_hour).contains(&hour)
                })
                .map(|w| (Some(w.period.clone()), w.rate))
                .unwrap_or_else(|| (off_peak.label.clone(), off_peak.rate(season)));

            Ok(PricedInterval {
                timestamp: ts,
                month: month_start(ts)?,
                season,
                period,
                usage_kwh: point.usage_kwh,
                energy: point.usage_kwh * rate,
                fixed: 0.0,
            })
        })
        .collect()
}

fn price_tiered(
    plan: &PlanDefinition,
    usage: &UsageSeries,
    cycle: BillingCycle,
) -> Result<Vec<PricedInterval>, EngineError> {
    let scale = f64::from(cycle.months_per_period());
    let mut consumed: BTreeMap<(i32, u8), f64> = BTreeMap::new();
    let mut priced = Vec::with_capacity(usage.len());

    for point in usage {
        let ts = point.timestamp;
        let season = plan.season(ts.month());
        let so_far = consumed.entry(billing_period(ts.date(), cycle)).or_insert(0.0);
        let (tier, energy) = tiered_energy(&plan.tiers, season, *so_far, point.usage_kwh, scale);
        *so_far += point.usage_kwh;

        priced.push(PricedInterval {
            timestamp: ts,
            month: month_start(ts)?,
            season,
            period: Some(format!("tier_{}", tier + 1)),
            usage_kwh: point.usage_kwh,
            energy,
            fixed: 0.0,
        });
    }

    Ok(priced)
}

/// Key of the billing period a date belongs to: `(year, first month)`.
fn billing_period(date: Date, cycle: BillingCycle) -> (i32, u8) {
    let year = date.year();
    let month = u8::from(date.month());
    match cycle {
        BillingCycle::Monthly => (year, month),
        BillingCycle::OddMonth => (year, if month % 2 == 1 { month } else { month - 1 }),
        BillingCycle::EvenMonth => match month {
            1 => (year - 1, 12),
            m if m % 2 == 0 => (year, m),
            m => (year, m - 1),
        },
    }
}

/// Prices `amount` kWh on top of `consumed` kWh already used in the billing
/// period. Returns the tier the interval starts in and its energy cost.
fn tiered_energy(tiers: &[Tier], season: Season, consumed: f64, amount: f64, scale: f64) -> (usize, f64) {
    let upper = |t: &Tier| t.up_to_kwh.map_or(f64::INFINITY, |u| u * scale);
    let first = tiers
        .iter()
        .position(|t| consumed < upper(t))
        .unwrap_or(tiers.len() - 1);

    if amount <= 0.0 {
        return (first, amount * tiers[first].rate(season));
    }

    let mut cost = 0.0;
    let mut cursor = consumed;
    let mut remaining = amount;
    for tier in &tiers[first..] {
        let take = remaining.min(upper(tier) - cursor);
        cost += take * tier.rate(season);
        cursor += take;
        remaining -= take;
        if remaining <= 0.0 {
            break;
        }
    }
    (first, cost)
}

impl TariffEngine for RateTableEngine {
    fn plan_directory(&self) -> Vec<PlanRecord> {
        self.catalog.plans.iter().map(PlanDefinition::record).collect()
    }

    fn requirements(&self, plan_id: &str) -> Result<PlanRequirements, EngineError> {
        Ok(self.plan(plan_id)?.requirements(plan_id))
    }

    fn canonical_id(&self, plan_id: &str) -> Option<String> {
        self.catalog.find(plan_id).map(|p| p.id.clone())
    }

    fn classify(&self, plan_id: &str) -> (PlanCategory, RateStructure) {
        self.catalog.classify(plan_id)
    }

    fn interval_costs(
        &self,
        usage: &UsageSeries,
        plan_id: &str,
        inputs: &BillingInputs,
    ) -> Result<Vec<IntervalCost>, EngineError> {
        Ok(self
            .price(usage, plan_id, inputs)?
            .into_iter()
            .map(|p| IntervalCost {
                timestamp: p.timestamp,
                energy: p.energy,
                fixed: p.fixed,
                total: p.energy + p.fixed,
            })
            .collect())
    }

    fn breakdown(
        &self,
        usage: &UsageSeries,
        plan_id: &str,
        inputs: &BillingInputs,
    ) -> Result<Vec<BreakdownRow>, EngineError> {
        Ok(self
            .price(usage, plan_id, inputs)?
            .into_iter()
            .map(|p| BreakdownRow {
                timestamp: p.timestamp,
                month: p.month,
                season: p.season,
                period: p.period,
                usage_kwh: p.usage_kwh,
                cost: p.energy,
            })
            .collect())
    }
}
