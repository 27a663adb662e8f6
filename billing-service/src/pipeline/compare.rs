use serde::Serialize;
use tariff_client::{BillingInputs, UsageSeries};

use super::{sparse_inputs, BillingError, BillingPipeline, FailedPlan};
use crate::{rounding::round2, transform::UsagePayload};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanComparison {
    pub plan_id: String,
    pub name: String,
    pub total_cost: f64,
    pub total_usage_kwh: f64,
    pub average_rate: f64,
    /// 1 is cheapest.
    pub rank: usize,
}

/// Ranked successes plus the plans that could not be priced.
///
/// `comparison.len() + failed_plans.len()` equals the number of requested
/// plans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    pub comparison: Vec<PlanComparison>,
    pub cheapest_plan_id: String,
    pub savings_vs_most_expensive: f64,
    pub failed_plans: Vec<FailedPlan>,
    /// Fingerprint of the usage every plan was priced against.
    pub usage_digest: String,
}

impl BillingPipeline {
    /// Normalizes `usage` once and prices every plan against it. A failing
    /// plan is recorded and skipped; only zero successes fail the call.
    pub fn compare(
        &self,
        plan_ids: &[String],
        usage: &UsagePayload,
        shared_inputs: &BillingInputs,
    ) -> Result<ComparisonOutcome, BillingError> {
        let series = self.normalizer.normalize_payload(usage)?;
        self.compare_series(plan_ids, &series, shared_inputs)
    }

    pub fn compare_series(
        &self,
        plan_ids: &[String],
        series: &UsageSeries,
        shared_inputs: &BillingInputs,
    ) -> Result<ComparisonOutcome, BillingError> {
        metrics::counter!("plan_comparisons_total").increment(1);
        let inputs = sparse_inputs(shared_inputs);

        let mut successes = Vec::with_capacity(plan_ids.len());
        let mut failed_plans = Vec::new();
        for plan_id in plan_ids {
            match self.totals(plan_id, series, &inputs) {
                Ok(totals) => successes.push(PlanComparison {
                    plan_id: plan_id.clone(),
                    name: self.directory.display_name(plan_id),
                    total_cost: totals.total_cost,
                    total_usage_kwh: totals.total_usage_kwh,
                    average_rate: totals.average_rate,
                    rank: 0,
                }),
                Err(e) => {
                    metrics::counter!("plan_evaluation_failures_total").increment(1);
                    tracing::warn!(plan_id = %plan_id, error = %e, "plan failed during comparison");
                    failed_plans.push(FailedPlan {
                        plan_id: plan_id.clone(),
                        error_type: e.error_type().to_string(),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        if successes.is_empty() {
            return Err(BillingError::AllPlansFailed { failures: failed_plans });
        }

        // Stable: equal costs keep request order.
        successes.sort_by(|a, b| a.total_cost.total_cmp(&b.total_cost));
        for (idx, plan) in successes.iter_mut().enumerate() {
            plan.rank = idx + 1;
        }

        let cheapest = &successes[0];
        let most_expensive = &successes[successes.len() - 1];
        let savings_vs_most_expensive = if successes.len() > 1 {
            round2(most_expensive.total_cost - cheapest.total_cost)
        } else {
            0.0
        };

        tracing::info!(
            requested = plan_ids.len(),
            priced = successes.len(),
            failed = failed_plans.len(),
            cheapest = %cheapest.plan_id,
            "plans compared"
        );

        Ok(ComparisonOutcome {
            cheapest_plan_id: cheapest.plan_id.clone(),
            savings_vs_most_expensive,
            comparison: successes,
            failed_plans,
            usage_digest: series.fingerprint(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::tests::{hourly, pipeline};

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ranks_successes_and_keeps_failures() {
        let outcome = pipeline()
            .compare(
                &ids(&["flat_three", "bogus", "flat_two", "needs_capacity"]),
                &hourly(json!([1.0, 1.0, 1.0, 1.0])),
                &BillingInputs::default(),
            )
            .unwrap();

        let ranked: Vec<(&str, usize)> = outcome
            .comparison
            .iter()
            .map(|p| (p.plan_id.as_str(), p.rank))
            .collect();
        assert_eq!(ranked, vec![("flat_three", 1), ("flat_two", 2)]);
        assert_eq!(outcome.cheapest_plan_id, "flat_three");
        assert_eq!(outcome.comparison[1].name, "Flat two");
        assert_eq!(outcome.savings_vs_most_expensive, 6.0);

        assert_eq!(outcome.comparison.len() + outcome.failed_plans.len(), 4);
        assert_eq!(outcome.failed_plans[0].plan_id, "bogus");
        assert_eq!(outcome.failed_plans[0].error_type, "PlanNotFoundError");
        assert_eq!(outcome.failed_plans[1].plan_id, "needs_capacity");
        assert_eq!(outcome.failed_plans[1].error_type, "EngineError");
    }

    #[test]
    fn single_success_saves_nothing() {
        let outcome = pipeline()
            .compare(
                &ids(&["flat_two", "bogus1", "bogus2"]),
                &hourly(json!([1.0, 1.0, 1.0, 1.0])),
                &BillingInputs::default(),
            )
            .unwrap();

        assert_eq!(outcome.comparison.len(), 1);
        assert_eq!(outcome.comparison[0].rank, 1);
        assert_eq!(outcome.failed_plans.len(), 2);
        assert_eq!(outcome.savings_vs_most_expensive, 0.0);
    }

    #[test]
    fn equal_costs_keep_request_order() {
        let outcome = pipeline()
            .compare(
                &ids(&["flat_three", "flat_two", "flat_three"]),
                &hourly(json!([10.0])),
                &BillingInputs::default(),
            )
            .unwrap();
        // flat_two: 20 + 10 basic fee = 30, flat_three: 30.
        let order: Vec<&str> = outcome.comparison.iter().map(|p| p.plan_id.as_str()).collect();
        assert_eq!(order, vec!["flat_three", "flat_two", "flat_three"]);
        let ranks: Vec<usize> = outcome.comparison.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn all_failures_escalate() {
        let err = pipeline()
            .compare(&ids(&["bogus1", "bogus2"]), &hourly(json!([1.0])), &BillingInputs::default())
            .unwrap_err();
        assert_eq!(err.error_type(), "AllPlansFailedError");
        let message = err.to_string();
        assert!(message.starts_with("All 2 plan(s) failed to calculate:"));
        assert!(message.contains("- bogus1: Plan not found: bogus1"));
        assert!(message.contains("- bogus2:"));
    }

    #[test]
    fn empty_plan_list_fails() {
        let err = pipeline()
            .compare(&[], &hourly(json!([1.0])), &BillingInputs::default())
            .unwrap_err();
        assert!(matches!(err, BillingError::AllPlansFailed { ref failures } if failures.is_empty()));
    }

    #[test]
    fn usage_is_normalized_once_for_all_plans() {
        let usage = hourly(json!([1.0, 2.0]));
        let p = pipeline();
        let outcome = p
            .compare(&ids(&["flat_two", "flat_three"]), &usage, &BillingInputs::default())
            .unwrap();
        let series = p.normalizer().normalize_payload(&usage).unwrap();

        assert_eq!(outcome.usage_digest, series.fingerprint());
        assert!(outcome.comparison.iter().all(|c| c.total_usage_kwh == 3.0));
    }

    #[test]
    fn normalization_failure_fails_the_whole_comparison() {
        let err = pipeline()
            .compare(&ids(&["flat_two"]), &hourly(json!([])), &BillingInputs::default())
            .unwrap_err();
        assert_eq!(err.error_type(), "EmptySeriesError");
    }
}
