use std::sync::Arc;

use once_cell::sync::OnceCell;
use tariff_client::{PlanRecord, TariffEngine};

/// Read-through cache of the engine's plan directory.
///
/// Loaded on first use and never invalidated: the plan set is static
/// configuration for the lifetime of the process.
pub struct PlanDirectory {
    engine: Arc<dyn TariffEngine>,
    plans: OnceCell<Vec<PlanRecord>>,
}

impl PlanDirectory {
    pub fn new(engine: Arc<dyn TariffEngine>) -> Self {
        Self {
            engine,
            plans: OnceCell::new(),
        }
    }

    /// All plans, in directory order.
    pub fn summaries(&self) -> &[PlanRecord] {
        self.plans.get_or_init(|| {
            let plans = self.engine.plan_directory();
            tracing::debug!(plans = plans.len(), "plan directory loaded");
            plans
        })
    }

    /// Entry for `plan_id`, following engine aliases to the canonical id.
    pub fn summary(&self, plan_id: &str) -> Option<&PlanRecord> {
        let canonical = self.engine.canonical_id(plan_id);
        let id = canonical.as_deref().unwrap_or(plan_id);
        self.summaries().iter().find(|p| p.id == id)
    }

    pub fn display_name(&self, plan_id: &str) -> String {
        self.summary(plan_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| plan_id.to_string())
    }

    /// Minimal summary for an id the directory does not list. Never fails.
    pub fn fallback_summary(&self, plan_id: &str) -> PlanRecord {
        let (category, rate_structure) = self.engine.classify(plan_id);
        PlanRecord {
            id: plan_id.to_string(),
            name: plan_id.to_string(),
            category,
            rate_structure,
            requires_contract_capacity: false,
            requires_meter_spec: false,
        }
    }

    pub fn resolve(&self, plan_id: &str) -> PlanRecord {
        self.summary(plan_id)
            .cloned()
            .unwrap_or_else(|| self.fallback_summary(plan_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tariff_client::{
        BillingInputs, BreakdownRow, EngineError, IntervalCost, PlanCategory, PlanRequirements, RateStructure,
        UsageSeries,
    };

    use super::*;

    #[derive(Default)]
    struct CountingEngine {
        loads: AtomicUsize,
    }

    impl TariffEngine for CountingEngine {
        fn plan_directory(&self) -> Vec<PlanRecord> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            vec![PlanRecord {
                id: "tou_a".to_string(),
                name: "Plan A".to_string(),
                category: PlanCategory::LowVoltage,
                rate_structure: RateStructure::Tou,
                requires_contract_capacity: true,
                requires_meter_spec: false,
            }]
        }

        fn requirements(&self, plan_id: &str) -> Result<PlanRequirements, EngineError> {
            Err(EngineError::PlanNotFound(plan_id.to_string()))
        }

        fn canonical_id(&self, plan_id: &str) -> Option<String> {
            (plan_id == "tou_a_old").then(|| "tou_a".to_string())
        }

        fn classify(&self, _plan_id: &str) -> (PlanCategory, RateStructure) {
            (PlanCategory::HighVoltage, RateStructure::Tiered)
        }

        fn interval_costs(&self, _: &UsageSeries, id: &str, _: &BillingInputs) -> Result<Vec<IntervalCost>, EngineError> {
            Err(EngineError::PlanNotFound(id.to_string()))
        }

        fn breakdown(&self, _: &UsageSeries, id: &str, _: &BillingInputs) -> Result<Vec<BreakdownRow>, EngineError> {
            Err(EngineError::PlanNotFound(id.to_string()))
        }
    }

    #[test]
    fn loads_the_directory_once() {
        let engine = Arc::new(CountingEngine::default());
        let directory = PlanDirectory::new(engine.clone());

        assert_eq!(directory.summaries().len(), 1);
        assert_eq!(directory.display_name("tou_a"), "Plan A");
        assert!(directory.summary("tou_a").is_some());
        assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_ids_get_a_synthetic_summary() {
        let directory = PlanDirectory::new(Arc::new(CountingEngine::default()));

        assert_eq!(directory.display_name("mystery"), "mystery");
        let summary = directory.resolve("mystery");
        assert_eq!(summary.name, "mystery");
        assert_eq!(summary.category, PlanCategory::HighVoltage);
        assert_eq!(summary.rate_structure, RateStructure::Tiered);
        assert!(!summary.requires_contract_capacity);
        assert!(!summary.requires_meter_spec);

        assert!(directory.resolve("tou_a").requires_contract_capacity);
    }

    #[test]
    fn aliases_resolve_to_the_listed_plan() {
        let directory = PlanDirectory::new(Arc::new(CountingEngine::default()));

        assert_eq!(directory.display_name("tou_a_old"), "Plan A");
        let summary = directory.resolve("tou_a_old");
        assert_eq!(summary.id, "tou_a");
        assert!(summary.requires_contract_capacity);
    }
}
