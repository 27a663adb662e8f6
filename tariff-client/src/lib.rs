pub mod domain;
pub mod engine;

pub use domain::{
    BillingCycle, BillingInputs, CanonicalFrequency, PlanCategory, PlanRecord, PlanRequirements,
    RateStructure, Season, SeriesError, UsagePoint, UsageSeries,
};
pub use engine::{BreakdownRow, EngineError, IntervalCost, TariffEngine};
