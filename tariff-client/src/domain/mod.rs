pub mod inputs;
pub mod plan;
pub mod usage;

pub use inputs::{BillingCycle, BillingInputs};
pub use plan::{PlanCategory, PlanRecord, PlanRequirements, RateStructure, Season};
pub use usage::{iso_local, CanonicalFrequency, SeriesError, UsagePoint, UsageSeries, ISO_LOCAL};
