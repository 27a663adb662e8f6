pub mod api;
pub mod config;
pub mod directory;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod rounding;
pub mod sources;
pub mod transform;

pub use pipeline::{BillingError, BillingPipeline, CalculationResult, ComparisonOutcome};
pub use sources::{IngestError, UsageCsvParser};
pub use transform::{UsageInput, UsageNormalizer, UsagePayload};
