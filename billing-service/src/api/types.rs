//! Request and response bodies.

use serde::{Deserialize, Serialize};
use tariff_client::{BillingInputs, PlanCategory, PlanRecord, PlanRequirements, RateStructure};

use crate::{
    sources::{ParsedUsage, ValidationReport},
    transform::UsagePayload,
};

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub plan_id: String,
    pub usage: UsagePayload,
    #[serde(default)]
    pub inputs: BillingInputs,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub plan_ids: Vec<String>,
    pub usage: UsagePayload,
    #[serde(default)]
    pub shared_inputs: BillingInputs,
}

#[derive(Debug, Serialize)]
pub struct PlansListResponse {
    pub plans: Vec<PlanRecord>,
}

#[derive(Debug, Serialize)]
pub struct PlanDetailsResponse {
    pub id: String,
    pub name: String,
    pub category: PlanCategory,
    pub rate_structure: RateStructure,
    pub requirements: PlanRequirements,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub original_filename: String,
    pub parsed: ParsedUsage,
    pub validation: ValidationReport,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub plans: &'static str,
    pub calculations: &'static str,
    pub upload: &'static str,
}

/// Error body for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}
