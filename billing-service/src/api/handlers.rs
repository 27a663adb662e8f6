//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::{
    extract::{multipart::Multipart, rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tariff_client::{EngineError, PlanRequirements};

use super::{
    types::{
        CalculateRequest, CompareRequest, Endpoints, ErrorResponse, HealthResponse, PlanDetailsResponse,
        PlansListResponse, ServiceInfo, UploadResponse,
    },
    AppState,
};
use crate::{
    pipeline::{BillingError, CalculationResult, ComparisonOutcome},
    sources::ValidationReport,
};

/// Status code plus `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn plan_not_found(plan_id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("Plan not found: {plan_id}"))
    }

    /// Client mistakes become 400; anything else is a 500 prefixed with
    /// `context`.
    fn from_billing(e: BillingError, context: &str) -> Self {
        if e.is_client_error() {
            Self::bad_request(e.to_string())
        } else {
            tracing::error!(error = %e, error_type = e.error_type(), "{context}");
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {e}"))
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

/// `GET /`
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "billing-service",
        version: env!("CARGO_PKG_VERSION"),
        description: "Electricity usage ingestion and tariff plan comparison",
        endpoints: Endpoints {
            plans: "/api/v1/plans",
            calculations: "/api/v1/calculate",
            upload: "/api/v1/upload",
        },
    })
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// `GET /api/v1/plans`
pub async fn list_plans(State(state): State<Arc<AppState>>) -> Json<PlansListResponse> {
    Json(PlansListResponse {
        plans: state.pipeline.directory().summaries().to_vec(),
    })
}

fn requirements(state: &AppState, plan_id: &str) -> Result<PlanRequirements, ApiError> {
    state.pipeline.engine().requirements(plan_id).map_err(|e| match e {
        EngineError::PlanNotFound(_) => ApiError::plan_not_found(plan_id),
        other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })
}

/// `GET /api/v1/plans/:plan_id` → 404 for ids the directory does not list.
pub async fn plan_details(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanDetailsResponse>, ApiError> {
    let requirements = requirements(&state, &plan_id)?;
    let summary = state
        .pipeline
        .directory()
        .summary(&plan_id)
        .ok_or_else(|| ApiError::plan_not_found(&plan_id))?;

    Ok(Json(PlanDetailsResponse {
        id: summary.id.clone(),
        name: summary.name.clone(),
        category: summary.category,
        rate_structure: summary.rate_structure,
        requirements,
        description: None,
    }))
}

/// `GET /api/v1/plans/:plan_id/requirements`
pub async fn plan_requirements(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanRequirements>, ApiError> {
    Ok(Json(requirements(&state, &plan_id)?))
}

/// `POST /api/v1/calculate/simple`
pub async fn calculate_simple(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<CalculationResult>, ApiError> {
    let Json(req) = body?;
    state
        .pipeline
        .evaluate(&req.plan_id, &req.usage, &req.inputs)
        .map(Json)
        .map_err(|e| ApiError::from_billing(e, "Calculation failed"))
}

/// `POST /api/v1/calculate/compare`
pub async fn calculate_compare(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<ComparisonOutcome>, ApiError> {
    let Json(req) = body?;
    state
        .pipeline
        .compare(&req.plan_ids, &req.usage, &req.shared_inputs)
        .map(Json)
        .map_err(|e| ApiError::from_billing(e, "Comparison failed"))
}

/// Reads the `file` part of a multipart upload. Only `.csv` names pass.
async fn read_csv_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.ends_with(".csv") {
            return Err(ApiError::bad_request("Only CSV files are supported"));
        }
        let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok((filename, bytes.to_vec()));
    }

    Err(ApiError::bad_request("No file uploaded; expected a multipart field named 'file'"))
}

/// `POST /api/v1/upload/csv`
pub async fn upload_csv(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    metrics::counter!("usage_ingest_requests_total").increment(1);
    let (filename, content) = read_csv_upload(multipart).await?;

    let parsed = state.parser.parse(&content).map_err(|e| {
        tracing::info!(file = %filename, error = %e, "upload rejected");
        ApiError::bad_request(e.to_string())
    })?;
    let validation = state.parser.validate(&content);
    tracing::info!(file = %filename, records = parsed.record_count, freq = %parsed.freq, "upload parsed");

    Ok(Json(UploadResponse {
        file_id: filename.clone(),
        original_filename: filename,
        parsed,
        validation,
    }))
}

/// `POST /api/v1/upload/validate`
pub async fn upload_validate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ValidationReport>, ApiError> {
    let (_, content) = read_csv_upload(multipart).await?;
    Ok(Json(state.parser.validate(&content)))
}
