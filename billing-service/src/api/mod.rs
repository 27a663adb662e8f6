//! HTTP surface: plan directory, calculation and upload endpoints.

pub mod handlers;
pub mod types;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::{pipeline::BillingPipeline, sources::UsageCsvParser};

pub struct AppState {
    pub pipeline: BillingPipeline,
    pub parser: UsageCsvParser,
    pub max_upload_bytes: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/v1/plans", get(handlers::list_plans))
        .route("/api/v1/plans/:plan_id", get(handlers::plan_details))
        .route("/api/v1/plans/:plan_id/requirements", get(handlers::plan_requirements))
        .route("/api/v1/calculate/simple", post(handlers::calculate_simple))
        .route("/api/v1/calculate/compare", post(handlers::calculate_compare))
        .route("/api/v1/upload/csv", post(handlers::upload_csv))
        .route("/api/v1/upload/validate", post(handlers::upload_validate))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// `None` when no origins are configured.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<Option<CorsLayer>> {
    if origins.is_empty() {
        return Ok(None);
    }
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{o}'")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    ))
}

pub async fn serve(app: Router, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid server bind address '{bind_addr}'"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "billing API listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_is_optional() {
        assert!(cors_layer(&[]).unwrap().is_none());
        assert!(cors_layer(&["http://localhost:5173".to_string()]).unwrap().is_some());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
