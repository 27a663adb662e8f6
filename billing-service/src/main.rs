use std::sync::Arc;

use anyhow::Result;
use billing_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability, BillingPipeline, UsageCsvParser, UsageNormalizer,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let engine = cfg.tariff.engine()?;
    let parser = UsageCsvParser::new(cfg.tariff.offset()?);
    let state = Arc::new(AppState {
        pipeline: BillingPipeline::new(Arc::new(engine), UsageNormalizer::new(parser)),
        parser,
        max_upload_bytes: cfg.server.max_upload_bytes,
    });

    let mut app = api::router(state);
    if let Some(cors) = api::cors_layer(&cfg.server.cors_allowed_origins)? {
        app = app.layer(cors);
    }

    api::serve(app, &cfg.server.bind_addr).await
}
