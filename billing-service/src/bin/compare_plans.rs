use anyhow::{bail, Context, Result};
use billing_service::{config::AppConfig, observability, BillingPipeline, UsageCsvParser, UsageNormalizer};
use std::{env, fs, sync::Arc};
use tariff_client::BillingInputs;

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: compare_plans <csv_file_path> [--meter-phase=<label>] <plan_id>...");
    }
    let file_path = &args[1];
    let mut inputs = BillingInputs::default();
    let mut plan_ids = Vec::new();
    for arg in &args[2..] {
        match arg.strip_prefix("--meter-phase=") {
            Some(phase) => inputs.meter_phase = Some(phase.to_string()),
            None => plan_ids.push(arg.clone()),
        }
    }

    // BILLING_CONFIG may point at a catalog with extra plans.
    let cfg = AppConfig::load()?;
    let parser = UsageCsvParser::new(cfg.tariff.offset()?);
    let pipeline = BillingPipeline::new(Arc::new(cfg.tariff.engine()?), UsageNormalizer::new(parser));

    let content = fs::read(file_path).with_context(|| format!("failed to read {file_path}"))?;
    let parsed = parser.parse(&content)?;
    let outcome = pipeline.compare_series(&plan_ids, &parsed.series, &inputs)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
