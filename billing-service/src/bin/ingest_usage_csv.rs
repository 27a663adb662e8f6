use anyhow::{bail, Context, Result};
use billing_service::{config::AppConfig, observability, UsageCsvParser};
use std::{env, fs};

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: ingest_usage_csv <csv_file_path>");
    }
    let file_path = &args[1];

    let cfg = AppConfig::load()?;
    let parser = UsageCsvParser::new(cfg.tariff.offset()?);

    let content = fs::read(file_path).with_context(|| format!("failed to read {file_path}"))?;
    let validation = parser.validate(&content);
    let parsed = parser.parse(&content)?;

    let report = serde_json::json!({ "parsed": parsed, "validation": validation });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
