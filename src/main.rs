//! Discount Transfer - scenario driver
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Scenario │───▶│ Orchestrator │───▶│  Output  │
//! │  (YAML)  │    │  (JSON)  │    │  (execute)   │    │(JSON+CSV)│
//! └──────────┘    └──────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! Usage: `discount_transfer --env dev --scenario fixtures/scenario.json [--output dir]`

use anyhow::{Context, Result};
use serde_json::json;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use discount_transfer::audit::HistoryWriter;
use discount_transfer::config::AppConfig;
use discount_transfer::logging::init_logging;
use discount_transfer::scenario::Scenario;
use discount_transfer::{
    AdminConsole, AdminRoster, DiscountPolicyEngine, EventQueue, EventSink, InMemoryRateSource,
    InMemoryTokenLedger, MultiSink, OracleAccountGate, PauseSwitch, PurchaseLedger, SystemClock,
    TracingSink, TransferOrchestrator,
};

const DEFAULT_SCENARIO: &str = "fixtures/scenario.json";
const DEFAULT_OUTPUT_DIR: &str = "output";

fn arg_value(flags: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if flags.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn get_scenario_path() -> String {
    arg_value(&["--scenario", "-s"]).unwrap_or_else(|| DEFAULT_SCENARIO.to_string())
}

fn get_output_dir() -> String {
    arg_value(&["--output", "-o"]).unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string())
}

fn main() -> Result<()> {
    let env = get_env();
    let config =
        AppConfig::load(&env).with_context(|| format!("Failed to load config for env {}", env))?;
    let _log_guard = init_logging(&config);

    let scenario = Scenario::load(get_scenario_path())?;
    let scope = config.oracle_scope;

    // Collaborators share one in-memory oracle
    let rates = Arc::new(InMemoryRateSource::new());
    let token = Arc::new(InMemoryTokenLedger::new(rates.clone(), scope));
    scenario.seed(&rates, &token, scope)?;

    let engine = Arc::new(DiscountPolicyEngine::new(
        config.policy_set()?,
        scope,
        Arc::new(SystemClock),
    ));
    let ledger = Arc::new(PurchaseLedger::new());
    let pause = Arc::new(PauseSwitch::new());

    let owner = config
        .owner()
        .context("config must list at least one admin")?;
    let console = AdminConsole::new(
        Arc::new(AdminRoster::with_delegates(owner, config.delegates())),
        pause.clone(),
        engine.clone(),
        ledger.clone(),
    );
    for seed in &scenario.custom_rates {
        console.set_custom_rate(&owner, seed.account, Some(seed.rate))?;
    }

    let queue = Arc::new(EventQueue::new(config.event_queue_capacity));
    let events = Arc::new(MultiSink::new(vec![
        queue.clone() as Arc<dyn EventSink>,
        Arc::new(TracingSink) as Arc<dyn EventSink>,
    ]));

    let orchestrator = TransferOrchestrator::new(
        engine,
        ledger.clone(),
        rates.clone(),
        Arc::new(OracleAccountGate::new(rates.clone(), scope)),
        token,
        pause,
        events,
    );

    info!(env = %env, purchases = scenario.purchases.len(), "Scenario started");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let (mut succeeded, mut failed) = (0u64, 0u64);
    for purchase in &scenario.purchases {
        for _ in 0..purchase.repeat {
            let line = match orchestrator.execute(&purchase.request) {
                Ok(receipt) => {
                    succeeded += 1;
                    json!({ "status": "ok", "receipt": receipt })
                }
                Err(e) => {
                    failed += 1;
                    json!({
                        "status": "error",
                        "trace_id": purchase.request.trace_id,
                        "code": e.code(),
                        "message": e.to_string(),
                        "retryable": e.is_retryable(),
                    })
                }
            };
            writeln!(out, "{}", line)?;
        }
    }

    let output_dir = get_output_dir();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output dir {}", output_dir))?;
    let csv_path = Path::new(&output_dir).join("transactions.csv");
    let mut writer = HistoryWriter::create(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    let written = writer.write_all(&ledger.history())?;
    writer.finish()?;

    let drained = queue.drain().len();
    info!(
        succeeded = succeeded,
        failed = failed,
        records = written,
        events = drained,
        "Scenario finished"
    );
    writeln!(
        out,
        "{}",
        json!({
            "status": "summary",
            "succeeded": succeeded,
            "failed": failed,
            "events": drained,
            "history_csv": csv_path.display().to_string(),
        })
    )?;
    Ok(())
}
