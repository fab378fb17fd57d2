//! custody-runner: headless refresh runner for the gold custody ledger.
//!
//! Usage:
//!   custody-runner --data-dir ./data --db run.db
//!   custody-runner --data-dir ./data --price 75.5
//!   custody-runner --data-dir ./data --ipc-mode

use anyhow::Result;
use custody_core::{
    amount::Amount,
    config::CustodyConfig,
    engine::{CustodyEngine, RefreshReport},
    record::BaseRecord,
    source::JsonDirSource,
    store::CustodyStore,
};
use rust_decimal::Decimal;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Refresh,
    GetState,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let price: Option<Decimal> = parse_arg(&args, "--price");

    let mut config = CustodyConfig::load(data_dir)?;
    if let Some(price) = price {
        config.balances.fallback_gold_price_per_gram = Some(Amount::from_decimal(price));
    }

    if !ipc_mode {
        println!("Gold custody ledger - custody-runner");
        println!("  data_dir:  {data_dir}");
        println!("  db:        {db}");
        println!("  policy:    {:?}", config.reconciliation.base_policy);
        println!();
    }

    let store = CustodyStore::open(db)?;
    store.migrate()?;
    let mut engine = CustodyEngine::with_store(config, store);
    let source = Arc::new(JsonDirSource::new(Path::new(data_dir).join("snapshot")));

    if ipc_mode {
        run_ipc_loop(&mut engine, source)?;
    } else {
        let report = engine.refresh(source)?;
        print_summary(report);
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut CustodyEngine, source: Arc<JsonDirSource>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                reply_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Refresh => {
                let report = engine.refresh(Arc::clone(&source))?;
                writeln!(stdout, "{}", serde_json::to_string(report)?)?;
            }
            IpcCommand::GetState => match engine.require_report() {
                Ok(report) => writeln!(stdout, "{}", serde_json::to_string(report)?)?,
                Err(e) => {
                    reply_error(&mut stdout, &e.to_string())?;
                    continue;
                }
            },
        }
        stdout.flush()?;
    }
    Ok(())
}

fn reply_error(stdout: &mut io::Stdout, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(stdout, "{}", err_json)?;
    stdout.flush()?;
    Ok(())
}

fn print_summary(report: &RefreshReport) {
    let b = &report.evaluation.balances;

    println!("=== REFRESH SUMMARY ===");
    println!("  refresh_id:     {}", report.refresh_id);
    println!("  refreshed_at:   {}", report.refreshed_at.to_rfc3339());
    println!("  groups:         {}", report.evaluation.groups.len());
    println!("  certificates:   {}", report.certificate_count());
    println!("  synthetic:      {}", report.synthetic_count());
    println!("  signals:        {}", report.evaluation.signals.len());

    println!();
    println!("=== BALANCES ({:?}) ===", b.source);
    println!("  vault gold:       {} g (${})", b.total_vault_gold, b.total_vault_value_usd.round_dp(2));
    println!("  available gold:   {} g (${})", b.available_gold, b.available_gold_value_usd.round_dp(2));
    println!("  BNSL locked:      {} g", b.bnsl_locked_grams);
    println!("  FinaBridge lock:  {} g", b.finabridge_locked_grams);
    println!("  FinaPay:          {} g", b.finapay_grams);
    println!("  USD cash:         ${}", b.usd_balance.round_dp(2));
    println!("  total available:  ${}", b.total_available_usd.round_dp(2));

    println!();
    println!("=== HISTORY (newest first) ===");
    if report.evaluation.groups.is_empty() {
        println!("  (No movements)");
    }
    for group in &report.evaluation.groups {
        let parent = &group.parent;
        println!(
            "  {} | {:<26} | {:>10} g | {}{}",
            parent.created_at().format("%Y-%m-%d %H:%M"),
            parent.action(),
            parent.gold_grams().as_str(),
            parent.id(),
            if parent.is_synthetic() { " (synthetic)" } else { "" }
        );
        for cert in &group.children {
            println!("      └ {} {} ({} g)", cert.kind.label(), cert.identity(), cert.gold_grams);
        }
    }

    if !report.evaluation.signals.is_empty() {
        println!();
        println!("=== DATA QUALITY ===");
        for signal in &report.evaluation.signals {
            println!("  {signal}");
        }
    }
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: FromStr>(args: &[String], flag: &str) -> Option<T> {
    string_arg(args, flag).and_then(|v| v.parse().ok())
}
