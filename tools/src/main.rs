//! consortium-runner: headless front end for the consortium financial core.
//!
//! Usage:
//!   consortium-runner quote --product imovel_120 --asset 300000 --down 60000
//!   consortium-runner chargeback --tenant acme --product imovel_120 --payments 4
//!   consortium-runner --ipc-mode --db quotes.db

use anyhow::Result;
use consortium_core::{
    clock::{Clock, SystemClock},
    config::CoreConfig,
    error::CoreError,
    quote::Quote,
    rate_limit::{RateGovernor, RateLimitContext},
    store::CoreStore,
    types::round_cents,
};
use serde_json::json;
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Quote {
        tenant_id:    String,
        #[serde(default)]
        user_id:      Option<String>,
        product_id:   String,
        asset_value:  f64,
        #[serde(default)]
        down_payment: f64,
    },
    Chargeback {
        tenant_id:     String,
        #[serde(default)]
        user_id:       Option<String>,
        product_id:    String,
        payments_made: u32,
    },
    ListQuotes {
        tenant_id:  String,
        #[serde(default)]
        user_id:    Option<String>,
        product_id: String,
        #[serde(default = "default_limit")]
        limit:      usize,
    },
    Quit,
}

fn default_limit() -> usize {
    50
}

struct Runner {
    config:   CoreConfig,
    store:    CoreStore,
    governor: Arc<RateGovernor>,
    clock:    Arc<dyn Clock>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");

    let config = CoreConfig::load(data_dir)?;
    let store = CoreStore::open(db)?;
    store.migrate()?;
    for schedule in config.chargeback_schedules.values() {
        store.replace_chargeback_schedule(schedule)?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let governor = Arc::new(RateGovernor::with_policies(
        clock.clone(),
        config.rate_limit_policies(),
    )?);
    log::info!(
        "runner: data_dir={data_dir} db={db} products={} schedules={}",
        config.products.len(),
        config.chargeback_schedules.len()
    );
    let runner = Runner { config, store, governor, clock };

    if ipc_mode {
        let sweeper = runner.governor.spawn_sweeper(SWEEP_INTERVAL);
        let result = run_ipc_loop(&runner);
        sweeper.stop();
        return result;
    }

    match args.get(1).map(String::as_str) {
        Some("quote") => print_quote(&runner, &args),
        Some("chargeback") => print_chargeback(&runner, &args),
        other => {
            eprintln!("unknown command: {}", other.unwrap_or("<none>"));
            eprintln!("commands: quote | chargeback | --ipc-mode");
            std::process::exit(2);
        }
    }
}

fn print_quote(runner: &Runner, args: &[String]) -> Result<()> {
    let tenant = str_arg(args, "--tenant").unwrap_or("default");
    let product_id = str_arg(args, "--product")
        .ok_or_else(|| anyhow::anyhow!("--product is required"))?;
    let asset = parse_arg(args, "--asset", 0.0f64);
    let down = parse_arg(args, "--down", 0.0f64);

    let product = runner.config.product(product_id)?;
    let quote = Quote::build(tenant, product, asset, down, runner.clock.as_ref())?;
    runner.store.insert_quote(&quote)?;
    let b = &quote.breakdown;

    println!("=== QUOTE {} ===", quote.quote_id);
    println!("  product:          {} ({})", product.name, product.product_id);
    println!("  credit letter:    {:.2}", round_cents(b.credit_letter_value));
    println!("  admin cost:       {:.2}", round_cents(b.total_admin_cost));
    println!("  index adjustment: {:.2}", round_cents(b.index_adjustment));
    println!("  total:            {:.2}", round_cents(b.total_with_adjustment));
    println!("  installments:     {}", b.installments);
    println!("  monthly payment:  {:.2}", round_cents(b.monthly_payment));
    println!("    amortization:   {:.2}", round_cents(b.monthly_amortization));
    println!("    admin fee:      {:.2}", round_cents(b.monthly_admin_fee));

    if args.iter().any(|a| a == "--schedule") {
        println!();
        for line in b.schedule() {
            println!("  #{:>3}  {:>12.2}", line.number, round_cents(line.payment));
        }
    }
    Ok(())
}

fn print_chargeback(runner: &Runner, args: &[String]) -> Result<()> {
    let tenant = str_arg(args, "--tenant").unwrap_or("default");
    let product_id = str_arg(args, "--product")
        .ok_or_else(|| anyhow::anyhow!("--product is required"))?;
    let payments = parse_arg(args, "--payments", 0u32);

    let schedule = runner.store.chargeback_schedule(tenant, product_id)?;
    match schedule.applicable_rule(payments) {
        Some(rule) => println!(
            "{tenant}/{product_id}: {payments} payment(s) made -> chargeback {:.2}% (threshold {})",
            rule.percentage, rule.max_payment_number
        ),
        None => println!("{tenant}/{product_id}: {payments} payment(s) made -> no chargeback"),
    }
    Ok(())
}

fn run_ipc_loop(runner: &Runner) -> Result<()> {
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
                log::warn!("runner: unparseable IPC line: {e}");
                writeln!(stdout, "{}", json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(runner, cmd) {
            Ok(value) => value,
            Err(CoreError::RateLimited { policy, retry_after_minutes }) => json!({
                "error": format!("rate limit '{policy}' exceeded"),
                "retry_after_minutes": retry_after_minutes,
            }),
            Err(e) => json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(runner: &Runner, cmd: IpcCommand) -> Result<serde_json::Value, CoreError> {
    match cmd {
        IpcCommand::Quote { tenant_id, user_id, product_id, asset_value, down_payment } => {
            admit(runner, "api", &tenant_id, user_id)?;
            let product = runner.config.product(&product_id)?;
            let quote = Quote::build(
                &tenant_id, product, asset_value, down_payment, runner.clock.as_ref(),
            )?;
            runner.store.insert_quote(&quote)?;
            Ok(serde_json::to_value(&quote)?)
        }
        IpcCommand::Chargeback { tenant_id, user_id, product_id, payments_made } => {
            admit(runner, "api", &tenant_id, user_id)?;
            let schedule = runner.store.chargeback_schedule(&tenant_id, &product_id)?;
            Ok(json!({
                "tenant_id": tenant_id,
                "product_id": product_id,
                "payments_made": payments_made,
                "percentage": schedule.resolve(payments_made),
            }))
        }
        IpcCommand::ListQuotes { tenant_id, user_id, product_id, limit } => {
            admit(runner, "export", &tenant_id, user_id)?;
            let quotes = runner.store.quotes_for_product(&tenant_id, &product_id, limit)?;
            Ok(serde_json::to_value(&quotes)?)
        }
        IpcCommand::Quit => Ok(serde_json::Value::Null),
    }
}

fn admit(
    runner: &Runner,
    policy: &str,
    tenant_id: &str,
    user_id: Option<String>,
) -> Result<(), CoreError> {
    let ctx = RateLimitContext { user_id, tenant_id: Some(tenant_id.to_string()) };
    runner
        .governor
        .check_limit(policy, &ctx)?
        .into_result(policy, runner.governor.now())?;
    Ok(())
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
