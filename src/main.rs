// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use quantum_trust::{
    convert, format_currency, format_magnitude, format_units, generate_id, load_debt_csv,
    nullify_debt, parse_amount, sample_coherence, ConfigArgs, DashboardConfig, Gate, Storage,
};

/// Quantum Trust dashboard and helper commands
#[derive(Parser, Debug)]
#[command(name = "quantum-trust", version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal dashboard (default)
    Dashboard,

    /// Convert an amount through a gate's rate table
    Convert {
        amount: String,
        from: String,
        to: String,
        #[arg(long, default_value = "Gate735")]
        gate: Gate,
        /// Fixed coherence; defaults to a live sample
        #[arg(long)]
        coherence: Option<f64>,
    },

    /// Abbreviate a magnitude (accepts "inf")
    Format {
        #[arg(allow_negative_numbers = true)]
        value: f64,
        #[arg(long)]
        currency: bool,
    },

    /// Generate an operation id
    Id { prefix: String },

    /// Compute SRI and trust units for a debt amount
    Nullify {
        amount: String,
        #[arg(long)]
        coherence: Option<f64>,
    },

    /// Import debt rows from CSV into the configured database
    Import { csv: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DashboardConfig::from(cli.config);

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Dashboard => run_ui_mode(&config),
        command => {
            init_logging();
            run_command(command, &config)
        }
    }
}

/// Logs go to stderr so command output stays pipeable
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quantum_trust=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn amount_arg(raw: &str) -> Result<f64> {
    match parse_amount(raw) {
        Some(amount) => Ok(amount),
        None => bail!("not a number: {raw}"),
    }
}

fn run_command(command: Command, config: &DashboardConfig) -> Result<()> {
    match command {
        Command::Dashboard => run_ui_mode(config)?,
        Command::Convert { amount, from, to, gate, coherence } => {
            let amount = amount_arg(&amount)?;
            let coherence = coherence.unwrap_or_else(|| sample_coherence(config.coherence_base));
            let table = gate.rate_table();
            let result = convert(amount, &from, &to, &table, coherence);

            if table.lookup(&from, &to).is_none() {
                tracing::warn!("{}_{} not in {}; using identity rate", from, to, gate);
            }
            println!("{} {} -> {} ({}, coherence {:.6})", amount, from, format_units(result, &to), gate, coherence);
            println!("{}", result);
        }
        Command::Format { value, currency } => {
            let text = if currency { format_currency(value) } else { format_magnitude(value) };
            println!("{}", text);
        }
        Command::Id { prefix } => println!("{}", generate_id(&prefix)),
        Command::Nullify { amount, coherence } => {
            let amount = amount_arg(&amount)?;
            let coherence = coherence.unwrap_or_else(|| sample_coherence(config.coherence_base));
            let result = nullify_debt(amount, coherence);

            println!("Debt:        {}", format_currency(result.amount));
            println!("SRI:         {}", result.sri);
            println!("Coherence:   {:.6}", result.coherence);
            println!("Trust units: {}", format_units(result.trust_units, "TU"));
        }
        Command::Import { csv } => run_import(&csv, config)?,
    }

    Ok(())
}

fn run_import(csv_path: &std::path::Path, config: &DashboardConfig) -> Result<()> {
    let Some(db_path) = config.database_path.as_deref() else {
        bail!("import needs a database: pass --database or set QUANTUM_DATABASE");
    };

    println!("📂 Loading CSV...");
    let rows = load_debt_csv(csv_path)
        .with_context(|| format!("Failed to read {}", csv_path.display()))?;
    println!("✓ Loaded {} rows from CSV", rows.len());

    let storage = Storage::open(Some(db_path)).context("Failed to open database")?;
    let inserted = storage.import_debt_data(&rows)?;
    let total = storage.list_debt_data()?.len();

    println!("✓ Inserted: {} rows", inserted);
    println!("✓ Skipped invalid: {}", rows.len() - inserted);
    println!("✓ Database contains {} debt rows", total);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &DashboardConfig) -> Result<()> {
    let mut app = ui::App::new(config);
    ui::run_ui(&mut app)?;

    println!("\n✅ Dashboard closed ({} operations recorded)", app.log.len());
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &DashboardConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin quantum-server --features server");
    std::process::exit(1);
}
