use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use fuel_ledger::config::Config;
use fuel_ledger::core::{
    FUELING_COLUMNS, SplitResult, TRIP_COLUMNS, balance_grid, parse_date,
    total_distance_by_driver,
};
use fuel_ledger::session::LedgerSession;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fuel-ledger", about = "Track trips and share fuel costs")]
struct Cli {
    /// Path of the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Table {
    Trips,
    Fuelings,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a driving trip ending at the given odometer reading
    Trip {
        #[arg(long)]
        driver: String,
        /// Odometer reading after the trip
        #[arg(long)]
        km: u64,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Add a fueling at the given odometer reading
    Fuel {
        #[arg(long)]
        fueler: String,
        #[arg(long)]
        km: u64,
        /// Amount paid in euros
        #[arg(long, value_parser = parse_non_negative)]
        cost: f64,
        #[arg(long, value_parser = parse_non_negative)]
        liters: Option<f64>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Show the last trip and fueling odometer readings
    Status,
    /// Show total kilometers per driver
    Stats,
    /// Show who owes whom for fuel
    Balances,
    /// Print a table
    List {
        #[arg(value_enum)]
        table: Table,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_date_arg(input: &str) -> Result<NaiveDate, String> {
    parse_date(input).map_err(|e| e.to_string())
}

fn parse_non_negative(input: &str) -> Result<f64, String> {
    match input.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(format!("{input} is not a non-negative number")),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load(&cli.config)?;
    let store = cfg.open_store()?;
    let mut session = LedgerSession::open(store)?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Trip {
            driver,
            km,
            date,
            comment,
        } => {
            println!("Last km: {}", session.ledger().last_odometer());
            let trip = session.record_trip(
                date.unwrap_or(today),
                &driver,
                km,
                comment,
                &cfg.user,
            )?;
            println!("Trip saved! Driven km: {}", trip.distance);
        }
        Commands::Fuel {
            fueler,
            km,
            cost,
            liters,
            note,
            date,
        } => {
            let (fueling, split) = session.record_fueling(
                date.unwrap_or(today),
                &fueler,
                km,
                cost,
                liters,
                note,
            )?;
            println!(
                "Fueling saved! Km since last fueling: {}",
                fueling.distance_since_last
            );
            if let SplitResult::Split { before, after, .. } = split {
                println!(
                    "Split trip of {} at {} km: {} km + {} km",
                    before.driver, km, before.distance, after.distance
                );
            }
        }
        Commands::Status => {
            let ledger = session.ledger();
            println!("Last km: {}", ledger.last_odometer());
            println!("Last fueling km: {}", ledger.last_fueling_odometer());
        }
        Commands::Stats => {
            let totals = total_distance_by_driver(session.ledger().trips());
            if totals.is_empty() {
                println!("No trips logged yet.");
            }
            for (driver, km) in totals {
                println!("{driver}: {km} km");
            }
        }
        Commands::Balances => {
            let ledger = session.ledger();
            if ledger.trips().is_empty() || ledger.fuelings().is_empty() {
                println!("Not enough data for fuel stats yet.");
                return Ok(());
            }
            let grid = balance_grid(ledger.trips(), ledger.fuelings());
            println!("{}", grid.render());
            for (name, net) in grid.net_balances() {
                println!("{name}: {net:+.2}");
            }
        }
        Commands::List { table, json: true } => {
            let ledger = session.ledger();
            let out = match table {
                Table::Trips => serde_json::to_string_pretty(ledger.trips())?,
                Table::Fuelings => serde_json::to_string_pretty(ledger.fuelings())?,
            };
            println!("{out}");
        }
        Commands::List { table, json: false } => match table {
            Table::Trips => {
                println!("{}", TRIP_COLUMNS.join(" | "));
                for trip in session.ledger().trips() {
                    println!("{}", trip.to_row().join(" | "));
                }
            }
            Table::Fuelings => {
                println!("{}", FUELING_COLUMNS.join(" | "));
                for fueling in session.ledger().fuelings() {
                    println!("{}", fueling.to_row().join(" | "));
                }
            }
        },
    }

    Ok(())
}
