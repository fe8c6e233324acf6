mod commands;
mod config;
mod remote;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{
    ComponentArgs, ExerciseArgs, MetricArgs, cmd_beverage, cmd_chat, cmd_chat_log,
    cmd_component_add, cmd_component_list, cmd_config_get, cmd_config_set, cmd_config_show,
    cmd_config_unset, cmd_exercise, cmd_fast, cmd_meal_log, cmd_meal_preview, cmd_metric,
    cmd_seed, cmd_status, cmd_summary, cmd_sync,
};
use crate::config::{Config, RemoteFlags, RemoteSettings};
use ketovital_core::service::VitalService;

#[derive(Parser)]
#[command(
    name = "ketovital",
    version,
    about = "A local-first keto nutrition ledger",
    long_about = "Log meals built from a component catalog, plus exercise, body metrics, \
                  fasts and drinks. Everything is stored locally first and pushed to your \
                  backend when a sync runs."
)]
struct Cli {
    /// Database file (default: platform data directory, or KETOVITAL_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Backend base URL for sync and chat (overrides KETOVITAL_BACKEND_URL and settings)
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// Bearer credential for the backend (overrides KETOVITAL_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the component catalog
    Component {
        #[command(subcommand)]
        command: ComponentCommands,
    },
    /// Install the default component catalog if the catalog is empty
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build and log meals from catalog components
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Chat with the food assistant and auto-log the confirmed meal
    Chat {
        /// Send a single message instead of starting a conversation
        message: Option<String>,
        /// Output replies as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a meal from a saved assistant reply (`-` reads stdin)
    ChatLog {
        /// JSON file with a reply or its logging_data
        file: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log an exercise session
    Exercise {
        /// Session mode: strength, cardio, mixed
        mode: String,
        /// Cardio type: walk, pickleball, golf, jogging, beep-test, cycling, swimming, other
        #[arg(long)]
        cardio: Option<String>,
        /// Duration in minutes
        #[arg(long)]
        minutes: Option<f64>,
        /// Distance in kilometres
        #[arg(long)]
        distance_km: Option<f64>,
        /// Step count
        #[arg(long)]
        steps: Option<u32>,
        /// Beep test level reached (e.g. "8.5")
        #[arg(long)]
        beep_level: Option<String>,
        /// Strength set as NAME:SETSxREPS[@KG] (repeatable)
        #[arg(long = "set")]
        sets: Vec<String>,
        /// Routine identifier
        #[arg(long)]
        routine: Option<String>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Timestamp (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log body metrics
    Metric {
        /// Body weight in kg
        #[arg(long)]
        weight_kg: Option<f64>,
        /// Waist circumference in cm
        #[arg(long)]
        waist_cm: Option<f64>,
        /// Hours slept
        #[arg(long)]
        sleep_hours: Option<f64>,
        /// Stress level, 1-10
        #[arg(long)]
        stress: Option<u8>,
        /// Timestamp (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a fast
    Fast {
        /// Start time (RFC 3339, default: now)
        #[arg(long)]
        start: Option<String>,
        /// End time (RFC 3339); omit for a fast still in progress
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a drink
    Beverage {
        /// Type: black-coffee, diet-coke, salted-lime-soda, water, other
        kind: String,
        /// Volume in ml
        #[arg(long)]
        volume_ml: Option<f64>,
        /// Timestamp (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show macro totals for a day (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how many entries are waiting to be synced
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push every unsynced entry to the backend
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read and write persisted settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ComponentCommands {
    /// Add a component to the catalog
    Add {
        /// Component name
        name: String,
        /// Category: protein-base, veg-base, wrap, soup, dessert, beverage, add-on, meal
        #[arg(short, long)]
        category: String,
        /// Protein (g) per default portion
        #[arg(short, long, default_value = "0")]
        protein: f64,
        /// Net carbs (g) per default portion
        #[arg(short, long, default_value = "0")]
        net_carbs: f64,
        /// Fat (g) per default portion
        #[arg(short, long, default_value = "0")]
        fat: f64,
        /// Calories per default portion
        #[arg(long, default_value = "0")]
        calories: f64,
        /// Default portion description (e.g. "250g")
        #[arg(long)]
        portion: Option<String>,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List catalog components
    List {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log a meal; each item is NAME or ID, optionally followed by =MULTIPLIER
    Log {
        /// Components, e.g. "Tofu (200g)=0.5"
        items: Vec<String>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the totals a meal would have without logging it
    Preview {
        /// Components, e.g. "Tofu (200g)=0.5"
        #[arg(required = true)]
        items: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a value: backend_url, auto_sync, timeout_secs
    Set {
        key: String,
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a value
    Get {
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a value
    Unset {
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every known setting
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let svc = VitalService::new(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    svc.seed_defaults()?;

    let flags = RemoteFlags {
        backend_url: cli.backend_url,
        token: cli.token,
    };
    let remote = || RemoteSettings::load(svc.db(), &flags);

    match cli.command {
        Commands::Component { command } => match command {
            ComponentCommands::Add {
                name,
                category,
                protein,
                net_carbs,
                fat,
                calories,
                portion,
                tags,
                json,
            } => cmd_component_add(
                &svc,
                ComponentArgs {
                    name,
                    category,
                    protein,
                    net_carbs,
                    fat,
                    calories,
                    portion,
                    tags,
                },
                json,
            ),
            ComponentCommands::List {
                category,
                search,
                json,
            } => cmd_component_list(&svc, category.as_deref(), search.as_deref(), json),
        },
        Commands::Seed { json } => cmd_seed(&svc, json),
        Commands::Meal { command } => match command {
            MealCommands::Log { items, notes, json } => {
                cmd_meal_log(&svc, &remote()?, &items, notes, json).await
            }
            MealCommands::Preview { items, json } => cmd_meal_preview(&svc, &items, json),
        },
        Commands::Chat { message, json } => cmd_chat(&svc, &remote()?, message, json).await,
        Commands::ChatLog { file, json } => cmd_chat_log(&svc, &remote()?, &file, json).await,
        Commands::Exercise {
            mode,
            cardio,
            minutes,
            distance_km,
            steps,
            beep_level,
            sets,
            routine,
            notes,
            at,
            json,
        } => {
            let args = ExerciseArgs {
                mode,
                cardio,
                minutes,
                distance_km,
                steps,
                beep_level,
                sets,
                routine,
                notes,
                at,
            };
            cmd_exercise(&svc, &remote()?, args, json).await
        }
        Commands::Metric {
            weight_kg,
            waist_cm,
            sleep_hours,
            stress,
            at,
            json,
        } => {
            let args = MetricArgs {
                weight_kg,
                waist_cm,
                sleep_hours,
                stress,
                at,
            };
            cmd_metric(&svc, &remote()?, args, json).await
        }
        Commands::Fast { start, end, json } => {
            cmd_fast(&svc, &remote()?, start, end, json).await
        }
        Commands::Beverage {
            kind,
            volume_ml,
            at,
            json,
        } => cmd_beverage(&svc, &remote()?, &kind, volume_ml, at, json).await,
        Commands::Summary { date, json } => cmd_summary(&svc, date, json),
        Commands::Status { json } => cmd_status(&svc, json),
        Commands::Sync { json } => cmd_sync(&svc, &remote()?, json).await,
        Commands::Config { command } => match command {
            ConfigCommands::Set { key, value, json } => {
                cmd_config_set(svc.db(), &key, &value, json)
            }
            ConfigCommands::Get { key, json } => cmd_config_get(svc.db(), &key, json),
            ConfigCommands::Unset { key, json } => cmd_config_unset(svc.db(), &key, json),
            ConfigCommands::Show { json } => cmd_config_show(svc.db(), json),
        },
    }
}
