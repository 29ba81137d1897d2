use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use configuration::{load_config_from, Config, LogFormat, DEFAULT_CONFIG_FILE};
use core_types::{NewProperty, NewUser, PropertyListing, ReservationListing, User};
use database::{
    connect, DbRepository, FixtureStore, Lookup, PropertyFilter, PropertyRepository,
    ReservationRepository, UserRepository,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the LightBnB data tool.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    init_tracing(&config, cli.log_format)?;

    let repositories = Repositories::open(cli.fixtures.as_deref(), &config).await?;
    let default_limit = config.listings.default_limit;
    run(cli.command, &repositories, default_limit, cli.output).await
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Query and update LightBnB users, reservations and property listings.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Serve reads and writes from JSON fixtures in this directory instead of PostgreSQL.
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = Output::Table)]
    output: Output,

    /// Overrides `logging.format` from the configuration file.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a single user by email or id.
    User(UserArgs),
    /// Create a user.
    AddUser(AddUserArgs),
    /// List a guest's reservations, earliest first.
    Reservations(ReservationArgs),
    /// Search property listings, cheapest first.
    Properties(PropertyArgs),
    /// Create a property from a JSON file.
    AddProperty(AddPropertyArgs),
}

#[derive(Args)]
struct UserArgs {
    #[arg(long, conflicts_with = "id", required_unless_present = "id")]
    email: Option<String>,
    #[arg(long)]
    id: Option<i32>,
}

#[derive(Args)]
struct AddUserArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Args)]
struct ReservationArgs {
    /// The guest's user id.
    #[arg(long)]
    guest: i32,
    #[arg(long)]
    limit: Option<i64>,
}

#[derive(Args)]
struct PropertyArgs {
    /// Case-insensitive substring of the city.
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    owner_id: Option<i32>,
    /// Lowest nightly price, in whole currency units.
    #[arg(long)]
    min_price: Option<u32>,
    /// Highest nightly price, in whole currency units.
    #[arg(long)]
    max_price: Option<u32>,
    /// Lowest acceptable average review rating.
    #[arg(long)]
    min_rating: Option<Decimal>,
    #[arg(long)]
    limit: Option<i64>,
}

impl PropertyArgs {
    fn filter(&self) -> PropertyFilter {
        PropertyFilter {
            city: self.city.clone(),
            owner_id: self.owner_id,
            minimum_price_per_night: self.min_price,
            maximum_price_per_night: self.max_price,
            minimum_rating: self.min_rating,
        }
    }
}

#[derive(Args)]
struct AddPropertyArgs {
    /// A JSON object with the property's fields.
    #[arg(long)]
    file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Table,
    Json,
}

// ==============================================================================
// Wiring
// ==============================================================================

fn init_tracing(config: &Config, format_override: Option<LogFormat>) -> Result<()> {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .with_context(|| format!("Invalid log level `{}`", config.logging.level))?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format_override.unwrap_or(config.logging.format) {
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish())?,
    }
    Ok(())
}

/// The repository implementations the commands run against.
struct Repositories {
    users: Arc<dyn UserRepository>,
    reservations: Arc<dyn ReservationRepository>,
    properties: Arc<dyn PropertyRepository>,
}

impl Repositories {
    async fn open(fixtures: Option<&std::path::Path>, config: &Config) -> Result<Self> {
        if let Some(dir) = fixtures {
            let store = Arc::new(
                FixtureStore::load(dir)
                    .await
                    .with_context(|| format!("Failed to load fixtures from {}", dir.display()))?,
            );
            return Ok(Self {
                users: store.clone(),
                reservations: store.clone(),
                properties: store,
            });
        }

        let pool = connect(&config.database)
            .await
            .context("Failed to connect to the database")?;
        let repo = DbRepository::new(pool);
        Ok(Self {
            users: Arc::new(repo.clone()),
            reservations: Arc::new(repo.clone()),
            properties: Arc::new(repo),
        })
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn run(
    command: Commands,
    repos: &Repositories,
    default_limit: i64,
    output: Output,
) -> Result<()> {
    match command {
        Commands::User(args) => {
            let user = match (args.email, args.id) {
                (Some(email), _) => repos.users.get_user_with_email(&email).await?,
                (None, Some(id)) => repos.users.get_user_with_id(id).await?,
                (None, None) => Lookup::NotFound,
            };
            match output {
                Output::Json => print_json(&user)?,
                Output::Table => match user {
                    Lookup::Found(user) => println!("{}", users_table(&[user])),
                    Lookup::NotFound => println!("No matching user."),
                },
            }
        }
        Commands::AddUser(args) => {
            let user = repos
                .users
                .add_user(NewUser::new(args.name, args.email, args.password))
                .await?;
            match output {
                Output::Json => print_json(&user)?,
                Output::Table => println!("{}", users_table(&[user])),
            }
        }
        Commands::Reservations(args) => {
            let limit = args.limit.unwrap_or(default_limit);
            let listings = repos.reservations.get_all_reservations(args.guest, limit).await?;
            match output {
                Output::Json => print_json(&listings)?,
                Output::Table => println!("{}", reservations_table(&listings)),
            }
        }
        Commands::Properties(args) => {
            let limit = args.limit.unwrap_or(default_limit);
            let listings = repos.properties.get_all_properties(&args.filter(), limit).await?;
            match output {
                Output::Json => print_json(&listings)?,
                Output::Table => println!("{}", properties_table(&listings)),
            }
        }
        Commands::AddProperty(args) => {
            let contents = tokio::fs::read_to_string(&args.file)
                .await
                .with_context(|| format!("Failed to read {}", args.file.display()))?;
            let property: NewProperty = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a valid property", args.file.display()))?;
            let property = repos.properties.add_property(property).await?;
            print_json(&property)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Formats cents as a currency amount, e.g. `9300` as `93.00`.
fn dollars(cents: i32) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

fn users_table(users: &[User]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Email"]);
    for user in users {
        table.add_row(vec![user.id.to_string(), user.name.clone(), user.email.clone()]);
    }
    table
}

fn reservations_table(listings: &[ReservationListing]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Property", "City", "Start", "End", "Per Night", "Total", "Rating",
    ]);
    for listing in listings {
        table.add_row(vec![
            listing.reservation.id.to_string(),
            listing.property.title.clone(),
            listing.property.city.clone(),
            listing.reservation.start_date.to_string(),
            listing.reservation.end_date.to_string(),
            dollars(listing.property.cost_per_night),
            dollars(i32::try_from(listing.total_cost()).unwrap_or(i32::MAX)),
            listing.average_rating.round_dp(2).to_string(),
        ]);
    }
    table
}

fn properties_table(listings: &[PropertyListing]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "City", "Owner", "Per Night", "Rating"]);
    for listing in listings {
        table.add_row(vec![
            listing.property.id.to_string(),
            listing.property.title.clone(),
            listing.property.city.clone(),
            listing.property.owner_id.to_string(),
            dollars(listing.property.cost_per_night),
            listing.average_rating.round_dp(2).to_string(),
        ]);
    }
    table
}
