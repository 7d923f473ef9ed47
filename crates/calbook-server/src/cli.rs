//! Command-line interface.
//!
//! The CLI runs the engine against a JSON data file holding owners, event
//! types, credentials and bookings. Commands that change bookings write the
//! file back after the operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use calbook_core::Person;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, EngineConfig};
use crate::engine::{BookingEngine, CreateBookingRequest};
use crate::error::BookingError;
use crate::store::{InMemoryStore, Snapshot};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to access data file {path}: {source}")]
    Data {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize config: {0}")]
    Toml(#[from] toml::ser::Error),
}

/// calbook - availability and booking engine
#[derive(Debug, Parser)]
#[command(name = "calbook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "CALBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data file with owners, credentials and bookings
    #[arg(long, global = true, env = "CALBOOK_DATA", default_value = "calbook.json")]
    pub data: PathBuf,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List bookable slots between two local dates (end exclusive)
    Availability {
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        event_type: Option<i64>,
    },

    /// List the calendars of every connected account
    Calendars {
        #[arg(long)]
        owner: i64,
    },

    /// Book a slot
    Book {
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        event_type: i64,
        /// Attendee email
        #[arg(long)]
        email: String,
        /// Attendee name
        #[arg(long)]
        name: Option<String>,
        /// Attendee time zone
        #[arg(long, default_value = "UTC")]
        time_zone: String,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Move a booking to a new time
    Reschedule {
        uid: String,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
    },

    /// Cancel a booking
    Cancel { uid: String },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Dump,
    /// Check the configuration and its secret references
    Validate,
    /// Print the default configuration path
    Path,
}

/// Runs a parsed command line, printing the result as JSON.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };

    match cli.command {
        Command::Config { action } => config_command(action, &config),
        command => run_engine(command, &config, &cli.data).await,
    }
}

async fn run_engine(command: Command, config: &EngineConfig, data: &Path) -> Result<(), CliError> {
    let store = Arc::new(load_snapshot(data)?);
    let engine = BookingEngine::from_config(config, store.clone())?;
    let before = store.snapshot().await;

    let output = match command {
        Command::Availability {
            owner,
            from,
            to,
            event_type,
        } => {
            let slots = engine.compute_availability(owner, from, to, event_type).await?;
            serde_json::to_value(slots)?
        }
        Command::Calendars { owner } => {
            let calendars = engine.list_calendars(owner).await?;
            serde_json::to_value(calendars)?
        }
        Command::Book {
            owner,
            event_type,
            email,
            name,
            time_zone,
            start,
            end,
            location,
            notes,
        } => {
            let mut attendee = Person::new(email, time_zone);
            attendee.name = name;
            let mut request = CreateBookingRequest::new(owner, event_type, attendee, start, end);
            request.location = location;
            request.notes = notes;
            serde_json::to_value(engine.create_booking(request).await?)?
        }
        Command::Reschedule { uid, start, end } => {
            serde_json::to_value(engine.reschedule_booking(&uid, start, end).await?)?
        }
        Command::Cancel { uid } => serde_json::to_value(engine.cancel_booking(&uid).await?)?,
        Command::Config { action } => return config_command(action, config),
    };

    // Read commands can still rotate credential tokens.
    let after = store.snapshot().await;
    if after != before {
        save_snapshot(data, &after)?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn config_command(action: ConfigAction, config: &EngineConfig) -> Result<(), CliError> {
    match action {
        ConfigAction::Dump => {
            println!("# config.toml ({})", EngineConfig::default_path().display());
            println!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Validate => {
            config.validate()?;
            config.providers_config()?;
            println!("Configuration is valid.");
        }
        ConfigAction::Path => println!("config: {}", EngineConfig::default_path().display()),
    }
    Ok(())
}

/// Loads the data file; a missing file is an empty store.
pub fn load_snapshot(path: &Path) -> Result<InMemoryStore, CliError> {
    if !path.exists() {
        debug!(path = %path.display(), "no data file, starting empty");
        return Ok(InMemoryStore::new());
    }
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Data {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    Ok(InMemoryStore::from_snapshot(snapshot))
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), CliError> {
    let content = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, content).map_err(|source| CliError::Data {
        path: path.to_path_buf(),
        source,
    })
}
