//! # plantcare: generated plant care profiles, stored once per natural key
//!
//! `plantcare` turns a plant name and a hardiness zone into a stored care profile. A classifier
//! assigns the plant a care group, a language model writes the care document, and the result is
//! written to PostgreSQL as one plant row plus its ordered care instructions.
//!
//! ## Storage model
//!
//! Plants are identified by a natural key that depends on their group:
//!
//! - **Houseplants and Succulents** live indoors, so one profile per `(plant_name, plant_group)`
//!   serves every zone and the zone column is always null.
//! - **Every other group** gets one profile per `(plant_name, zone)`.
//!
//! Storing a profile that already exists overwrites the plant row completely and replaces its
//! care instructions, all in a single transaction (see
//! [`db::handlers::Plants::upsert_plant_and_care`]). Two partial unique indexes back the keys, so
//! concurrent writers for the same plant converge on one row.
//!
//! ## Components
//!
//! - [`db`]: repositories, models and error types for the `plants`, `care_instructions` and
//!   `plant_images` tables
//! - [`care`]: decoding generated care documents and flattening them into store requests
//! - [`clients`]: collaborator traits (classifier, generator, image search, identifier) and the
//!   Unsplash image client
//! - [`service`]: [`PlantCareService`], the generate-store-image pipeline
//! - [`health`]: database connectivity check
//! - [`config`] and [`telemetry`]: configuration loading and tracing setup
//!
//! ## Database Setup
//!
//! ```no_run
//! # async fn example(config: plantcare::Config) -> anyhow::Result<()> {
//! let pool = plantcare::connect(&config).await?;
//! plantcare::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod care;
pub mod clients;
pub mod config;
pub mod db;
pub mod errors;
pub mod health;
pub mod service;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{path::Path, time::Duration};
use tracing::{info, instrument};

pub use config::Config;
pub use db::handlers::{NaturalKey, PlantImages, Plants, resolve_key};
pub use db::models::plants::{CareInstructionDocument, PlantDocument, PlantLookup, PlantStoreRequest, UpsertResult};
pub use service::{CareOutcome, GenerateOptions, PlantCareService};

/// Get the plantcare database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Zero means "never" for idle and lifetime limits
fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Open a connection pool using `database.url` and `database.pool`.
#[instrument(skip(config), err)]
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .database_url()
        .context("No database URL configured. Set DATABASE_URL or database.url in the config file.")?;
    let settings = &config.database.pool;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional_secs(settings.idle_timeout_secs))
        .max_lifetime(optional_secs(settings.max_lifetime_secs))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    info!(
        max_connections = settings.max_connections,
        "Connected to database"
    );
    Ok(pool)
}

/// Read a [`PlantStoreRequest`] from a JSON file.
pub async fn load_store_request(path: &Path) -> anyhow::Result<PlantStoreRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid store request in {}", path.display()))
}
