//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (a pool connection or an open transaction)
//! and returns models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Plants`]: Plant profiles and their care instructions, including the transactional
//!   upsert engine
//! - [`PlantImages`]: Cached stock images keyed by plant name
//!
//! # Usage
//!
//! ```ignore
//! use plantcare::db::handlers::Plants;
//!
//! async fn example(pool: &sqlx::PgPool, request: &PlantStoreRequest) -> anyhow::Result<()> {
//!     let mut conn = pool.acquire().await?;
//!     // Opens and commits its own transaction
//!     let result = Plants::new(&mut conn).upsert_plant_and_care(request).await?;
//!     println!("stored {}", result.plant_id);
//!     Ok(())
//! }
//! ```

pub mod plant_images;
pub mod plants;

pub use plant_images::PlantImages;
pub use plants::{NaturalKey, Plants, resolve_key};
