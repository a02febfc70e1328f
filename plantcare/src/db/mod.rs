//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  (care generation and CLI)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - upsert engine & queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - documents and database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Input documents and record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Migrations
//!
//! Migrations live in the `migrations/` directory and are embedded by [`crate::migrator`]:
//!
//! ```ignore
//! plantcare::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
