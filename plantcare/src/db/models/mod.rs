//! Database record models matching table schemas.
//!
//! This module contains struct definitions that directly correspond to database
//! table rows, plus the input documents accepted by the repositories.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each record struct matches a database table schema
//! - **SQLx Integration**: Records derive `sqlx::FromRow` for query results
//! - **Loose input, strict rows**: Input documents mirror the loosely structured LLM output
//!   (everything optional, lenient numbers); records mirror the table constraints
//!
//! # Model Categories
//!
//! - [`plants`]: Plants, care instructions and the store request/result documents
//! - [`plant_images`]: Representative images attached to a plant name

pub mod plant_images;
pub mod plants;
