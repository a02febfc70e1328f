//! Database models for plant images.

use crate::types::PlantImageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database representation of a plant image
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlantImage {
    pub id: PlantImageId,
    pub name: String,
    pub unsplash_image_url: Option<String>,
    pub unsplash_photographer_name: Option<String>,
    pub unsplash_photographer_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create or replace the image stored for a plant name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantImageUpsertDBRequest {
    pub name: String,
    pub unsplash_image_url: Option<String>,
    pub unsplash_photographer_name: Option<String>,
    pub unsplash_photographer_url: Option<String>,
}
