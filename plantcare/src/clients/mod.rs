//! Interfaces to the outside services the care pipeline depends on.
//!
//! Each collaborator is an async trait so the service can be driven by test doubles. The only
//! concrete implementation shipped here is [`unsplash::UnsplashClient`]; classifier, generator
//! and identifier implementations live with whichever model provider is deployed.

use crate::types::PlantGroup;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod unsplash;

/// Result of classifying a plant name into a care group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// `None` when the input is not a plant
    pub plant_group: Option<PlantGroup>,
    pub is_plant: bool,
    /// Explanation shown to the user when `is_plant` is false
    pub message: Option<String>,
}

/// Raw output of a care generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCare {
    /// Model output, expected to be a JSON care document
    pub content: String,
    /// Full provider response, kept for traceability
    pub raw_response: Option<Value>,
    /// Model that actually answered, if the provider reports it
    pub model: Option<String>,
}

/// Stock photo for a plant, with attribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantImageData {
    pub image_url: String,
    pub photographer_name: Option<String>,
    pub photographer_url: Option<String>,
}

/// Result of identifying a plant from a photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub is_plant: bool,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub confidence: Option<f32>,
    pub message: Option<String>,
}

#[async_trait]
pub trait PlantClassifier: Send + Sync {
    async fn classify(&self, plant_name: &str) -> anyhow::Result<Classification>;
}

#[async_trait]
pub trait CareGenerator: Send + Sync {
    /// `zone` is `None` for indoor groups, which are zone independent
    async fn generate(&self, plant_group: PlantGroup, plant_name: &str, zone: Option<&str>) -> anyhow::Result<GeneratedCare>;
}

#[async_trait]
pub trait ImageLookup: Send + Sync {
    /// `Ok(None)` when lookups are disabled or nothing matched
    async fn find_image(&self, plant_name: &str) -> anyhow::Result<Option<PlantImageData>>;
}

#[async_trait]
pub trait PlantIdentifier: Send + Sync {
    async fn identify(&self, image: &[u8], content_type: &str) -> anyhow::Result<Identification>;
}
