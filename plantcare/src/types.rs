//! Common type definitions.
//!
//! This module defines:
//! - Type aliases for entity IDs ([`PlantId`], [`CareInstructionId`], [`PlantImageId`])
//! - [`PlantGroup`], the fixed set of care categories a plant can be classified into
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// Type aliases for IDs
pub type PlantId = Uuid;
pub type CareInstructionId = Uuid;
pub type PlantImageId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Care category assigned by the classifier.
///
/// The string form (see [`PlantGroup::as_str`]) is what gets persisted in
/// `plants.plant_group` and what the lookup document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlantGroup {
    Vegetables,
    Herbs,
    #[serde(rename = "Fruit Trees")]
    FruitTrees,
    #[serde(rename = "Flowering Shrubs")]
    FloweringShrubs,
    #[serde(rename = "Perennial Flowers")]
    PerennialFlowers,
    #[serde(rename = "Annual Flowers")]
    AnnualFlowers,
    #[serde(rename = "Ornamental Trees")]
    OrnamentalTrees,
    Houseplants,
    Succulents,
    Bulbs,
    #[serde(rename = "Native Plants")]
    NativePlants,
}

impl PlantGroup {
    pub const ALL: [PlantGroup; 11] = [
        PlantGroup::Vegetables,
        PlantGroup::Herbs,
        PlantGroup::FruitTrees,
        PlantGroup::FloweringShrubs,
        PlantGroup::PerennialFlowers,
        PlantGroup::AnnualFlowers,
        PlantGroup::OrnamentalTrees,
        PlantGroup::Houseplants,
        PlantGroup::Succulents,
        PlantGroup::Bulbs,
        PlantGroup::NativePlants,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlantGroup::Vegetables => "Vegetables",
            PlantGroup::Herbs => "Herbs",
            PlantGroup::FruitTrees => "Fruit Trees",
            PlantGroup::FloweringShrubs => "Flowering Shrubs",
            PlantGroup::PerennialFlowers => "Perennial Flowers",
            PlantGroup::AnnualFlowers => "Annual Flowers",
            PlantGroup::OrnamentalTrees => "Ornamental Trees",
            PlantGroup::Houseplants => "Houseplants",
            PlantGroup::Succulents => "Succulents",
            PlantGroup::Bulbs => "Bulbs",
            PlantGroup::NativePlants => "Native Plants",
        }
    }

    /// Indoor groups are zone independent: one care profile per plant name.
    pub fn is_indoor(&self) -> bool {
        matches!(self, PlantGroup::Houseplants | PlantGroup::Succulents)
    }

    /// Whether a raw group string names one of the indoor groups.
    pub fn is_indoor_name(group: &str) -> bool {
        group.parse::<PlantGroup>().map(|g| g.is_indoor()).unwrap_or(false)
    }
}

impl fmt::Display for PlantGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plant group: {0}")]
pub struct UnknownPlantGroup(pub String);

impl FromStr for PlantGroup {
    type Err = UnknownPlantGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlantGroup::ALL
            .iter()
            .find(|g| g.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownPlantGroup(s.to_string()))
    }
}
