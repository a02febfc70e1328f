//! Database models for plants and their care instructions.

use crate::types::{CareInstructionId, PlantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, serde_as};

/// Order assigned to a care instruction that carries no usable `order_within_season`
pub const DEFAULT_ORDER_WITHIN_SEASON: i32 = 1;

/// Lookup document used to resolve which plant row a store call targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantLookup {
    #[serde(default)]
    pub plant_name: String,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub plant_group: Option<String>,
}

/// The canonical plant record produced from a care generation.
///
/// The identity columns (`plant_name`, `zone`, `plant_group`) are taken from the
/// [`PlantLookup`] when the row is written, so the stored row always matches its natural key.
/// Every other field overwrites the stored value as-is, including `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantDocument {
    pub plant_name: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub plant_type: Option<String>,
    pub sun_requirements: Option<String>,
    pub seed_starting_month: Option<String>,
    pub planting_month: Option<String>,
    pub seed_starting_instructions: Option<Value>,
    pub planting_instructions: Option<Value>,
    pub zone_suitability: Option<String>,
    pub seasonality: Option<String>,
    pub plant_group: Option<String>,
    pub requirements: Option<Value>,
    pub seed_starting: Option<Value>,
    pub planting: Option<Value>,
    pub care_plan: Option<Value>,
    pub model_used: Option<String>,
    pub raw_llm_response: Option<Value>,
}

/// One care step as supplied by the caller.
///
/// `order_within_season` is lenient: a missing value, `null`, or anything that is not an
/// integer (or an integer encoded as a string) resolves to [`DEFAULT_ORDER_WITHIN_SEASON`].
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareInstructionDocument {
    #[serde(default)]
    pub care_phase: String,
    #[serde(default)]
    pub months: Option<String>,
    #[serde(default)]
    pub step_description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    pub order_within_season: Option<i32>,
}

impl CareInstructionDocument {
    pub fn new(care_phase: impl Into<String>, step_description: impl Into<String>) -> Self {
        Self {
            care_phase: care_phase.into(),
            step_description: step_description.into(),
            ..Default::default()
        }
    }

    pub fn effective_order(&self) -> i32 {
        self.order_within_season.unwrap_or(DEFAULT_ORDER_WITHIN_SEASON)
    }
}

/// Full invocation of the store engine: plant document, care list and lookup key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantStoreRequest {
    pub plant: PlantDocument,
    #[serde(default)]
    pub care_instructions: Option<Vec<CareInstructionDocument>>,
    pub lookup: PlantLookup,
}

/// Result of a store call, identical for the insert and update branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertResult {
    pub plant_id: PlantId,
}

/// Database representation of a plant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plant {
    pub plant_id: PlantId,
    pub plant_name: String,
    pub zone: Option<String>,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub plant_type: Option<String>,
    pub sun_requirements: Option<String>,
    pub seed_starting_month: Option<String>,
    pub planting_month: Option<String>,
    pub seed_starting_instructions: Option<Value>,
    pub planting_instructions: Option<Value>,
    pub zone_suitability: Option<String>,
    pub seasonality: Option<String>,
    pub plant_group: Option<String>,
    pub requirements: Option<Value>,
    pub seed_starting: Option<Value>,
    pub planting: Option<Value>,
    pub care_plan: Option<Value>,
    pub model_used: Option<String>,
    pub raw_llm_response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database representation of a care instruction
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CareInstruction {
    pub id: CareInstructionId,
    pub plant_id: PlantId,
    pub care_phase: String,
    pub months: Option<String>,
    pub step_description: String,
    pub priority: Option<String>,
    pub order_within_season: i32,
    pub created_at: DateTime<Utc>,
}

/// A plant together with its current care collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantWithCare {
    #[serde(flatten)]
    pub plant: Plant,
    pub care_instructions: Vec<CareInstruction>,
}
