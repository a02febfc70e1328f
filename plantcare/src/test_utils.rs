//! Test doubles for the care pipeline collaborators, plus sample generator output.

use crate::clients::{
    CareGenerator, Classification, GeneratedCare, Identification, ImageLookup, PlantClassifier, PlantIdentifier, PlantImageData,
};
use crate::types::PlantGroup;
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// A generated care document in the current `care_plan` format
pub fn sample_care_content(plant_name: &str) -> String {
    json!({
        "plantName": plant_name,
        "description": format!("{plant_name} care profile"),
        "type": "Herb",
        "requirements": {"sun": "Full sun", "water": "Keep soil moist"},
        "care_plan": {
            "style": "tabs",
            "tabs": [
                {"key": "water", "label": "Watering", "items": [
                    {"text": "Water at the base in the morning", "when": "May-Sep", "priority": "must do"},
                    {"text": "Let the top inch dry between waterings"}
                ]},
                {"key": "harvest", "label": "Harvesting", "items": [
                    {"text": "Pinch off flower buds", "when": "Jul-Aug"}
                ]}
            ]
        }
    })
    .to_string()
}

/// Counts calls and returns a fixed classification
pub struct MockClassifier {
    result: Result<Classification, String>,
    pub calls: AtomicUsize,
}

impl MockClassifier {
    pub fn plant(group: PlantGroup) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(Classification {
                plant_group: Some(group),
                is_plant: true,
                message: None,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn not_a_plant(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(Classification {
                plant_group: None,
                is_plant: false,
                message: Some(message.to_string()),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PlantClassifier for MockClassifier {
    async fn classify(&self, _plant_name: &str) -> anyhow::Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(|e| anyhow!(e))
    }
}

/// Returns the same content for every call and records the zone it was asked for
pub struct MockGenerator {
    content: String,
    model: Option<String>,
    pub calls: AtomicUsize,
    pub last_zone: std::sync::Mutex<Option<Option<String>>>,
}

impl MockGenerator {
    pub fn new(content: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            content: content.into(),
            model: Some("openai/gpt-5-mini".to_string()),
            calls: AtomicUsize::new(0),
            last_zone: std::sync::Mutex::new(None),
        })
    }

    /// A generator that reports no model, neither directly nor in its raw response
    pub fn without_model(content: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            content: content.into(),
            model: None,
            calls: AtomicUsize::new(0),
            last_zone: std::sync::Mutex::new(None),
        })
    }
}

#[async_trait]
impl CareGenerator for MockGenerator {
    async fn generate(&self, _plant_group: PlantGroup, _plant_name: &str, zone: Option<&str>) -> anyhow::Result<GeneratedCare> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_zone.lock().map_err(|_| anyhow!("poisoned"))? = Some(zone.map(str::to_string));
        Ok(GeneratedCare {
            content: self.content.clone(),
            raw_response: Some(json!({"id": "gen-test", "model": self.model})),
            model: self.model.clone(),
        })
    }
}

pub struct MockImageLookup {
    result: Result<Option<PlantImageData>, String>,
    pub calls: AtomicUsize,
}

impl MockImageLookup {
    pub fn found(url: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(Some(PlantImageData {
                image_url: url.to_string(),
                photographer_name: Some("Ana Gardener".to_string()),
                photographer_url: Some("https://unsplash.com/@ana".to_string()),
            })),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Err("image search timed out".to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ImageLookup for MockImageLookup {
    async fn find_image(&self, _plant_name: &str) -> anyhow::Result<Option<PlantImageData>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(|e| anyhow!(e))
    }
}

pub struct MockIdentifier;

#[async_trait]
impl PlantIdentifier for MockIdentifier {
    async fn identify(&self, _image: &[u8], _content_type: &str) -> anyhow::Result<Identification> {
        Ok(Identification {
            is_plant: true,
            common_name: Some("Monstera".to_string()),
            scientific_name: Some("Monstera deliciosa".to_string()),
            confidence: Some(0.92),
            message: Some("Looks like a Monstera".to_string()),
        })
    }
}
