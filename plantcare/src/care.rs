//! Turning a generated care document into a store request.
//!
//! The care generator answers with a JSON document (possibly wrapped in a Markdown code fence).
//! [`parse_care_content`] checks and decodes it into a [`CareDocument`], and
//! [`build_store_request`] flattens that into the plant row, care rows and lookup key consumed by
//! [`crate::db::handlers::Plants::upsert_plant_and_care`].
//!
//! Care rows come from `care_plan.tabs[*].items[*]` when a care plan is present, otherwise from
//! the older `care` map of phase to steps.

use crate::{
    db::models::plants::{CareInstructionDocument, PlantDocument, PlantLookup, PlantStoreRequest},
    errors::{Error, Result},
    types::PlantGroup,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys every generated care document must carry
pub const REQUIRED_KEYS: [&str; 3] = ["plantName", "care_plan", "requirements"];

/// Priorities the older `care` structure is expected to use
pub const VALID_PRIORITIES: [&str; 3] = ["must do", "good to do", "optional"];

const GENERATOR_SERVICE: &str = "care generator";

/// A generated care document. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareDocument {
    #[serde(rename = "plantName")]
    pub plant_name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub plant_type: Option<String>,
    pub sun: Option<String>,
    #[serde(rename = "seedStartingMonth")]
    pub seed_starting_month: Option<String>,
    #[serde(rename = "plantingMonth")]
    pub planting_month: Option<String>,
    #[serde(rename = "seedStartingInstructions")]
    pub seed_starting_instructions: Option<Value>,
    #[serde(rename = "plantingInstructions")]
    pub planting_instructions: Option<Value>,
    #[serde(rename = "zoneSuitability")]
    pub zone_suitability: Option<String>,
    pub seasonality: Option<String>,
    pub plant_group: Option<String>,
    pub requirements: Option<Value>,
    pub seed_starting: Option<Value>,
    pub planting: Option<Value>,
    pub care_plan: Option<Value>,
    /// Older phase -> steps structure, used when there is no care plan
    pub care: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of checking the older `care` structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CareValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Strip a Markdown code fence (```json ... ```) if the content contains one
fn strip_code_fence(content: &str) -> &str {
    let Some(start) = content.find("```") else {
        return content.trim();
    };
    let body = &content[start + 3..];
    let body = match body.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &body[4..],
        _ => body,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => content.trim(),
    }
}

/// Decode a generated care document.
///
/// Output not ending in `}` is treated as truncated. The decoded object must carry every key in
/// [`REQUIRED_KEYS`].
pub fn parse_care_content(content: &str) -> Result<CareDocument> {
    let json = strip_code_fence(content);
    if json.is_empty() {
        return Err(Error::upstream(GENERATOR_SERVICE, "empty response"));
    }
    if !json.trim_end().ends_with('}') {
        warn!(length = json.len(), "Care response appears to be truncated");
        return Err(Error::upstream(GENERATOR_SERVICE, "response appears to be truncated"));
    }

    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::upstream(GENERATOR_SERVICE, format!("response is not valid JSON: {e}")))?;
    let Some(object) = value.as_object() else {
        return Err(Error::upstream(GENERATOR_SERVICE, "response is not a JSON object"));
    };

    let missing: Vec<&str> = REQUIRED_KEYS.into_iter().filter(|k| !object.contains_key(*k)).collect();
    if !missing.is_empty() {
        return Err(Error::upstream(
            GENERATOR_SERVICE,
            format!("response is missing keys: {}", missing.join(", ")),
        ));
    }

    serde_json::from_value(value).map_err(|e| Error::upstream(GENERATOR_SERVICE, format!("unexpected response shape: {e}")))
}

/// JSON truthiness: null, false, 0, "" and empty containers are all "absent"
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Check the older `care` structure (phase name -> list of `{step, months, priority}`).
pub fn validate_care_structure(care: &Value) -> CareValidation {
    let mut result = CareValidation {
        valid: true,
        ..Default::default()
    };

    let Some(phases) = care.as_object() else {
        result.valid = false;
        result
            .errors
            .push(format!("Care details must be an object, got {}", json_type_name(care)));
        return result;
    };
    if phases.is_empty() {
        result.warnings.push("Care details object is empty".to_string());
        return result;
    }

    let mut total_instructions = 0;
    for (phase, steps) in phases {
        let Some(steps) = steps.as_array() else {
            result.valid = false;
            result.errors.push(format!(
                "Care phase '{phase}' must contain a list of steps, got {}",
                json_type_name(steps)
            ));
            continue;
        };
        if steps.is_empty() {
            result.warnings.push(format!("Care phase '{phase}' has no care instructions"));
            continue;
        }

        for (i, step) in steps.iter().enumerate() {
            let context = format!("Care phase '{phase}', step {}", i + 1);
            let Some(step) = step.as_object() else {
                result.valid = false;
                result
                    .errors
                    .push(format!("{context}: Step must be an object, got {}", json_type_name(step)));
                continue;
            };

            if non_blank_str(step.get("step")).is_none() {
                result.valid = false;
                result.errors.push(format!("{context}: Missing or empty 'step' description"));
            }

            if let Some(priority) = step.get("priority").filter(|p| is_truthy(p)) {
                let known = priority.as_str().is_some_and(|p| VALID_PRIORITIES.contains(&p));
                if !known {
                    result.warnings.push(format!(
                        "{context}: Invalid priority {priority}. Expected one of {}",
                        VALID_PRIORITIES.join(", ")
                    ));
                }
            }

            let has_timing = ["months", "timing"].iter().any(|k| step.get(*k).is_some_and(is_truthy));
            if !has_timing {
                result
                    .warnings
                    .push(format!("{context}: No timing information (months or timing) provided"));
            }

            total_instructions += 1;
        }
    }

    if total_instructions == 0 {
        result.valid = false;
        result.errors.push("No valid care instructions found in any care phase".to_string());
    }

    result
}

/// Tab label, then tab key, then "General"
fn phase_for_tab(tab: &Map<String, Value>) -> String {
    non_blank_str(tab.get("label"))
        .or_else(|| non_blank_str(tab.get("key")))
        .unwrap_or("General")
        .to_string()
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn care_rows_from_plan(care_plan: &Map<String, Value>) -> Vec<CareInstructionDocument> {
    let tabs = care_plan.get("tabs").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();

    let mut rows = Vec::new();
    for tab in tabs.iter().filter_map(Value::as_object) {
        let phase = phase_for_tab(tab);
        let Some(items) = tab.get("items").and_then(Value::as_array) else {
            continue;
        };
        for (i, item) in items.iter().enumerate() {
            let Some(item) = item.as_object() else { continue };
            let Some(text) = non_blank_str(item.get("text")) else {
                continue;
            };
            rows.push(CareInstructionDocument {
                care_phase: phase.clone(),
                months: optional_string(item.get("when")),
                step_description: text.to_string(),
                priority: optional_string(item.get("priority")),
                order_within_season: i32::try_from(i + 1).ok(),
            });
        }
    }
    rows
}

fn care_rows_from_legacy(care: &Map<String, Value>) -> Vec<CareInstructionDocument> {
    let mut rows = Vec::new();
    for (phase, steps) in care {
        let Some(steps) = steps.as_array() else { continue };
        for (i, step) in steps.iter().enumerate() {
            let Some(step) = step.as_object() else { continue };
            let Some(text) = non_blank_str(step.get("step")) else {
                continue;
            };
            rows.push(CareInstructionDocument {
                care_phase: phase.clone(),
                months: optional_string(step.get("months")),
                step_description: text.to_string(),
                priority: optional_string(step.get("priority")),
                order_within_season: i32::try_from(i + 1).ok(),
            });
        }
    }
    rows
}

/// Build the store request for a generated care document.
///
/// The plant is keyed by the corrected `plantName` from the document, the zone the user asked
/// for, and the classifier's group (falling back to the document's own `plant_group`). Indoor
/// groups are stored without a zone; every other group requires one.
pub fn build_store_request(
    doc: &CareDocument,
    plant_group: Option<PlantGroup>,
    user_zone: Option<&str>,
    model_used: Option<&str>,
    raw_llm_response: Option<Value>,
) -> Result<PlantStoreRequest> {
    let plant_name = doc
        .plant_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::invalid_input("Generated care is missing plantName"))?
        .to_string();

    let final_group = plant_group.map(|g| g.as_str().to_string()).or_else(|| doc.plant_group.clone());
    let indoor = final_group.as_deref().is_some_and(PlantGroup::is_indoor_name);

    let zone = user_zone.map(str::trim).filter(|z| !z.is_empty());
    if zone.is_none() && !indoor {
        return Err(Error::invalid_input(format!("A zone is required for '{plant_name}'")));
    }
    let zone = if indoor { None } else { zone.map(str::to_string) };

    let care_plan = doc.care_plan.as_ref().filter(|v| is_truthy(v));
    let care_instructions = match care_plan {
        Some(Value::Object(plan)) => care_rows_from_plan(plan),
        _ => {
            let care = doc.care.clone().unwrap_or_else(|| Value::Object(Map::new()));
            if care_plan.is_none() {
                let validation = validate_care_structure(&care);
                if !validation.valid {
                    return Err(Error::invalid_input(format!(
                        "Invalid care structure for '{plant_name}': {}",
                        validation.errors.join("; ")
                    )));
                }
                if !validation.warnings.is_empty() {
                    warn!(plant_name = %plant_name, warnings = ?validation.warnings, "Care structure warnings");
                }
            }
            care.as_object().map(care_rows_from_legacy).unwrap_or_default()
        }
    };
    debug!(plant_name = %plant_name, rows = care_instructions.len(), "Built care rows");

    let sun_requirements = doc.sun.clone().filter(|s| !s.is_empty()).or_else(|| {
        doc.requirements
            .as_ref()
            .and_then(|r| r.get("sun"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    let plant = PlantDocument {
        plant_name: Some(plant_name.clone()),
        zone: zone.clone(),
        description: doc.description.clone(),
        plant_type: doc.plant_type.clone(),
        sun_requirements,
        seed_starting_month: doc.seed_starting_month.clone(),
        planting_month: doc.planting_month.clone(),
        seed_starting_instructions: Some(doc.seed_starting_instructions.clone().unwrap_or_else(|| Value::Array(vec![]))),
        planting_instructions: Some(doc.planting_instructions.clone().unwrap_or_else(|| Value::Array(vec![]))),
        zone_suitability: doc.zone_suitability.clone(),
        seasonality: doc.seasonality.clone(),
        plant_group: final_group.clone(),
        requirements: doc.requirements.clone(),
        seed_starting: doc.seed_starting.clone(),
        planting: doc.planting.clone(),
        care_plan: doc.care_plan.clone(),
        model_used: model_used.map(str::to_string),
        raw_llm_response,
    };

    Ok(PlantStoreRequest {
        plant,
        care_instructions: Some(care_instructions),
        lookup: PlantLookup {
            plant_name,
            zone,
            plant_group: final_group,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn basil_content() -> String {
        json!({
            "plantName": "Sweet Basil",
            "description": "Fragrant annual herb",
            "requirements": {"sun": "Full sun", "water": "Moderate"},
            "care_plan": {
                "style": "tabs",
                "tabs": [
                    {"key": "water", "label": "Watering", "items": [
                        {"text": "Water at the base", "when": "May-Sep", "priority": "must do"},
                        {"text": "   "},
                        {"text": "Mulch to hold moisture", "when": "Jun"}
                    ]},
                    {"key": "harvest", "label": "", "items": [
                        {"text": "Pinch flower buds"}
                    ]},
                    {"items": [{"text": "Watch for aphids"}]}
                ]
            },
            "confidence": "high"
        })
        .to_string()
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let content = format!("Here you go:\n```json\n{}\n```\n", basil_content());
        let doc = parse_care_content(&content).unwrap();
        assert_eq!(doc.plant_name.as_deref(), Some("Sweet Basil"));
        assert_eq!(doc.extra.get("confidence"), Some(&json!("high")));

        let doc = parse_care_content(&format!("```\n{}\n```", basil_content())).unwrap();
        assert_eq!(doc.description.as_deref(), Some("Fragrant annual herb"));
    }

    #[test]
    fn test_parse_rejects_truncated_and_incomplete() {
        let content = basil_content();
        let truncated = &content[..content.len() - 10];
        let err = parse_care_content(truncated).unwrap_err();
        assert!(err.to_string().contains("truncated"));

        let err = parse_care_content(r#"{"plantName": "Basil", "requirements": {}}"#).unwrap_err();
        assert!(err.to_string().contains("care_plan"));
        assert!(matches!(err, Error::Upstream { .. }));

        assert!(parse_care_content("").is_err());
        assert!(parse_care_content("{not json}").is_err());
    }

    #[test]
    fn test_rows_from_care_plan_tabs() {
        let doc = parse_care_content(&basil_content()).unwrap();
        let request = build_store_request(&doc, Some(PlantGroup::Herbs), Some("8a"), Some("openai/gpt-5-mini"), None).unwrap();

        let rows = request.care_instructions.unwrap();
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].care_phase, "Watering");
        assert_eq!(rows[0].months.as_deref(), Some("May-Sep"));
        assert_eq!(rows[0].priority.as_deref(), Some("must do"));
        assert_eq!(rows[0].order_within_season, Some(1));

        // blank item skipped, position still counts
        assert_eq!(rows[1].step_description, "Mulch to hold moisture");
        assert_eq!(rows[1].order_within_season, Some(3));

        assert_eq!(rows[2].care_phase, "harvest");
        assert_eq!(rows[3].care_phase, "General");
    }

    #[test]
    fn test_store_request_identity_and_fallbacks() {
        let doc = parse_care_content(&basil_content()).unwrap();
        let request = build_store_request(&doc, Some(PlantGroup::Herbs), Some(" 8a "), Some("m"), Some(json!({"id": "gen-1"}))).unwrap();

        assert_eq!(request.lookup.plant_name, "Sweet Basil");
        assert_eq!(request.lookup.zone.as_deref(), Some("8a"));
        assert_eq!(request.lookup.plant_group.as_deref(), Some("Herbs"));
        assert_eq!(request.plant.sun_requirements.as_deref(), Some("Full sun"));
        assert_eq!(request.plant.seed_starting_instructions, Some(json!([])));
        assert_eq!(request.plant.model_used.as_deref(), Some("m"));
        assert_eq!(request.plant.raw_llm_response, Some(json!({"id": "gen-1"})));
    }

    #[test]
    fn test_indoor_plants_drop_zone_and_outdoor_require_it() {
        let doc = parse_care_content(&basil_content()).unwrap();

        let request = build_store_request(&doc, Some(PlantGroup::Houseplants), Some("7a"), None, None).unwrap();
        assert_eq!(request.lookup.zone, None);
        assert_eq!(request.plant.zone, None);

        let request = build_store_request(&doc, Some(PlantGroup::Succulents), None, None, None).unwrap();
        assert_eq!(request.lookup.zone, None);

        let err = build_store_request(&doc, Some(PlantGroup::Vegetables), Some(""), None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn test_document_group_used_without_classifier_group() {
        let mut doc = parse_care_content(&basil_content()).unwrap();
        doc.plant_group = Some("Houseplants".to_string());

        let request = build_store_request(&doc, None, None, None, None).unwrap();
        assert_eq!(request.lookup.plant_group.as_deref(), Some("Houseplants"));
    }

    #[test]
    fn test_missing_plant_name_rejected() {
        let doc = CareDocument {
            plant_name: Some("  ".to_string()),
            ..Default::default()
        };
        let err = build_store_request(&doc, Some(PlantGroup::Herbs), Some("8a"), None, None).unwrap_err();
        assert!(err.to_string().contains("plantName"));
    }

    #[test]
    fn test_legacy_care_rows() {
        let doc: CareDocument = serde_json::from_value(json!({
            "plantName": "Tomato",
            "care": {
                "Planting": [
                    {"step": "Harden off seedlings", "months": "Apr", "priority": "must do"},
                    {"step": "Plant deep", "months": "May"}
                ],
                "Pruning": [{"step": "Remove suckers", "timing": "weekly", "priority": "good to do"}]
            }
        }))
        .unwrap();

        let request = build_store_request(&doc, Some(PlantGroup::Vegetables), Some("6b"), None, None).unwrap();
        let rows = request.care_instructions.unwrap();
        assert_eq!(rows.len(), 3);
        let planting: Vec<_> = rows.iter().filter(|r| r.care_phase == "Planting").collect();
        assert_eq!(planting[1].step_description, "Plant deep");
        assert_eq!(planting[1].order_within_season, Some(2));
    }

    #[test]
    fn test_invalid_legacy_care_rejected() {
        let doc: CareDocument = serde_json::from_value(json!({
            "plantName": "Tomato",
            "care": {"Planting": "water it"}
        }))
        .unwrap();

        let err = build_store_request(&doc, Some(PlantGroup::Vegetables), Some("6b"), None, None).unwrap_err();
        assert!(err.to_string().contains("Invalid care structure"));
    }

    #[test]
    fn test_validate_care_structure() {
        let result = validate_care_structure(&json!({
            "Watering": [
                {"step": "Water weekly", "months": "All", "priority": "must do"},
                {"step": "Deep soak", "priority": "urgent"}
            ],
            "Feeding": []
        }));
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 3);

        let result = validate_care_structure(&json!({"Watering": [{"step": " "}, "oops"], "Pruning": 3}));
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);

        let result = validate_care_structure(&json!({"Watering": []}));
        assert!(!result.valid);
        assert!(result.errors[0].contains("No valid care instructions"));

        let result = validate_care_structure(&json!({}));
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);

        let result = validate_care_structure(&json!(["not", "an", "object"]));
        assert!(!result.valid);
    }
}
