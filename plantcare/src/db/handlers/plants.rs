//! Database repository for plants and their care instructions.
//!
//! [`Plants::upsert_plant_and_care`] is the store engine used after every successful care
//! generation. It resolves the plant's natural key, inserts or fully overwrites the plant row,
//! and replaces the plant's whole care collection, all inside one transaction.

use crate::{
    db::{
        errors::{DbError, Result},
        models::plants::{
            CareInstruction, CareInstructionDocument, Plant, PlantDocument, PlantLookup, PlantStoreRequest, PlantWithCare,
            UpsertResult,
        },
    },
    types::{PlantGroup, PlantId, abbrev_uuid},
};
use sqlx::{Connection, PgConnection};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Predicate shared by the indoor unique index and its ON CONFLICT target
const INDOOR_PREDICATE: &str = "plant_group IN ('Houseplants', 'Succulents')";
/// Predicate shared by the outdoor unique index and its ON CONFLICT target
const OUTDOOR_PREDICATE: &str = "(plant_group IS NULL OR plant_group NOT IN ('Houseplants', 'Succulents'))";

/// The key a plant row is resolved by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NaturalKey {
    /// Houseplants and succulents: one profile per name, zone is never stored.
    ByGroup { plant_name: String, plant_group: String },
    /// Every other group, including a missing one: one profile per name and zone.
    /// `plant_group` is stored on the row but is not part of the key.
    ByZone {
        plant_name: String,
        zone: Option<String>,
        plant_group: Option<String>,
    },
}

impl NaturalKey {
    pub fn plant_name(&self) -> &str {
        match self {
            NaturalKey::ByGroup { plant_name, .. } | NaturalKey::ByZone { plant_name, .. } => plant_name,
        }
    }

    /// Zone written to the row. Always `None` for indoor groups.
    pub fn storage_zone(&self) -> Option<&str> {
        match self {
            NaturalKey::ByGroup { .. } => None,
            NaturalKey::ByZone { zone, .. } => zone.as_deref(),
        }
    }

    pub fn plant_group(&self) -> Option<&str> {
        match self {
            NaturalKey::ByGroup { plant_group, .. } => Some(plant_group),
            NaturalKey::ByZone { plant_group, .. } => plant_group.as_deref(),
        }
    }

    /// ON CONFLICT target matching the partial unique index for this key
    fn conflict_target(&self) -> String {
        match self {
            NaturalKey::ByGroup { .. } => format!("(plant_name, plant_group) WHERE {INDOOR_PREDICATE}"),
            NaturalKey::ByZone { .. } => format!("(plant_name, (COALESCE(zone, ''))) WHERE {OUTDOOR_PREDICATE}"),
        }
    }
}

/// Resolve the natural key for a lookup document.
///
/// Indoor groups key on `(plant_name, plant_group)` and ignore the zone entirely. Everything
/// else, including a missing group, keys on `(plant_name, zone)` with the zone trimmed and a
/// blank zone treated as `None`.
pub fn resolve_key(lookup: &PlantLookup) -> NaturalKey {
    match lookup.plant_group.as_deref() {
        Some(group) if PlantGroup::is_indoor_name(group) => NaturalKey::ByGroup {
            plant_name: lookup.plant_name.clone(),
            plant_group: group.to_string(),
        },
        _ => NaturalKey::ByZone {
            plant_name: lookup.plant_name.clone(),
            zone: lookup
                .zone
                .as_deref()
                .map(str::trim)
                .filter(|zone| !zone.is_empty())
                .map(str::to_string),
            plant_group: lookup.plant_group.clone(),
        },
    }
}

/// Reject documents missing required fields. Runs before any statement is issued.
pub fn validate_store_request(lookup: &PlantLookup, care_instructions: Option<&[CareInstructionDocument]>) -> Result<()> {
    if lookup.plant_name.trim().is_empty() {
        return Err(DbError::invalid_input("lookup.plant_name", "is required"));
    }
    validate_care_instructions(care_instructions)
}

fn validate_care_instructions(care_instructions: Option<&[CareInstructionDocument]>) -> Result<()> {
    for (i, care) in care_instructions.unwrap_or_default().iter().enumerate() {
        if care.care_phase.trim().is_empty() {
            return Err(DbError::invalid_input(format!("care_instructions[{i}].care_phase"), "is required"));
        }
        if care.step_description.trim().is_empty() {
            return Err(DbError::invalid_input(format!("care_instructions[{i}].step_description"), "is required"));
        }
    }

    Ok(())
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub struct Plants<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Plants<'c> {
    /// Create a new Plants repository instance
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Store a generated plant and its care plan.
    ///
    /// The plant row for the resolved natural key is inserted or fully overwritten, then the
    /// plant's care instructions are replaced by exactly `care_instructions` (an absent list
    /// leaves the plant with none). Everything runs in a single transaction: any error rolls
    /// back every change made by this call and is returned unchanged.
    #[instrument(skip(self, request), fields(plant_name = %request.lookup.plant_name, plant_group = ?request.lookup.plant_group), err)]
    pub async fn upsert_plant_and_care(&mut self, request: &PlantStoreRequest) -> Result<UpsertResult> {
        let care = request.care_instructions.as_deref();
        validate_store_request(&request.lookup, care)?;

        let key = resolve_key(&request.lookup);
        if let Some(name) = request.plant.plant_name.as_deref() {
            if name != key.plant_name() {
                warn!(document_name = name, "Plant document name differs from lookup, storing lookup name");
            }
        }

        // Dropping `tx` on any early return rolls the whole call back
        let mut tx = self.db.begin().await?;

        let (plant_id, inserted) = upsert_plant_row(&mut tx, &key, &request.plant).await?;
        let care_count = replace_care_rows(&mut tx, plant_id, care).await?;

        tx.commit().await?;

        info!(
            plant_id = %abbrev_uuid(&plant_id),
            inserted,
            care_count,
            "Stored plant and care instructions"
        );

        Ok(UpsertResult { plant_id })
    }

    /// Insert or fully overwrite the plant row for `key`, without touching care instructions.
    ///
    /// Returns the plant id and whether a new row was created. Callers composing this with
    /// [`Plants::replace_care_instructions`] are responsible for the surrounding transaction.
    #[instrument(skip(self, plant), fields(plant_name = %key.plant_name()), err)]
    pub async fn upsert_plant(&mut self, key: &NaturalKey, plant: &PlantDocument) -> Result<(PlantId, bool)> {
        upsert_plant_row(&mut *self.db, key, plant).await
    }

    /// Replace every care instruction owned by `plant_id`. Returns the number of rows inserted.
    #[instrument(skip(self, care_instructions), fields(plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn replace_care_instructions(
        &mut self,
        plant_id: PlantId,
        care_instructions: Option<&[CareInstructionDocument]>,
    ) -> Result<u64> {
        validate_care_instructions(care_instructions)?;
        let mut tx = self.db.begin().await?;
        let count = replace_care_rows(&mut tx, plant_id, care_instructions).await?;
        tx.commit().await?;
        Ok(count)
    }

    /// Get a plant by ID
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: PlantId) -> Result<Option<Plant>> {
        let plant = sqlx::query_as::<_, Plant>("SELECT * FROM plants WHERE plant_id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(plant)
    }

    /// Get a plant together with its care instructions
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&id)), err)]
    pub async fn get_with_care(&mut self, id: PlantId) -> Result<Option<PlantWithCare>> {
        let Some(plant) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let care_instructions = self.list_care_instructions(id).await?;

        Ok(Some(PlantWithCare { plant, care_instructions }))
    }

    /// Find the plant stored under a natural key.
    ///
    /// Picks the oldest row if duplicates exist, mirroring `LIMIT 1` lookup semantics.
    #[instrument(skip(self), fields(plant_name = %key.plant_name()), err)]
    pub async fn find_by_key(&mut self, key: &NaturalKey) -> Result<Option<Plant>> {
        let plant = match key {
            NaturalKey::ByGroup { plant_name, plant_group } => {
                sqlx::query_as::<_, Plant>(
                    r#"
                    SELECT * FROM plants
                    WHERE plant_name = $1 AND plant_group = $2 AND zone IS NULL
                    ORDER BY created_at ASC
                    LIMIT 1
                    "#,
                )
                .bind(plant_name)
                .bind(plant_group)
                .fetch_optional(&mut *self.db)
                .await?
            }
            NaturalKey::ByZone { plant_name, zone, .. } => {
                let query = format!(
                    r#"
                    SELECT * FROM plants
                    WHERE plant_name = $1 AND zone IS NOT DISTINCT FROM $2 AND {OUTDOOR_PREDICATE}
                    ORDER BY created_at ASC
                    LIMIT 1
                    "#
                );
                sqlx::query_as::<_, Plant>(&query)
                    .bind(plant_name)
                    .bind(zone)
                    .fetch_optional(&mut *self.db)
                    .await?
            }
        };

        Ok(plant)
    }

    /// List the care instructions of a plant, grouped by phase and in season order
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn list_care_instructions(&mut self, plant_id: PlantId) -> Result<Vec<CareInstruction>> {
        let rows = sqlx::query_as::<_, CareInstruction>(
            r#"
            SELECT * FROM care_instructions
            WHERE plant_id = $1
            ORDER BY care_phase ASC, order_within_season ASC, created_at ASC
            "#,
        )
        .bind(plant_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }

    /// Delete a plant. Its care instructions go with it.
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: PlantId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plants WHERE plant_id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Single-statement resolve-or-create. Concurrent callers with the same key are serialized
/// by the partial unique index: the loser waits for the winner and then takes the update branch.
async fn upsert_plant_row(conn: &mut PgConnection, key: &NaturalKey, plant: &PlantDocument) -> Result<(PlantId, bool)> {
    let query = format!(
        r#"
        INSERT INTO plants (
            plant_id, plant_name, zone, description, type, sun_requirements,
            seed_starting_month, planting_month, seed_starting_instructions, planting_instructions,
            zone_suitability, seasonality, plant_group, requirements, seed_starting, planting,
            care_plan, model_used, raw_llm_response
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        ON CONFLICT {target}
        DO UPDATE SET
            zone = EXCLUDED.zone,
            description = EXCLUDED.description,
            type = EXCLUDED.type,
            sun_requirements = EXCLUDED.sun_requirements,
            seed_starting_month = EXCLUDED.seed_starting_month,
            planting_month = EXCLUDED.planting_month,
            seed_starting_instructions = EXCLUDED.seed_starting_instructions,
            planting_instructions = EXCLUDED.planting_instructions,
            zone_suitability = EXCLUDED.zone_suitability,
            seasonality = EXCLUDED.seasonality,
            plant_group = EXCLUDED.plant_group,
            requirements = EXCLUDED.requirements,
            seed_starting = EXCLUDED.seed_starting,
            planting = EXCLUDED.planting,
            care_plan = EXCLUDED.care_plan,
            model_used = EXCLUDED.model_used,
            raw_llm_response = EXCLUDED.raw_llm_response,
            updated_at = NOW()
        RETURNING plant_id, (xmax = 0) AS inserted
        "#,
        target = key.conflict_target()
    );

    let (plant_id, inserted) = sqlx::query_as::<_, (PlantId, bool)>(&query)
        .bind(Uuid::new_v4())
        .bind(key.plant_name())
        .bind(key.storage_zone())
        .bind(&plant.description)
        .bind(&plant.plant_type)
        .bind(&plant.sun_requirements)
        .bind(&plant.seed_starting_month)
        .bind(&plant.planting_month)
        .bind(&plant.seed_starting_instructions)
        .bind(&plant.planting_instructions)
        .bind(&plant.zone_suitability)
        .bind(&plant.seasonality)
        .bind(key.plant_group())
        .bind(&plant.requirements)
        .bind(&plant.seed_starting)
        .bind(&plant.planting)
        .bind(&plant.care_plan)
        .bind(&plant.model_used)
        .bind(&plant.raw_llm_response)
        .fetch_one(&mut *conn)
        .await?;

    if inserted {
        debug!(plant_id = %abbrev_uuid(&plant_id), "Inserted new plant");
    } else {
        debug!(plant_id = %abbrev_uuid(&plant_id), "Overwrote existing plant");
    }

    Ok((plant_id, inserted))
}

/// Delete-then-insert. Only atomic when `conn` is inside a transaction.
async fn replace_care_rows(
    conn: &mut PgConnection,
    plant_id: PlantId,
    care_instructions: Option<&[CareInstructionDocument]>,
) -> Result<u64> {
    let deleted = sqlx::query("DELETE FROM care_instructions WHERE plant_id = $1")
        .bind(plant_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    debug!(plant_id = %abbrev_uuid(&plant_id), deleted, "Deleted previous care instructions");

    let mut inserted = 0;
    for care in care_instructions.unwrap_or_default() {
        sqlx::query(
            r#"
            INSERT INTO care_instructions (
                id, plant_id, care_phase, months, step_description, priority, order_within_season
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(plant_id)
        .bind(care.care_phase.trim())
        .bind(blank_to_none(&care.months))
        .bind(care.step_description.trim())
        .bind(blank_to_none(&care.priority))
        .bind(care.effective_order())
        .execute(&mut *conn)
        .await?;
        inserted += 1;
    }

    Ok(inserted)
}
