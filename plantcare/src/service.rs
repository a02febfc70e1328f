//! The care pipeline: classify, generate, store, then attach a stock image.

use crate::{
    care::{CareDocument, build_store_request, parse_care_content},
    clients::{CareGenerator, Identification, ImageLookup, PlantClassifier, PlantIdentifier, unsplash::UnsplashClient},
    config::Config,
    db::{
        handlers::{PlantImages, Plants},
        models::{
            plant_images::{PlantImage, PlantImageUpsertDBRequest},
            plants::{PlantStoreRequest, PlantWithCare, UpsertResult},
        },
    },
    errors::{Error, Result},
    types::{PlantGroup, PlantId, abbrev_uuid},
};
use anyhow::anyhow;
use bon::Builder;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Model recorded on stored plants when the generator does not report one
pub const DEFAULT_MODEL: &str = "openai/gpt-5-mini";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Store the plant and its care rows
    pub persist: bool,
    /// Look up and store a stock image for the plant
    pub fetch_image: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            persist: true,
            fetch_image: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CareOutcome {
    /// The classifier decided the input is not a plant. Nothing was generated or stored.
    NotAPlant { message: String },
    Generated {
        care: Box<CareDocument>,
        plant_group: PlantGroup,
        /// `None` when storing was skipped or failed
        plant_id: Option<PlantId>,
        image: Option<PlantImage>,
    },
}

/// Drives the collaborators and the store engine.
///
/// ```ignore
/// let service = PlantCareService::builder()
///     .db(pool)
///     .classifier(classifier)
///     .generator(generator)
///     .image_lookup(Arc::new(UnsplashClient::new(&config.unsplash)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct PlantCareService {
    db: PgPool,
    classifier: Arc<dyn PlantClassifier>,
    generator: Arc<dyn CareGenerator>,
    image_lookup: Option<Arc<dyn ImageLookup>>,
    identifier: Option<Arc<dyn PlantIdentifier>>,
    #[builder(default = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    default_model: String,
}

impl PlantCareService {
    /// Build a service from loaded configuration. Image lookups are enabled only when an Unsplash
    /// access key is configured.
    pub fn from_config(
        config: &Config,
        db: PgPool,
        classifier: Arc<dyn PlantClassifier>,
        generator: Arc<dyn CareGenerator>,
        identifier: Option<Arc<dyn PlantIdentifier>>,
    ) -> anyhow::Result<Self> {
        let image_lookup = match config.unsplash.access_key {
            Some(_) => Some(Arc::new(UnsplashClient::new(&config.unsplash)?) as Arc<dyn ImageLookup>),
            None => None,
        };

        Ok(Self::builder()
            .db(db)
            .classifier(classifier)
            .generator(generator)
            .maybe_image_lookup(image_lookup)
            .maybe_identifier(identifier)
            .max_upload_bytes(config.max_upload_bytes())
            .default_model(config.llm.model.clone())
            .build())
    }

    /// Generate care instructions for a plant, optionally storing them and fetching an image.
    ///
    /// Classifier and generator failures are returned. Storage and image failures are logged and
    /// reported as `plant_id: None` / `image: None`, so the generated care still reaches the caller.
    #[instrument(skip(self, options), err)]
    pub async fn generate_care(&self, plant_name: &str, user_zone: Option<&str>, options: GenerateOptions) -> Result<CareOutcome> {
        let plant_name = plant_name.trim();
        if plant_name.is_empty() {
            return Err(Error::invalid_input("Plant name is required"));
        }

        let classification = self
            .classifier
            .classify(plant_name)
            .await
            .map_err(|e| Error::upstream("classifier", format!("{e:#}")))?;
        if !classification.is_plant {
            info!("Input is not a plant, skipping generation");
            return Ok(CareOutcome::NotAPlant {
                message: classification.message.unwrap_or_else(|| "Not a plant.".to_string()),
            });
        }
        let plant_group = classification
            .plant_group
            .ok_or_else(|| Error::upstream("classifier", "no plant group returned"))?;
        info!(%plant_group, "Classified plant");

        let zone = if plant_group.is_indoor() { None } else { user_zone };
        let generated = self
            .generator
            .generate(plant_group, plant_name, zone)
            .await
            .map_err(|e| Error::upstream("care generator", format!("{e:#}")))?;
        let care = parse_care_content(&generated.content)?;

        let plant_id = if options.persist {
            let model_used = generated
                .model
                .clone()
                .or_else(|| model_from_raw(generated.raw_response.as_ref()))
                .unwrap_or_else(|| self.default_model.clone());
            match self
                .persist(&care, plant_group, user_zone, &model_used, generated.raw_response.clone())
                .await
            {
                Ok(result) => Some(result.plant_id),
                Err(e) if e.is_invalid_data() => {
                    warn!("Generated care was rejected by the store, not persisting: {:#}", e);
                    None
                }
                Err(e) => {
                    error!("Failed to store plant and care instructions: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let image = if options.fetch_image {
            let corrected_name = care.plant_name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or(plant_name);
            match self.fetch_and_store_image(corrected_name).await {
                Ok(image) => image,
                Err(e) => {
                    warn!("Image handling failed, continuing without image: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(CareOutcome::Generated {
            care: Box::new(care),
            plant_group,
            plant_id,
            image,
        })
    }

    async fn persist(
        &self,
        care: &CareDocument,
        plant_group: PlantGroup,
        user_zone: Option<&str>,
        model_used: &str,
        raw_llm_response: Option<Value>,
    ) -> Result<UpsertResult> {
        let request = build_store_request(care, Some(plant_group), user_zone, Some(model_used), raw_llm_response)?;
        self.store(&request).await
    }

    /// Run the store engine for a prepared request
    #[instrument(skip(self, request), fields(plant_name = %request.lookup.plant_name), err)]
    pub async fn store(&self, request: &PlantStoreRequest) -> Result<UpsertResult> {
        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        let result = Plants::new(&mut conn).upsert_plant_and_care(request).await?;
        info!(plant_id = %abbrev_uuid(&result.plant_id), "Stored plant");
        Ok(result)
    }

    /// Fetch a stored plant with its care instructions
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn get_plant(&self, plant_id: PlantId) -> Result<PlantWithCare> {
        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        Plants::new(&mut conn)
            .get_with_care(plant_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Plant".to_string(),
                id: plant_id.to_string(),
            })
    }

    /// Look up a stock image for `plant_name` and store it. `Ok(None)` when lookups are not
    /// configured or nothing matched.
    #[instrument(skip(self), err)]
    pub async fn fetch_and_store_image(&self, plant_name: &str) -> Result<Option<PlantImage>> {
        let Some(lookup) = &self.image_lookup else {
            return Ok(None);
        };

        let Some(found) = lookup
            .find_image(plant_name)
            .await
            .map_err(|e| Error::upstream("image search", format!("{e:#}")))?
        else {
            info!("No image found, skipping image storage");
            return Ok(None);
        };

        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        let image = PlantImages::new(&mut conn)
            .upsert(&PlantImageUpsertDBRequest {
                name: plant_name.to_string(),
                unsplash_image_url: Some(found.image_url),
                unsplash_photographer_name: found.photographer_name,
                unsplash_photographer_url: found.photographer_url,
            })
            .await?;

        Ok(Some(image))
    }

    /// Identify a plant from an uploaded photo
    #[instrument(skip(self, image), fields(size = image.len()), err)]
    pub async fn identify(&self, image: &[u8], content_type: &str) -> Result<Identification> {
        if image.is_empty() {
            return Err(Error::invalid_input("Uploaded file is empty"));
        }
        if image.len() > self.max_upload_bytes {
            return Err(Error::invalid_input(format!(
                "Image file too large. Maximum size is {}MB",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }
        if !content_type.starts_with("image/") {
            return Err(Error::invalid_input(format!("Unsupported content type: {content_type}")));
        }

        let identifier = self
            .identifier
            .as_ref()
            .ok_or_else(|| Error::Other(anyhow!("No plant identifier configured")))?;
        identifier
            .identify(image, content_type)
            .await
            .map_err(|e| Error::upstream("plant identifier", format!("{e:#}")))
    }
}

fn model_from_raw(raw: Option<&Value>) -> Option<String> {
    raw?.get("model")?.as_str().filter(|m| !m.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockClassifier, MockGenerator, MockIdentifier, MockImageLookup, sample_care_content};
    use std::sync::atomic::Ordering;

    fn service(
        pool: PgPool,
        classifier: Arc<MockClassifier>,
        generator: Arc<MockGenerator>,
        image_lookup: Option<Arc<MockImageLookup>>,
    ) -> PlantCareService {
        PlantCareService::builder()
            .db(pool)
            .classifier(classifier)
            .generator(generator)
            .maybe_image_lookup(image_lookup.map(|l| l as Arc<dyn ImageLookup>))
            .identifier(Arc::new(MockIdentifier))
            .max_upload_bytes(1024)
            .build()
    }

    async fn count(pool: &PgPool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_generate_stores_plant_care_and_image(pool: PgPool) {
        let generator = MockGenerator::new(sample_care_content("Sweet Basil"));
        let images = MockImageLookup::found("https://images.example/basil.jpg");
        let service = service(pool.clone(), MockClassifier::plant(PlantGroup::Herbs), generator.clone(), Some(images));

        let outcome = service
            .generate_care("basil", Some("8a"), GenerateOptions::default())
            .await
            .unwrap();

        let CareOutcome::Generated {
            plant_id, image, plant_group, ..
        } = outcome
        else {
            panic!("expected generated care");
        };
        assert_eq!(plant_group, PlantGroup::Herbs);
        let plant_id = plant_id.expect("plant should be stored");

        let stored = service.get_plant(plant_id).await.unwrap();
        assert_eq!(stored.plant.plant_name, "Sweet Basil");
        assert_eq!(stored.plant.zone.as_deref(), Some("8a"));
        assert_eq!(stored.plant.model_used.as_deref(), Some("openai/gpt-5-mini"));
        assert_eq!(stored.care_instructions.len(), 3);

        let image = image.expect("image should be stored");
        assert_eq!(image.name, "Sweet Basil");
        assert_eq!(generator.last_zone.lock().unwrap().clone(), Some(Some("8a".to_string())));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_regenerating_updates_same_plant(pool: PgPool) {
        let service = service(
            pool.clone(),
            MockClassifier::plant(PlantGroup::Houseplants),
            MockGenerator::new(sample_care_content("Pothos")),
            None,
        );

        let first = service.generate_care("pothos", Some("7a"), GenerateOptions::default()).await.unwrap();
        let second = service.generate_care("pothos", Some("9b"), GenerateOptions::default()).await.unwrap();

        let (CareOutcome::Generated { plant_id: Some(a), .. }, CareOutcome::Generated { plant_id: Some(b), .. }) = (first, second)
        else {
            panic!("expected both calls to store");
        };
        assert_eq!(a, b);
        assert_eq!(count(&pool, "plants").await, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_indoor_generation_is_zone_independent(pool: PgPool) {
        let generator = MockGenerator::new(sample_care_content("Jade Plant"));
        let service = service(pool, MockClassifier::plant(PlantGroup::Succulents), generator.clone(), None);

        service.generate_care("jade", Some("7a"), GenerateOptions::default()).await.unwrap();
        assert_eq!(generator.last_zone.lock().unwrap().clone(), Some(None));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_not_a_plant_short_circuits(pool: PgPool) {
        let generator = MockGenerator::new(sample_care_content("unused"));
        let service = service(pool.clone(), MockClassifier::not_a_plant("A toaster is not a plant."), generator.clone(), None);

        let outcome = service.generate_care("toaster", Some("7a"), GenerateOptions::default()).await.unwrap();

        assert!(matches!(outcome, CareOutcome::NotAPlant { ref message } if message == "A toaster is not a plant."));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&pool, "plants").await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_storage_failure_still_returns_care(pool: PgPool) {
        // Outdoor group without a zone cannot be stored
        let service = service(
            pool.clone(),
            MockClassifier::plant(PlantGroup::Vegetables),
            MockGenerator::new(sample_care_content("Tomato")),
            None,
        );

        let outcome = service.generate_care("tomato", None, GenerateOptions::default()).await.unwrap();

        assert!(matches!(outcome, CareOutcome::Generated { plant_id: None, .. }));
        assert_eq!(count(&pool, "plants").await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_image_failure_is_not_fatal(pool: PgPool) {
        let images = MockImageLookup::failing();
        let service = service(
            pool.clone(),
            MockClassifier::plant(PlantGroup::Herbs),
            MockGenerator::new(sample_care_content("Mint")),
            Some(images.clone()),
        );

        let outcome = service.generate_care("mint", Some("6a"), GenerateOptions::default()).await.unwrap();

        assert!(matches!(outcome, CareOutcome::Generated { plant_id: Some(_), image: None, .. }));
        assert_eq!(images.calls.load(Ordering::SeqCst), 1);
        assert_eq!(count(&pool, "plant_images").await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_options_skip_persistence_and_images(pool: PgPool) {
        let images = MockImageLookup::found("https://images.example/x.jpg");
        let service = service(
            pool.clone(),
            MockClassifier::plant(PlantGroup::Herbs),
            MockGenerator::new(sample_care_content("Dill")),
            Some(images.clone()),
        );

        let options = GenerateOptions {
            persist: false,
            fetch_image: false,
        };
        let outcome = service.generate_care("dill", Some("5b"), options).await.unwrap();

        assert!(matches!(outcome, CareOutcome::Generated { plant_id: None, image: None, .. }));
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&pool, "plants").await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_collaborator_errors_are_upstream(pool: PgPool) {
        let service = service(
            pool.clone(),
            MockClassifier::failing("classifier returned HTTP 502"),
            MockGenerator::new(sample_care_content("Basil")),
            None,
        );
        let err = service.generate_care("basil", Some("8a"), GenerateOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { ref service, .. } if service == "classifier"));
        assert!(err.is_transient());

        let service = PlantCareService::builder()
            .db(pool)
            .classifier(MockClassifier::plant(PlantGroup::Herbs))
            .generator(MockGenerator::new(r#"{"plantName": "Basil""#))
            .build();
        let err = service.generate_care("basil", Some("8a"), GenerateOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { ref service, .. } if service == "care generator"));
    }

    #[sqlx::test]
    async fn test_get_missing_plant_is_not_found(pool: PgPool) {
        let service = service(
            pool,
            MockClassifier::plant(PlantGroup::Herbs),
            MockGenerator::new(sample_care_content("Basil")),
            None,
        );
        let err = service.get_plant(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[sqlx::test]
    async fn test_identify_validates_upload(pool: PgPool) {
        let service = service(
            pool,
            MockClassifier::plant(PlantGroup::Houseplants),
            MockGenerator::new(sample_care_content("Monstera")),
            None,
        );

        assert!(matches!(service.identify(&[], "image/jpeg").await, Err(Error::InvalidInput { .. })));
        assert!(matches!(service.identify(&[0u8; 2048], "image/jpeg").await, Err(Error::InvalidInput { .. })));
        assert!(matches!(service.identify(&[1, 2, 3], "text/plain").await, Err(Error::InvalidInput { .. })));

        let identification = service.identify(&[1, 2, 3], "image/png").await.unwrap();
        assert_eq!(identification.common_name.as_deref(), Some("Monstera"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_from_config_applies_model_and_upload_limit(pool: PgPool) {
        let mut config = Config::default();
        config.llm.model = "custom/care-model".to_string();
        config.max_upload_mb = 1;

        let service = PlantCareService::from_config(
            &config,
            pool,
            MockClassifier::plant(PlantGroup::Herbs),
            MockGenerator::without_model(sample_care_content("Oregano")),
            Some(Arc::new(MockIdentifier)),
        )
        .unwrap();

        let CareOutcome::Generated {
            plant_id: Some(plant_id),
            image,
            ..
        } = service.generate_care("oregano", Some("6a"), GenerateOptions::default()).await.unwrap()
        else {
            panic!("expected stored care");
        };
        assert!(image.is_none(), "no access key means no image lookup");
        let stored = service.get_plant(plant_id).await.unwrap();
        assert_eq!(stored.plant.model_used.as_deref(), Some("custom/care-model"));

        let err = service.identify(&vec![0u8; 2 * 1024 * 1024], "image/jpeg").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref message } if message.contains("Maximum size is 1MB")));
        assert!(service.identify(&[1, 2, 3], "image/jpeg").await.is_ok());
    }

    #[test]
    fn test_model_from_raw() {
        assert_eq!(model_from_raw(Some(&serde_json::json!({"model": "m-1"}))), Some("m-1".to_string()));
        assert_eq!(model_from_raw(Some(&serde_json::json!({"model": ""}))), None);
        assert_eq!(model_from_raw(None), None);
    }
}
