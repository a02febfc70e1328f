//! Database repository for plant images.

use crate::{
    db::{
        errors::Result,
        models::plant_images::{PlantImage, PlantImageUpsertDBRequest},
    },
    types::abbrev_uuid,
};
use sqlx::PgConnection;
use tracing::{debug, instrument};
use uuid::Uuid;

pub struct PlantImages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PlantImages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create or replace the image stored for a plant name. At most one image exists per name.
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn upsert(&mut self, request: &PlantImageUpsertDBRequest) -> Result<PlantImage> {
        let image = sqlx::query_as::<_, PlantImage>(
            r#"
            INSERT INTO plant_images (id, name, unsplash_image_url, unsplash_photographer_name, unsplash_photographer_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET
                unsplash_image_url = EXCLUDED.unsplash_image_url,
                unsplash_photographer_name = EXCLUDED.unsplash_photographer_name,
                unsplash_photographer_url = EXCLUDED.unsplash_photographer_url,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.unsplash_image_url)
        .bind(&request.unsplash_photographer_name)
        .bind(&request.unsplash_photographer_url)
        .fetch_one(&mut *self.db)
        .await?;

        debug!(image_id = %abbrev_uuid(&image.id), "Stored plant image");
        Ok(image)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<PlantImage>> {
        let image = sqlx::query_as::<_, PlantImage>("SELECT * FROM plant_images WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(image)
    }
}
