use anyhow::Context;
use clap::Parser;
use plantcare::{
    Config, PlantImages, Plants,
    clients::{ImageLookup, unsplash::UnsplashClient},
    config::{Args, Command},
    db::models::plant_images::PlantImageUpsertDBRequest,
    health, telemetry,
};
use std::process::ExitCode;

async fn run(config: Config, command: Command) -> anyhow::Result<ExitCode> {
    let pool = plantcare::connect(&config).await?;

    match command {
        Command::Migrate => {
            plantcare::migrator().run(&pool).await.context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
        }
        Command::Store { input } => {
            let request = plantcare::load_store_request(&input).await?;
            let mut conn = pool.acquire().await?;
            let result = Plants::new(&mut conn).upsert_plant_and_care(&request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Show { plant_id } => {
            let mut conn = pool.acquire().await?;
            let Some(plant) = Plants::new(&mut conn).get_with_care(plant_id).await? else {
                eprintln!("Plant {plant_id} not found");
                return Ok(ExitCode::FAILURE);
            };
            println!("{}", serde_json::to_string_pretty(&plant)?);
        }
        Command::Image { plant_name } => {
            let client = UnsplashClient::new(&config.unsplash)?;
            let Some(found) = client.find_image(&plant_name).await? else {
                eprintln!("No image found for {plant_name}");
                return Ok(ExitCode::FAILURE);
            };

            let mut conn = pool.acquire().await?;
            let image = PlantImages::new(&mut conn)
                .upsert(&PlantImageUpsertDBRequest {
                    name: plant_name,
                    unsplash_image_url: Some(found.image_url),
                    unsplash_photographer_name: found.photographer_name,
                    unsplash_photographer_url: found.photographer_url,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&image)?);
        }
        Command::Health => {
            let status = health::check_database(&pool).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !status.is_healthy() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    pool.close().await;
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Install rustls crypto provider before anything else that might build a TLS client
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(ExitCode::SUCCESS);
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    tracing::debug!("{:?}", args);

    let Some(command) = args.command else {
        eprintln!("No command given. Run with --help to see the available commands.");
        return Ok(ExitCode::FAILURE);
    };

    let result = run(config, command).await;
    telemetry::shutdown_telemetry();
    result
}
