//! `spawn-hero` command implementation.

use actor_factory::BatchLifecycleManager;
use anyhow::{Context, Result};
use capture::spawn_hero;

use crate::cli::SpawnHeroArgs;
use crate::pipeline::{connect, load_settings};

/// Execute the `spawn-hero` command
pub async fn run_spawn_hero(args: &SpawnHeroArgs) -> Result<()> {
    let settings = load_settings(&args.connection)?;
    let role_name = args
        .role_name
        .clone()
        .unwrap_or_else(|| settings.capture.hero_role_name.clone());

    let client = connect(&settings.carla).await?;
    let manager = BatchLifecycleManager::new(client, settings.fleet.chunk_size);
    let hero_id = spawn_hero(&manager, &settings.fleet.catalog, &role_name)
        .await
        .context("Failed to spawn hero")?;

    println!(
        "✓ Spawned {} as '{}' (actor {})",
        settings.fleet.catalog.hero, role_name, hero_id
    );
    Ok(())
}
