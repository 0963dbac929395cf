use std::path::PathBuf;

use tracing::{error, info, warn};

use quest_manager::{DirectoryStorage, EngineConfig, PlayerDirectory, QuestManager, SimWorld};

const DEFAULT_CONFIG: &str = "quest_manager.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quest_manager=info".parse()?),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = EngineConfig::load(&config_path)?;
    info!("Loaded config from {:?}", config_path);

    let storage = DirectoryStorage::open(&config.manager.save_dir)?;
    let mut world = SimWorld::new();
    let mut manager = QuestManager::from_config(
        &config.manager,
        Box::new(storage),
        Box::new(PlayerDirectory::accepting_all()),
    );

    let report = manager.restore(&mut world);
    for (blob, e) in &report.skipped {
        warn!("Saved state {} left in place: {}", blob, e);
    }
    info!(
        "{} ready with {} running quest(s)",
        manager.name(),
        manager.running_quests().len()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down {}", manager.name());

    for (id, e) in manager.stop_quests(&world) {
        error!("Quest {} did not stop cleanly: {}", id, e);
    }
    Ok(())
}
