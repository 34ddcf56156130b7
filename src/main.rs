//! Save database maintenance entrypoint: creates the schema and optionally compacts the file.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use god_persistence::{
    config::PersistenceConfig,
    dao::sqlite::load_sqlite3_driver,
    services::{PersistenceService, codec::PassThroughCodec},
};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PersistenceConfig::load();
    load_sqlite3_driver();

    let mut service = PersistenceService::new(&config, Arc::new(PassThroughCodec));
    service
        .initialize()
        .with_context(|| format!("initializing {}", config.database_path().display()))?;

    if config.vacuum_on_startup() {
        if service.vacuum() {
            info!(path = %config.database_path().display(), "vacuumed save database");
        } else {
            warn!(path = %config.database_path().display(), "could not open save database for vacuum");
        }
    }

    info!(
        path = %config.database_path().display(),
        tables = service.database().registry().len(),
        "save database ready"
    );
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
