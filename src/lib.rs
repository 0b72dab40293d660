pub mod admin; // Bulk users, cleanup, demo data, sample uploads
pub mod api; // HTTP router + server
pub mod approval; // Attestation statistics
pub mod brief; // PPDU brief editor + intake form
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod db;
pub mod document; // DOCX → formatted PDF pipeline
pub mod identity;
pub mod models;
pub mod settings; // Policy settings + attestation
pub mod storage;
pub mod store;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Process entry point: tracing, configuration, state, then the server.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let portal = config::PortalConfig::from_env()?;
    tracing::info!(
        data_dir = %portal.data_dir.display(),
        bind = %portal.bind,
        public_url = %portal.public_url,
        "Loaded configuration"
    );

    let core = Arc::new(core_state::CoreState::open(&portal)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(api::serve_until_ctrl_c(core, portal.bind))?;

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
